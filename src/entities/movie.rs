use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movie")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub imdb_link: String,
    pub poster_url: Option<String>,
    pub poster_image: Option<String>,
    pub rating: Option<f64>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub watch_again: bool,
    pub date_added: i64,
    pub tmdb_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
