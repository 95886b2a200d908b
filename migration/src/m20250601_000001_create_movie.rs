use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(pk_auto(Movie::Id))
                    .col(string(Movie::Name))
                    .col(integer(Movie::Year))
                    .col(string(Movie::ImdbLink))
                    .col(string_null(Movie::PosterUrl))
                    .col(string_null(Movie::PosterImage))
                    .col(double_null(Movie::Rating))
                    .col(text_null(Movie::Notes))
                    .col(string_null(Movie::Tags))
                    .col(boolean(Movie::WatchAgain).default(false))
                    .col(big_integer(Movie::DateAdded))
                    .col(integer_null(Movie::TmdbId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_name_year_unique")
                    .table(Movie::Table)
                    .col(Movie::Name)
                    .col(Movie::Year)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_date_added")
                    .table(Movie::Table)
                    .col(Movie::DateAdded)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movie::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    Name,
    Year,
    ImdbLink,
    PosterUrl,
    PosterImage,
    Rating,
    Notes,
    Tags,
    WatchAgain,
    DateAdded,
    TmdbId,
}
