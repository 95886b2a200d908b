use std::collections::{BTreeMap, HashMap, HashSet};

use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};

use crate::{
    entities::movie,
    error::{AppError, AppResult},
    models::{CatalogueStats, ListQuery, NewMovie, Sort, TagCount, YearCount},
};

/// All access to the movie table goes through here. The (name, year)
/// uniqueness check lives in `create`/`update`, backed by the unique index.
#[derive(Clone)]
pub struct Catalogue {
    db: DatabaseConnection,
}

impl Catalogue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn create(&self, candidate: NewMovie) -> AppResult<movie::Model> {
        let candidate = candidate.normalize_and_validate()?;

        if self.exists(&candidate.name, candidate.year).await? {
            return Err(AppError::conflict(format!(
                "movie \"{} ({})\" already exists",
                candidate.name, candidate.year
            )));
        }

        let model = movie::ActiveModel {
            id: Default::default(),
            name: Set(candidate.name),
            year: Set(candidate.year),
            imdb_link: Set(candidate.imdb_link),
            poster_url: Set(candidate.poster_url),
            poster_image: Set(candidate.poster_image),
            rating: Set(candidate.rating),
            notes: Set(candidate.notes),
            tags: Set(candidate.tags),
            watch_again: Set(candidate.watch_again),
            date_added: Set(now_sec()),
            tmdb_id: Set(candidate.tmdb_id),
        };

        let res = movie::Entity::insert(model).exec(&self.db).await?;
        self.get(res.last_insert_id).await
    }

    pub async fn get(&self, id: i32) -> AppResult<movie::Model> {
        movie::Entity::find_by_id(id).one(&self.db).await?.ok_or(AppError::NotFound)
    }

    /// Replaces every field except `date_added`, which is set once at
    /// creation and never touched again.
    pub async fn update(&self, id: i32, candidate: NewMovie) -> AppResult<movie::Model> {
        let existing = self.get(id).await?;
        let candidate = candidate.normalize_and_validate()?;

        let duplicate = movie::Entity::find()
            .filter(movie::Column::Name.eq(candidate.name.clone()))
            .filter(movie::Column::Year.eq(candidate.year))
            .filter(movie::Column::Id.ne(id))
            .one(&self.db)
            .await?;
        if duplicate.is_some() {
            return Err(AppError::conflict(format!(
                "movie \"{} ({})\" already exists",
                candidate.name, candidate.year
            )));
        }

        let model = movie::ActiveModel {
            id: Set(id),
            name: Set(candidate.name),
            year: Set(candidate.year),
            imdb_link: Set(candidate.imdb_link),
            poster_url: Set(candidate.poster_url),
            poster_image: Set(candidate.poster_image),
            rating: Set(candidate.rating),
            notes: Set(candidate.notes),
            tags: Set(candidate.tags),
            watch_again: Set(candidate.watch_again),
            date_added: Set(existing.date_added),
            tmdb_id: Set(candidate.tmdb_id.or(existing.tmdb_id)),
        };

        movie::Entity::update(model).exec(&self.db).await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let res = movie::Entity::delete_by_id(id).exec(&self.db).await?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Case-sensitive match on the trimmed name, exact year.
    pub async fn exists(&self, name: &str, year: i32) -> AppResult<bool> {
        let found = movie::Entity::find()
            .filter(movie::Column::Name.eq(name.trim()))
            .filter(movie::Column::Year.eq(year))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }

    pub async fn list(&self, q: &ListQuery) -> AppResult<Vec<movie::Model>> {
        let mut query = movie::Entity::find();

        if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(movie::Column::Name.contains(search))
                    .add(movie::Column::Tags.contains(search)),
            );
        }
        if let Some(year) = q.year {
            query = query.filter(movie::Column::Year.eq(year));
        }
        if let Some(tag) = q.tag.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(movie::Column::Tags.contains(tag));
        }
        if q.watch_again_only {
            query = query.filter(movie::Column::WatchAgain.eq(true));
        }
        if let Some(min_rating) = q.min_rating {
            query = query.filter(movie::Column::Rating.gte(min_rating));
        }

        query = match q.sort {
            Sort::NameAsc => query.order_by_asc(movie::Column::Name),
            Sort::NameDesc => query.order_by_desc(movie::Column::Name),
            Sort::YearAsc => query.order_by_asc(movie::Column::Year),
            Sort::YearDesc => query.order_by_desc(movie::Column::Year),
            Sort::RatingAsc => query.order_by_asc(movie::Column::Rating),
            Sort::RatingDesc => query.order_by_desc(movie::Column::Rating),
            Sort::DateAddedAsc => query.order_by_asc(movie::Column::DateAdded),
            Sort::DateAddedDesc => query.order_by_desc(movie::Column::DateAdded),
        };

        Ok(query.all(&self.db).await?)
    }

    /// Export order: newest first.
    pub async fn all_newest_first(&self) -> AppResult<Vec<movie::Model>> {
        Ok(movie::Entity::find()
            .order_by_desc(movie::Column::DateAdded)
            .order_by_desc(movie::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Persists only the enrichment fields, leaving everything else alone.
    pub async fn set_poster_url(
        &self,
        id: i32,
        poster_url: &str,
        tmdb_id: Option<i32>,
    ) -> AppResult<()> {
        let mut model = movie::ActiveModel {
            id: Set(id),
            poster_url: Set(Some(poster_url.to_string())),
            ..Default::default()
        };
        if let Some(tmdb_id) = tmdb_id {
            model.tmdb_id = Set(Some(tmdb_id));
        }
        movie::Entity::update(model).exec(&self.db).await?;
        Ok(())
    }

    /// Backfill candidates: records with no poster at all, oldest first.
    /// `force` walks the whole catalogue instead.
    pub async fn backfill_candidates(
        &self,
        force: bool,
        limit: u64,
    ) -> AppResult<Vec<movie::Model>> {
        let mut query = movie::Entity::find();
        if !force {
            query = query
                .filter(movie::Column::PosterUrl.is_null())
                .filter(movie::Column::PosterImage.is_null());
        }
        Ok(query.order_by_asc(movie::Column::Id).limit(limit).all(&self.db).await?)
    }

    pub async fn distinct_years(&self) -> AppResult<Vec<i32>> {
        let years: Vec<i32> = movie::Entity::find()
            .select_only()
            .column(movie::Column::Year)
            .distinct()
            .order_by_desc(movie::Column::Year)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(years)
    }

    pub async fn all_tags(&self) -> AppResult<Vec<String>> {
        let movies = movie::Entity::find().all(&self.db).await?;
        let mut tags: Vec<String> =
            movies.iter().flat_map(|m| m.tags_list()).collect::<HashSet<_>>().into_iter().collect();
        tags.sort();
        Ok(tags)
    }

    pub async fn recommended(&self) -> AppResult<Vec<movie::Model>> {
        Ok(movie::Entity::find()
            .filter(movie::Column::WatchAgain.eq(true))
            .filter(movie::Column::Rating.gte(7.0))
            .order_by_desc(movie::Column::Rating)
            .limit(10)
            .all(&self.db)
            .await?)
    }

    pub async fn stats(&self) -> AppResult<CatalogueStats> {
        let movies = movie::Entity::find().all(&self.db).await?;
        let total = movies.len() as u64;

        let watch_again_count = movies.iter().filter(|m| m.watch_again).count() as u64;

        let ratings: Vec<f64> = movies.iter().filter_map(|m| m.rating).collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        let mut by_year: BTreeMap<i32, u64> = BTreeMap::new();
        for m in &movies {
            *by_year.entry(m.year).or_default() += 1;
        }
        let movies_by_year: Vec<YearCount> = by_year
            .into_iter()
            .rev()
            .map(|(year, count)| YearCount { year, count })
            .collect();

        let mut tag_tally: HashMap<String, u64> = HashMap::new();
        for m in &movies {
            for tag in m.tags_list() {
                *tag_tally.entry(tag).or_default() += 1;
            }
        }
        let distinct_tag_count = tag_tally.len() as u64;
        let mut tag_counts: Vec<TagCount> =
            tag_tally.into_iter().map(|(tag, count)| TagCount { tag, count }).collect();
        tag_counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));

        let mut rated: Vec<movie::Model> =
            movies.into_iter().filter(|m| m.rating.is_some()).collect();
        rated.sort_by(|a, b| {
            b.rating.partial_cmp(&a.rating).unwrap_or(std::cmp::Ordering::Equal)
        });
        rated.truncate(5);

        Ok(CatalogueStats {
            total_movies: total,
            watch_again_count,
            average_rating,
            distinct_tag_count,
            movies_by_year,
            tag_counts,
            top_rated: rated,
        })
    }
}

fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
