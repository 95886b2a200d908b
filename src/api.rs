use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, enrich,
    error::{ApiResult, AppError},
    models::{CatalogueStats, ListQuery, MovieDto, MovieSummaryDto, NewMovie, Sort},
    routes,
};

fn require_admin(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Result<(), AppError> {
    if routes::is_admin(state, jar, headers) { Ok(()) } else { Err(AppError::Forbidden) }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiListParams {
    search: Option<String>,
    year: Option<i32>,
    tag: Option<String>,
    watch_again: Option<String>,
    min_rating: Option<f64>,
    ordering: Option<String>,
}

impl ApiListParams {
    fn into_query(self) -> ListQuery {
        ListQuery {
            search: self.search,
            year: self.year,
            tag: self.tag,
            watch_again_only: self
                .watch_again
                .as_deref()
                .is_some_and(crate::transfer::is_truthy),
            min_rating: self.min_rating,
            sort: self.ordering.as_deref().and_then(Sort::parse).unwrap_or_default(),
        }
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ApiListParams>,
) -> ApiResult<Json<Vec<MovieSummaryDto>>> {
    let movies = state.store.list(&params.into_query()).await?;
    Ok(Json(movies.into_iter().map(MovieSummaryDto::from).collect()))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MovieDto>> {
    Ok(Json(state.store.get(id).await?.into()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(candidate): Json<NewMovie>,
) -> ApiResult<(StatusCode, Json<MovieDto>)> {
    require_admin(&state, &jar, &headers)?;

    let created = state.store.create(candidate).await?;
    enrich::enrich_new_movie(&state.store, &state.tmdb, &created).await;
    let created = state.store.get(created.id).await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(candidate): Json<NewMovie>,
) -> ApiResult<Json<MovieDto>> {
    require_admin(&state, &jar, &headers)?;
    Ok(Json(state.store.update(id, candidate).await?.into()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    require_admin(&state, &jar, &headers)?;
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ApiStats {
    pub total_movies: u64,
    pub watch_again_count: u64,
    pub average_rating: f64,
    pub total_genres: u64,
    pub movies_by_year: BTreeMap<i32, u64>,
    pub top_rated_movies: Vec<MovieSummaryDto>,
}

impl From<CatalogueStats> for ApiStats {
    fn from(stats: CatalogueStats) -> Self {
        Self {
            total_movies: stats.total_movies,
            watch_again_count: stats.watch_again_count,
            average_rating: stats.average_rating.unwrap_or(0.0),
            total_genres: stats.distinct_tag_count,
            movies_by_year: stats
                .movies_by_year
                .iter()
                .map(|yc| (yc.year, yc.count))
                .collect(),
            top_rated_movies: stats.top_rated.into_iter().map(MovieSummaryDto::from).collect(),
        }
    }
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<ApiStats>> {
    Ok(Json(state.store.stats().await?.into()))
}

pub async fn recommended(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<MovieSummaryDto>>> {
    let movies = state.store.recommended().await?;
    Ok(Json(movies.into_iter().map(MovieSummaryDto::from).collect()))
}

#[derive(Debug, Default, Deserialize)]
pub struct BackfillParams {
    #[serde(default)]
    force: bool,
    limit: Option<u64>,
}

pub async fn backfill(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(params): Query<BackfillParams>,
) -> ApiResult<Json<enrich::BackfillReport>> {
    require_admin(&state, &jar, &headers)?;

    let limit = params.limit.unwrap_or(state.config.backfill_limit);
    let report = enrich::backfill_posters(
        &state.store,
        &state.tmdb,
        params.force,
        limit,
        state.config.poster_delay_ms,
    )
    .await?;
    Ok(Json(report))
}
