use std::sync::Arc;

use axum::{
    extract::{Form, Multipart, Path, Query, State},
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;

use crate::{
    AppState,
    entities::movie,
    enrich,
    error::{AppError, AppResult},
    models::{ListQuery, NewMovie, Sort},
    templates, transfer,
};

const PAGE_SIZE: usize = 12;
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub const ADMIN_COOKIE: &str = "admin_token";

/// Open install when no ADMIN_TOKEN is configured; otherwise mutating pages
/// need the login cookie and API callers the X-Admin-Token header.
pub fn is_admin(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> bool {
    let Some(token) = &state.config.admin_token else {
        return true;
    };
    if jar.get(ADMIN_COOKIE).is_some_and(|c| c.value() == token) {
        return true;
    }
    headers.get("x-admin-token").and_then(|v| v.to_str().ok()) == Some(token.as_str())
}

fn gate(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Result<(), Redirect> {
    if is_admin(state, jar, headers) { Ok(()) } else { Err(Redirect::to("/login")) }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    search: Option<String>,
    year: Option<String>,
    tag: Option<String>,
    watch_again: Option<String>,
    min_rating: Option<String>,
    sort: Option<String>,
    page: Option<usize>,
    msg: Option<String>,
}

impl ListParams {
    fn into_query(self) -> (ListQuery, usize, Option<String>) {
        let query = ListQuery {
            search: self.search.filter(|s| !s.trim().is_empty()),
            year: self.year.and_then(|y| y.trim().parse().ok()),
            tag: self.tag.filter(|t| !t.trim().is_empty()),
            watch_again_only: self.watch_again.as_deref().is_some_and(transfer::is_truthy),
            min_rating: self.min_rating.and_then(|r| r.trim().parse().ok()),
            sort: self.sort.as_deref().and_then(Sort::parse).unwrap_or_default(),
        };
        (query, self.page.unwrap_or(1).max(1), self.msg)
    }
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> AppResult<Html<String>> {
    let (query, page, msg) = params.into_query();

    let movies = state.store.list(&query).await?;
    let total_pages = movies.len().div_ceil(PAGE_SIZE).max(1);
    let page = page.min(total_pages);
    let start = (page - 1) * PAGE_SIZE;
    let slice = &movies[start..movies.len().min(start + PAGE_SIZE)];

    let years = state.store.distinct_years().await?;
    let tags = state.store.all_tags().await?;
    let stats = state.store.stats().await?;

    Ok(Html(templates::list_page(
        slice,
        &query,
        &years,
        &tags,
        page,
        total_pages,
        stats.total_movies,
        stats.watch_again_count,
        msg.as_deref(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct MsgParam {
    msg: Option<String>,
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<MsgParam>,
) -> AppResult<Html<String>> {
    let movie = state.store.get(id).await?;
    Ok(Html(templates::detail_page(&movie, params.msg.as_deref())))
}

pub async fn add_movie_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    if let Err(redirect) = gate(&state, &jar, &headers) {
        return redirect.into_response();
    }
    Html(templates::movie_form_page("Add movie", "/add", None, None)).into_response()
}

pub async fn add_movie(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Response> {
    if let Err(redirect) = gate(&state, &jar, &headers) {
        return Ok(redirect.into_response());
    }

    let candidate = match parse_movie_form(multipart, &state.config.media_dir).await {
        Ok(candidate) => candidate,
        Err(err) => return Ok(add_form_error(&err)),
    };

    let created = match state.store.create(candidate.clone()).await {
        Ok(created) => created,
        Err(err @ (AppError::Validation(_) | AppError::Conflict(_))) => {
            let draft = draft_model(&candidate);
            return Ok(Html(templates::movie_form_page(
                "Add movie",
                "/add",
                Some(&draft),
                Some(&err.to_string()),
            ))
            .into_response());
        },
        Err(err) => return Err(err),
    };

    let mut msg = format!("Movie \"{}\" added successfully!", created.name);
    if enrich::enrich_new_movie(&state.store, &state.tmdb, &created).await {
        msg.push_str(" Auto-fetched poster from TMDB.");
    }

    Ok(Redirect::to(&format!("/?msg={}", urlencoding::encode(&msg))).into_response())
}

pub async fn edit_movie_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    if let Err(redirect) = gate(&state, &jar, &headers) {
        return Ok(redirect.into_response());
    }
    let movie = state.store.get(id).await?;
    let action = format!("/movie/{id}/edit");
    Ok(Html(templates::movie_form_page("Edit movie", &action, Some(&movie), None)).into_response())
}

pub async fn edit_movie(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> AppResult<Response> {
    if let Err(redirect) = gate(&state, &jar, &headers) {
        return Ok(redirect.into_response());
    }

    let existing = state.store.get(id).await?;
    let action = format!("/movie/{id}/edit");

    let mut candidate = match parse_movie_form(multipart, &state.config.media_dir).await {
        Ok(candidate) => candidate,
        Err(err) => {
            return Ok(Html(templates::movie_form_page(
                "Edit movie",
                &action,
                Some(&existing),
                Some(&err.to_string()),
            ))
            .into_response());
        },
    };
    // Keep the stored image unless a replacement was uploaded.
    candidate.poster_image = candidate.poster_image.or(existing.poster_image.clone());

    match state.store.update(id, candidate).await {
        Ok(updated) => {
            let msg = format!("Movie \"{}\" updated successfully!", updated.name);
            Ok(Redirect::to(&format!("/movie/{id}?msg={}", urlencoding::encode(&msg)))
                .into_response())
        },
        Err(err @ (AppError::Validation(_) | AppError::Conflict(_))) => {
            Ok(Html(templates::movie_form_page(
                "Edit movie",
                &action,
                Some(&existing),
                Some(&err.to_string()),
            ))
            .into_response())
        },
        Err(err) => Err(err),
    }
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> AppResult<Response> {
    if let Err(redirect) = gate(&state, &jar, &headers) {
        return Ok(redirect.into_response());
    }
    let movie = state.store.get(id).await?;
    state.store.delete(id).await?;
    let msg = format!("Movie \"{}\" deleted.", movie.name);
    Ok(Redirect::to(&format!("/?msg={}", urlencoding::encode(&msg))).into_response())
}

pub async fn upload_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    if let Err(redirect) = gate(&state, &jar, &headers) {
        return redirect.into_response();
    }
    Html(templates::upload_page(None, None)).into_response()
}

pub async fn upload_csv(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Response> {
    if let Err(redirect) = gate(&state, &jar, &headers) {
        return Ok(redirect.into_response());
    }

    let mut data: Option<Vec<u8>> = None;
    let mut filename = String::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("csv_file") {
            filename = field.file_name().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| anyhow::anyhow!("failed to read upload: {err}"))?;
            data = Some(bytes.to_vec());
        }
    }

    let Some(data) = data else {
        return Ok(Html(templates::upload_page(None, Some("No file uploaded."))).into_response());
    };
    if !filename.to_lowercase().ends_with(".csv") {
        return Ok(
            Html(templates::upload_page(None, Some("Please upload a CSV file."))).into_response()
        );
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Ok(Html(templates::upload_page(None, Some("File size must be under 5MB.")))
            .into_response());
    }

    let report =
        match transfer::import_csv(&state.store, &state.tmdb, &data, state.config.poster_delay_ms)
            .await
        {
            Ok(report) => report,
            // An unreadable file is a user problem, shown inline like the
            // extension and size checks above.
            Err(err) => {
                return Ok(Html(templates::upload_page(
                    None,
                    Some(&format!("Could not read CSV file: {err}")),
                ))
                .into_response());
            },
        };
    Ok(Html(templates::upload_page(Some(&report), None)).into_response())
}

pub async fn stats(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let stats = state.store.stats().await?;
    Ok(Html(templates::stats_page(&stats)))
}

pub async fn export(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let movies = state.store.all_newest_first().await?;
    let body = transfer::export_csv(&movies)?;
    let disposition = format!("attachment; filename=\"{}\"", transfer::export_filename());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn login_form() -> Html<String> {
    Html(templates::login_page(None))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    token: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(expected) = &state.config.admin_token else {
        return Redirect::to("/").into_response();
    };

    if form.token != *expected {
        return Html(templates::login_page(Some("Wrong token."))).into_response();
    }

    let cookie = Cookie::build((ADMIN_COOKIE, form.token)).path("/").http_only(true).build();
    (jar.add(cookie), Redirect::to("/")).into_response()
}

/// Pulls a `NewMovie` out of the add/edit multipart form, writing any
/// uploaded poster image into the media dir.
async fn parse_movie_form(mut multipart: Multipart, media_dir: &str) -> AppResult<NewMovie> {
    let mut candidate = NewMovie::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(format!("invalid form: {err}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "poster_image" {
            let original = field.file_name().unwrap_or("poster.jpg").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| anyhow::anyhow!("failed to read upload: {err}"))?;
            if bytes.is_empty() {
                continue;
            }
            let safe: String = original
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
                .collect();
            let stored = format!("poster_{}_{safe}", jiff::Timestamp::now().as_millisecond());
            tokio::fs::create_dir_all(media_dir)
                .await
                .map_err(|err| anyhow::anyhow!("media dir: {err}"))?;
            tokio::fs::write(format!("{media_dir}/{stored}"), &bytes)
                .await
                .map_err(|err| anyhow::anyhow!("failed to store poster: {err}"))?;
            candidate.poster_image = Some(format!("/media/{stored}"));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| AppError::validation(format!("invalid form: {err}")))?;
        let trimmed = value.trim();

        match name.as_str() {
            "name" => candidate.name = value,
            "year" => {
                candidate.year = trimmed
                    .parse()
                    .map_err(|_| AppError::validation("year must be a number"))?;
            },
            "imdb_link" => candidate.imdb_link = value,
            "poster_url" => candidate.poster_url = Some(value),
            "rating" => {
                if !trimmed.is_empty() {
                    let rating = trimmed
                        .parse()
                        .map_err(|_| AppError::validation("rating must be a number"))?;
                    candidate.rating = Some(rating);
                }
            },
            "notes" => candidate.notes = Some(value),
            "tags" => candidate.tags = Some(value),
            "watch_again" => candidate.watch_again = transfer::is_truthy(&value),
            _ => {},
        }
    }

    Ok(candidate)
}

fn add_form_error(err: &AppError) -> Response {
    Html(templates::movie_form_page("Add movie", "/add", None, Some(&err.to_string())))
        .into_response()
}

/// Unsaved form values dressed up as a model so the form re-renders with
/// the user's input after a validation failure.
fn draft_model(c: &NewMovie) -> movie::Model {
    movie::Model {
        id: 0,
        name: c.name.clone(),
        year: c.year,
        imdb_link: c.imdb_link.clone(),
        poster_url: c.poster_url.clone(),
        poster_image: c.poster_image.clone(),
        rating: c.rating,
        notes: c.notes.clone(),
        tags: c.tags.clone(),
        watch_again: c.watch_again,
        date_added: 0,
        tmdb_id: c.tmdb_id,
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header::CONTENT_TYPE},
        routing::post,
    };
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, store::Catalogue, tmdb::TmdbClient};

    async fn app_state() -> Arc<AppState> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let config = Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            tmdb_access_token: "".to_string(),
            tmdb_base_url: "https://api.themoviedb.org/3".to_string(),
            tmdb_image_base_url: "https://image.tmdb.org/t/p".to_string(),
            tmdb_rps: 4,
            database_url: "sqlite::memory:".to_string(),
            media_dir: "media".to_string(),
            admin_token: None,
            poster_delay_ms: 0,
            backfill_limit: 50,
        };
        let tmdb = TmdbClient::new(
            reqwest::Client::new(),
            "".to_string(),
            config.tmdb_base_url.clone(),
            config.tmdb_image_base_url.clone(),
            config.tmdb_rps,
        );

        Arc::new(AppState {
            config: Arc::new(config),
            store: Catalogue::new(db),
            tmdb: Arc::new(tmdb),
        })
    }

    fn csv_upload(bytes: &[u8]) -> Request<Body> {
        let boundary = "filmshelf-upload-test";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"csv_file\"; filename=\"movies.csv\"\r\n\r\n",
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn unreadable_csv_renders_inline_upload_error() {
        let app = Router::new().route("/upload", post(upload_csv)).with_state(app_state().await);

        // Invalid UTF-8 in the header row makes the reader reject the file;
        // the upload page reports it like the extension and size checks do.
        let response =
            app.oneshot(csv_upload(b"Na\xffme,Year,IMDb\nHeat,1995,x\n")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("Could not read CSV file"));
    }
}
