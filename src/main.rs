mod api;
mod config;
mod db;
mod enrich;
mod entities;
mod error;
mod models;
mod routes;
mod store;
mod templates;
mod tmdb;
mod transfer;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{config::Config, store::Catalogue, tmdb::TmdbClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Catalogue,
    pub tmdb: Arc<TmdbClient>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,filmshelf=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let http = reqwest::Client::builder()
        .user_agent("filmshelf/0.1")
        .timeout(Duration::from_secs(10))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = Catalogue::new(db);

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_access_token.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_image_base_url.clone(),
        config.tmdb_rps,
    );

    let state = Arc::new(AppState { config: config.clone(), store, tmdb: Arc::new(tmdb) });

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/movie/{id}", get(routes::movie_detail))
        .route("/add", get(routes::add_movie_form).post(routes::add_movie))
        .route("/movie/{id}/edit", get(routes::edit_movie_form).post(routes::edit_movie))
        .route("/movie/{id}/delete", post(routes::delete_movie))
        .route("/upload", get(routes::upload_form).post(routes::upload_csv))
        .route("/stats", get(routes::stats))
        .route("/export", get(routes::export))
        .route("/login", get(routes::login_form).post(routes::login))
        .nest_service("/media", ServeDir::new(&config.media_dir))
        .route("/api/movies", get(api::list).post(api::create))
        .route("/api/movies/stats", get(api::stats))
        .route("/api/movies/recommended", get(api::recommended))
        .route("/api/movies/{id}", get(api::detail).put(api::update).delete(api::delete))
        .route("/api/backfill", post(api::backfill))
        .with_state(state)
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
