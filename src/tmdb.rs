use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_POSTER_SIZE: &str = "w500";

/// Outcome of a metadata lookup. Transport and parse failures never escape
/// the client; callers see `Failed`, choose to ignore it, and move on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    image_base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(
        client: reqwest::Client,
        access_token: String,
        base_url: String,
        image_base_url: String,
        rps: u32,
    ) -> Self {
        // Warn once on app load; every lookup then reports NotFound offline.
        if access_token.trim().is_empty() {
            warn!("no TMDB_ACCESS_TOKEN provided - poster enrichment disabled");
        }

        let limiter =
            Arc::new(RateLimiter::direct(Quota::per_second(NonZeroU32::new(rps.max(1)).unwrap())));
        Self { client, access_token, base_url, image_base_url, limiter }
    }

    fn offline(&self) -> bool {
        self.access_token.trim().is_empty()
    }

    /// Searches for a movie by title and optional year. With a year, prefers
    /// the result whose release date starts with that year; otherwise the
    /// first (most relevant) result wins.
    pub async fn search_movie(&self, title: &str, year: Option<i32>) -> Lookup<SearchHit> {
        if self.offline() {
            return Lookup::NotFound;
        }

        self.limiter.until_ready().await;

        let url = format!("{}/search/movie", self.base_url.trim_end_matches('/'));
        let mut req = self.client.get(url).bearer_auth(&self.access_token).query(&[
            ("query", title),
            ("include_adult", "false"),
            ("language", "en-US"),
            ("page", "1"),
        ]);
        if let Some(year) = year {
            req = req.query(&[("year", year)]);
        }

        let resp = match req.send().await.and_then(|r| r.error_for_status()) {
            Ok(resp) => resp,
            Err(err) => {
                warn!(title = %title, error = %err, "TMDB search failed");
                return Lookup::Failed;
            },
        };

        let resp: SearchResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(title = %title, error = %err, "TMDB search response unparsable");
                return Lookup::Failed;
            },
        };

        match pick_best(resp.results, year) {
            Some(hit) => Lookup::Found(hit),
            None => {
                debug!(title = %title, year = ?year, "no TMDB results");
                Lookup::NotFound
            },
        }
    }

    /// Fetches the detail record for a known TMDB id.
    pub async fn movie_details(&self, tmdb_id: i32) -> Lookup<SearchHit> {
        if self.offline() {
            return Lookup::NotFound;
        }

        self.limiter.until_ready().await;

        let url = format!("{}/movie/{}", self.base_url.trim_end_matches('/'), tmdb_id);
        let req =
            self.client.get(url).bearer_auth(&self.access_token).query(&[("language", "en-US")]);

        let resp = match req.send().await.and_then(|r| r.error_for_status()) {
            Ok(resp) => resp,
            Err(err) => {
                warn!(tmdb_id, error = %err, "TMDB details fetch failed");
                return Lookup::Failed;
            },
        };

        match resp.json().await {
            Ok(hit) => Lookup::Found(hit),
            Err(err) => {
                warn!(tmdb_id, error = %err, "TMDB details response unparsable");
                Lookup::Failed
            },
        }
    }

    /// Full image URL for a poster path. Pure string composition.
    pub fn poster_url(&self, poster_path: &str, size: &str) -> String {
        format!("{}/{}{}", self.image_base_url.trim_end_matches('/'), size, poster_path)
    }

    /// Search + poster URL composition: the main entry point for enrichment.
    pub async fn find_poster(&self, title: &str, year: Option<i32>) -> Lookup<PosterMatch> {
        match self.search_movie(title, year).await {
            Lookup::Found(hit) => match hit.poster_path.as_deref() {
                Some(path) => {
                    let url = self.poster_url(path, DEFAULT_POSTER_SIZE);
                    debug!(title = %title, url = %url, "found poster");
                    Lookup::Found(PosterMatch { tmdb_id: hit.id, poster_url: url })
                },
                None => {
                    debug!(title = %title, "TMDB match has no poster");
                    Lookup::NotFound
                },
            },
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed => Lookup::Failed,
        }
    }

    /// Search + ancillary fields in one result object.
    pub async fn movie_info(&self, title: &str, year: Option<i32>) -> Lookup<MovieInfo> {
        match self.search_movie(title, year).await {
            Lookup::Found(hit) => {
                let poster_url =
                    hit.poster_path.as_deref().map(|p| self.poster_url(p, DEFAULT_POSTER_SIZE));
                Lookup::Found(MovieInfo {
                    tmdb_id: hit.id,
                    title: hit.title,
                    original_title: hit.original_title,
                    release_date: hit.release_date,
                    overview: hit.overview,
                    poster_path: hit.poster_path,
                    poster_url,
                    vote_average: hit.vote_average,
                    vote_count: hit.vote_count,
                    popularity: hit.popularity,
                    genre_ids: hit.genre_ids,
                })
            },
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed => Lookup::Failed,
        }
    }
}

fn pick_best(results: Vec<SearchHit>, year: Option<i32>) -> Option<SearchHit> {
    if let Some(year) = year {
        let prefix = year.to_string();
        if let Some(pos) = results
            .iter()
            .position(|hit| hit.release_date.as_deref().is_some_and(|d| d.starts_with(&prefix)))
        {
            let mut results = results;
            return Some(results.swap_remove(pos));
        }
    }
    results.into_iter().next()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SearchHit {
    pub id: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PosterMatch {
    pub tmdb_id: i32,
    pub poster_url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MovieInfo {
    pub tmdb_id: i32,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub poster_url: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub genre_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> TmdbClient {
        TmdbClient::new(
            reqwest::Client::new(),
            "".to_string(),
            "https://api.themoviedb.org/3".to_string(),
            "https://image.tmdb.org/t/p".to_string(),
            4,
        )
    }

    fn hit(id: i32, release_date: &str) -> SearchHit {
        SearchHit {
            id,
            release_date: Some(release_date.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn prefers_exact_year_match_over_first_result() {
        let results = vec![hit(1, "2010-06-01"), hit(2, "1995-12-15"), hit(3, "1995-01-01")];
        let best = pick_best(results, Some(1995)).unwrap();
        assert_eq!(best.id, 2);
    }

    #[test]
    fn falls_back_to_first_result_without_year_match() {
        let results = vec![hit(1, "2010-06-01"), hit(2, "2012-03-04")];
        assert_eq!(pick_best(results.clone(), Some(1995)).unwrap().id, 1);
        assert_eq!(pick_best(results, None).unwrap().id, 1);
    }

    #[test]
    fn empty_results_yield_nothing() {
        assert!(pick_best(vec![], Some(2001)).is_none());
        assert!(pick_best(vec![], None).is_none());
    }

    #[test]
    fn builds_poster_urls() {
        let client = offline_client();
        assert_eq!(
            client.poster_url("/abc123.jpg", DEFAULT_POSTER_SIZE),
            "https://image.tmdb.org/t/p/w500/abc123.jpg"
        );
        assert_eq!(client.poster_url("/abc123.jpg", "w185"), "https://image.tmdb.org/t/p/w185/abc123.jpg");
    }

    #[tokio::test]
    async fn offline_client_reports_not_found() {
        let client = offline_client();
        assert_eq!(client.search_movie("Heat", Some(1995)).await, Lookup::NotFound);
        assert_eq!(client.find_poster("Heat", Some(1995)).await, Lookup::NotFound);
        assert_eq!(client.movie_details(550).await, Lookup::NotFound);
    }
}
