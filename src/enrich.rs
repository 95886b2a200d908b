use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    entities::movie,
    error::AppResult,
    store::Catalogue,
    tmdb::{DEFAULT_POSTER_SIZE, Lookup, TmdbClient},
};

/// Best-effort poster fill after a manual creation. Only runs when the new
/// record has neither a poster URL nor an uploaded image, persists only the
/// poster field, and never fails the creation it is attached to. Returns
/// whether a poster was filled in.
pub async fn enrich_new_movie(store: &Catalogue, tmdb: &TmdbClient, created: &movie::Model) -> bool {
    if created.poster().is_some() {
        return false;
    }

    match tmdb.find_poster(&created.name, Some(created.year)).await {
        Lookup::Found(m) => {
            info!(name = %created.name, year = created.year, url = %m.poster_url, "auto-fetched poster");
            match store.set_poster_url(created.id, &m.poster_url, Some(m.tmdb_id)).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(name = %created.name, error = %err, "failed to persist poster");
                    false
                },
            }
        },
        Lookup::NotFound | Lookup::Failed => false,
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BackfillReport {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Walks records without a poster (all records with `force`) and fills
/// poster URLs from the metadata provider, one sequential call per record
/// with a fixed pause in between. No retries; a failed lookup just means no
/// enrichment for that record this time.
pub async fn backfill_posters(
    store: &Catalogue,
    tmdb: &TmdbClient,
    force: bool,
    limit: u64,
    delay_ms: u64,
) -> AppResult<BackfillReport> {
    let candidates = store.backfill_candidates(force, limit).await?;
    info!(count = candidates.len(), force, "starting poster backfill");

    let mut report = BackfillReport::default();

    for m in &candidates {
        report.processed += 1;

        let found = match m.tmdb_id {
            // A known provider id skips the search round-trip.
            Some(tmdb_id) => tmdb
                .movie_details(tmdb_id)
                .await
                .found()
                .and_then(|hit| hit.poster_path)
                .map(|path| (tmdb.poster_url(&path, DEFAULT_POSTER_SIZE), None)),
            None => tmdb
                .movie_info(&m.name, Some(m.year))
                .await
                .found()
                .and_then(|info| info.poster_url.map(|url| (url, Some(info.tmdb_id)))),
        };

        match found {
            Some((url, tmdb_id)) => apply_poster(store, &mut report, m, &url, tmdb_id).await,
            None => {
                debug!(name = %m.name, year = m.year, "no poster found");
                report.failed += 1;
            },
        }

        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
    }

    info!(updated = report.updated, failed = report.failed, "poster backfill finished");
    Ok(report)
}

/// A persistence failure counts against the record, not the batch.
async fn apply_poster(
    store: &Catalogue,
    report: &mut BackfillReport,
    m: &movie::Model,
    url: &str,
    tmdb_id: Option<i32>,
) {
    match store.set_poster_url(m.id, url, tmdb_id).await {
        Ok(()) => {
            debug!(name = %m.name, url = %url, "backfilled poster");
            report.updated += 1;
        },
        Err(err) => {
            warn!(name = %m.name, error = %err, "failed to persist poster");
            report.failed += 1;
        },
    }
}

#[cfg(test)]
mod tests {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    use super::*;
    use crate::models::NewMovie;

    async fn catalogue() -> Catalogue {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Catalogue::new(db)
    }

    fn offline_tmdb() -> TmdbClient {
        TmdbClient::new(
            reqwest::Client::new(),
            "".to_string(),
            "https://api.themoviedb.org/3".to_string(),
            "https://image.tmdb.org/t/p".to_string(),
            4,
        )
    }

    #[tokio::test]
    async fn creation_survives_enrichment_miss() {
        let store = catalogue().await;
        let created = store
            .create(NewMovie {
                name: "Heat".to_string(),
                year: 1995,
                imdb_link: "https://example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        // Offline client reports NotFound; the record stays intact.
        assert!(!enrich_new_movie(&store, &offline_tmdb(), &created).await);
        let after = store.get(created.id).await.unwrap();
        assert_eq!(after.poster_url, None);
        assert_eq!(after.name, "Heat");
    }

    #[tokio::test]
    async fn records_with_posters_are_left_alone() {
        let store = catalogue().await;
        let created = store
            .create(NewMovie {
                name: "Heat".to_string(),
                year: 1995,
                imdb_link: "https://example.com".to_string(),
                poster_url: Some("https://example.com/poster.jpg".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!enrich_new_movie(&store, &offline_tmdb(), &created).await);
    }

    #[tokio::test]
    async fn backfill_walks_only_posterless_records() {
        let store = catalogue().await;
        store
            .create(NewMovie {
                name: "Heat".to_string(),
                year: 1995,
                imdb_link: "https://example.com".to_string(),
                poster_url: Some("https://example.com/poster.jpg".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create(NewMovie {
                name: "Alien".to_string(),
                year: 1979,
                imdb_link: "https://example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let report = backfill_posters(&store, &offline_tmdb(), false, 50, 0).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.failed, 1);

        let report = backfill_posters(&store, &offline_tmdb(), true, 50, 0).await.unwrap();
        assert_eq!(report.processed, 2);

        let report = backfill_posters(&store, &offline_tmdb(), true, 1, 0).await.unwrap();
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn persistence_failure_counts_the_record_as_failed() {
        let store = catalogue().await;
        let created = store
            .create(NewMovie {
                name: "Heat".to_string(),
                year: 1995,
                imdb_link: "https://example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        // Deleting the record makes the poster update fail; the batch report
        // tallies it instead of bubbling the error up.
        store.delete(created.id).await.unwrap();

        let mut report = BackfillReport::default();
        apply_poster(&store, &mut report, &created, "https://example.com/p.jpg", None).await;
        assert_eq!(report.updated, 0);
        assert_eq!(report.failed, 1);
    }
}
