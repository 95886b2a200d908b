use std::collections::HashMap;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::{
    entities::movie,
    error::AppResult,
    models::{self, NewMovie},
    store::Catalogue,
    tmdb::{Lookup, TmdbClient},
};

pub const EXPORT_COLUMNS: [&str; 9] = [
    "Name",
    "Year",
    "IMDb Link",
    "Poster URL",
    "Rating",
    "Notes",
    "Tags",
    "Watch Again",
    "Date Added",
];

// Synonymous header names per logical field, tried in priority order.
const NAME_KEYS: &[&str] = &["Name", "name", "Movie Name", "Title"];
const YEAR_KEYS: &[&str] = &["Year", "year", "Release Year"];
const IMDB_KEYS: &[&str] = &["IMDb", "imdb", "IMDb Link", "imdb_link"];
const POSTER_KEYS: &[&str] = &["Poster", "poster", "Poster URL", "poster_url"];
const RATING_KEYS: &[&str] = &["Rating", "rating", "My Rating"];
const NOTES_KEYS: &[&str] = &["Notes", "notes", "Comments"];
const TAGS_KEYS: &[&str] = &["Tags", "tags", "Genres", "Genre"];
const WATCH_AGAIN_KEYS: &[&str] = &["Watch Again", "watch_again", "Worth Watching Again"];

// Sentinel values treated the same as "no poster supplied".
const PLACEHOLDER_POSTERS: &[&str] = &["https://image.url", "image.url", "placeholder"];

const TRUTHY: &[&str] = &["yes", "true", "1", "y"];

const MAX_SHOWN_ERRORS: usize = 5;

pub fn is_truthy(value: &str) -> bool {
    TRUTHY.contains(&value.trim().to_lowercase().as_str())
}

#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    pub added: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// First few reasons plus a count of the rest, for display.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let mut msg = format!("{} errors occurred:\n", self.errors.len());
        msg.push_str(&self.errors[..self.errors.len().min(MAX_SHOWN_ERRORS)].join("\n"));
        if self.errors.len() > MAX_SHOWN_ERRORS {
            msg.push_str(&format!(
                "\n... and {} more errors",
                self.errors.len() - MAX_SHOWN_ERRORS
            ));
        }
        Some(msg)
    }
}

/// Best-effort batch import of delimited text. Rows are 1-indexed with the
/// header as row 1; every row failure is recorded and the batch runs on.
pub async fn import_csv(
    store: &Catalogue,
    tmdb: &TmdbClient,
    data: &[u8],
    delay_ms: u64,
) -> AppResult<ImportReport> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);

    let headers = reader.headers()?.clone();
    debug!(headers = ?headers, "csv headers found");

    // First occurrence wins when a header repeats.
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        columns.entry(header.trim().to_string()).or_insert(idx);
    }

    let mut report = ImportReport::default();

    for (row_num, record) in reader.records().enumerate() {
        let row_num = row_num + 2;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                report.errors.push(format!("Row {row_num}: {err}"));
                continue;
            },
        };

        let name = field(&columns, &record, NAME_KEYS);
        let year_raw = field(&columns, &record, YEAR_KEYS);
        let imdb_link = field(&columns, &record, IMDB_KEYS);
        let poster_url = field(&columns, &record, POSTER_KEYS);
        let rating_raw = field(&columns, &record, RATING_KEYS);
        let notes = field(&columns, &record, NOTES_KEYS);
        let tags = field(&columns, &record, TAGS_KEYS);
        let watch_again_raw = field(&columns, &record, WATCH_AGAIN_KEYS);

        if name.is_empty() || year_raw.is_empty() || imdb_link.is_empty() {
            report
                .errors
                .push(format!("Row {row_num}: missing required fields (Name, Year, or IMDb)"));
            continue;
        }

        let year: i32 = match year_raw.parse() {
            Ok(year) => year,
            Err(_) => {
                report.errors.push(format!("Row {row_num}: invalid year \"{year_raw}\""));
                continue;
            },
        };

        if store.exists(&name, year).await? {
            report
                .errors
                .push(format!("Row {row_num}: movie \"{name} ({year})\" already exists"));
            continue;
        }

        let candidate = NewMovie {
            name,
            year,
            imdb_link,
            poster_url: (!poster_url.is_empty()).then(|| poster_url.clone()),
            // Unparsable ratings are dropped, not errors.
            rating: rating_raw.parse::<f64>().ok(),
            notes: (!notes.is_empty()).then_some(notes),
            tags: (!tags.is_empty()).then_some(tags),
            watch_again: is_truthy(&watch_again_raw),
            ..Default::default()
        };

        let created = match store.create(candidate).await {
            Ok(created) => created,
            Err(err) => {
                report.errors.push(format!("Row {row_num}: {err}"));
                continue;
            },
        };

        report.added += 1;

        if poster_url.is_empty() || PLACEHOLDER_POSTERS.contains(&poster_url.as_str()) {
            enrich_row(store, tmdb, &created).await;
            if delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
        }
    }

    debug!(added = report.added, errors = report.error_count(), "csv import finished");
    Ok(report)
}

/// Poster lookup for a freshly imported row. Failures never invalidate the
/// row, so store errors are only logged here.
async fn enrich_row(store: &Catalogue, tmdb: &TmdbClient, created: &movie::Model) {
    match tmdb.find_poster(&created.name, Some(created.year)).await {
        Lookup::Found(m) => {
            debug!(name = %created.name, url = %m.poster_url, "auto-fetched poster");
            if let Err(err) = store.set_poster_url(created.id, &m.poster_url, Some(m.tmdb_id)).await
            {
                warn!(name = %created.name, error = %err, "failed to persist poster");
            }
        },
        Lookup::NotFound | Lookup::Failed => {},
    }
}

fn field(columns: &HashMap<String, usize>, record: &StringRecord, keys: &[&str]) -> String {
    for key in keys {
        if let Some(&idx) = columns.get(*key) {
            if let Some(value) = record.get(idx) {
                let value = value.trim();
                if !value.is_empty() {
                    return value.to_string();
                }
            }
        }
    }
    String::new()
}

/// Serializes the catalogue to the fixed nine-column layout, one row per
/// record, already ordered by descending creation time by the caller.
pub fn export_csv(movies: &[movie::Model]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS)?;

    for m in movies {
        writer.write_record([
            m.name.as_str(),
            &m.year.to_string(),
            m.imdb_link.as_str(),
            m.poster_url.as_deref().unwrap_or(""),
            &m.rating.map(|r| format!("{r:.1}")).unwrap_or_default(),
            m.notes.as_deref().unwrap_or(""),
            m.tags.as_deref().unwrap_or(""),
            if m.watch_again { "Yes" } else { "No" },
            &models::format_timestamp(m.date_added),
        ])?;
    }

    writer.into_inner().map_err(|err| anyhow::anyhow!("csv flush failed: {err}").into())
}

/// Backup filename with an embedded generation timestamp.
pub fn export_filename() -> String {
    format!("filmshelf_backup_{}.csv", jiff::Zoned::now().strftime("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    use super::*;

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

    #[test]
    fn truthy_set_is_exact() {
        for v in ["yes", "YES", " y ", "true", "True", "1"] {
            assert!(is_truthy(v), "{v:?} should be truthy");
        }
        for v in ["no", "", "maybe", "0", "ye", "yess"] {
            assert!(!is_truthy(v), "{v:?} should be falsy");
        }
    }

    #[tokio::test]
    async fn title_header_fallback_creates_record() {
        let store = catalogue().await;
        let csv = "Title,Year,IMDb\nHeat,1995,https://www.imdb.com/title/tt0113277/\n";

        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 1);
        assert!(report.errors.is_empty());
        assert!(store.exists("Heat", 1995).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_rows_are_skipped_and_batch_completes() {
        let store = catalogue().await;
        let csv = "Name,Year,IMDb\n\
                   Heat,1995,https://www.imdb.com/title/tt0113277/\n\
                   Heat,1995,https://www.imdb.com/title/tt0113277/\n";

        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.error_count(), 1);
        assert!(report.errors[0].starts_with("Row 3:"));
        assert!(report.errors[0].contains("already exists"));
    }

    #[tokio::test]
    async fn missing_required_fields_are_labeled_errors() {
        let store = catalogue().await;
        let csv = "Name,Year,IMDb\n\
                   ,1995,https://example.com\n\
                   Heat,,https://example.com\n\
                   Heat,1995,\n\
                   Heat,1995,https://www.imdb.com/title/tt0113277/\n";

        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.error_count(), 3);
        assert!(report.errors.iter().enumerate().all(|(i, e)| e.starts_with(&format!("Row {}", i + 2))));
    }

    #[tokio::test]
    async fn unparsable_rating_is_dropped_not_rejected() {
        let store = catalogue().await;
        let csv = "Name,Year,IMDb,Rating\n\
                   Heat,1995,https://example.com,great\n\
                   Alien,1979,https://example.com,9.0\n";

        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 2);
        assert!(report.errors.is_empty());

        let movies = store.all_newest_first().await.unwrap();
        let heat = movies.iter().find(|m| m.name == "Heat").unwrap();
        let alien = movies.iter().find(|m| m.name == "Alien").unwrap();
        assert_eq!(heat.rating, None);
        assert_eq!(alien.rating, Some(9.0));
    }

    #[tokio::test]
    async fn invalid_year_is_a_row_error() {
        let store = catalogue().await;
        let csv = "Name,Year,IMDb\nHeat,ninety-five,https://example.com\n";

        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.error_count(), 1);
        assert!(report.errors[0].contains("invalid year"));
    }

    #[tokio::test]
    async fn out_of_range_year_is_a_row_error() {
        let store = catalogue().await;
        let csv = "Name,Year,IMDb\nHeat,1500,https://example.com\n";

        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.error_count(), 1);
    }

    #[tokio::test]
    async fn watch_again_cell_parses_truthy_values() {
        let store = catalogue().await;
        let csv = "Name,Year,IMDb,Watch Again\n\
                   Heat,1995,https://example.com,YES\n\
                   Alien,1979,https://example.com,maybe\n\
                   Ronin,1998,https://example.com,\n";

        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 3);

        let movies = store.all_newest_first().await.unwrap();
        let flag = |name: &str| movies.iter().find(|m| m.name == name).unwrap().watch_again;
        assert!(flag("Heat"));
        assert!(!flag("Alien"));
        assert!(!flag("Ronin"));
    }

    #[tokio::test]
    async fn export_reimport_round_trips() {
        let store = catalogue().await;
        let csv = "Name,Year,IMDb,Rating,Tags,Watch Again\n\
                   Heat,1995,https://example.com/heat,8.3,\"Crime, Thriller\",yes\n\
                   Alien,1979,https://example.com/alien,,Horror,no\n";
        let report = import_csv(&store, &offline_tmdb(), csv.as_bytes(), 0).await.unwrap();
        assert_eq!(report.added, 2);

        let exported = export_csv(&store.all_newest_first().await.unwrap()).unwrap();

        // Into a fresh catalogue: identical tuples come back.
        let fresh = catalogue().await;
        let report = import_csv(&fresh, &offline_tmdb(), &exported, 0).await.unwrap();
        assert_eq!(report.added, 2);
        assert!(report.errors.is_empty());

        // Insertion order differs between the two catalogues, so compare
        // the tuples keyed by (name, year) rather than positionally.
        let tuples = |movies: Vec<movie::Model>| {
            let mut tuples: Vec<_> = movies
                .into_iter()
                .map(|m| (m.name, m.year, m.rating, m.tags, m.watch_again))
                .collect();
            tuples.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
            tuples
        };
        let before = tuples(store.all_newest_first().await.unwrap());
        let after = tuples(fresh.all_newest_first().await.unwrap());
        assert_eq!(before, after);

        // Into the same catalogue: every row is rejected as existing.
        let report = import_csv(&store, &offline_tmdb(), &exported, 0).await.unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.error_count(), 2);
        assert!(report.errors.iter().all(|e| e.contains("already exists")));
    }

    #[tokio::test]
    async fn rating_precision_survives_round_trip() {
        let store = catalogue().await;
        let created = store
            .create(NewMovie {
                name: "Heat".to_string(),
                year: 1995,
                imdb_link: "https://example.com".to_string(),
                rating: Some(8.25),
                ..Default::default()
            })
            .await
            .unwrap();
        // Ratings land in the store already rounded to the exported precision.
        assert_eq!(created.rating, Some(8.3));

        let exported = export_csv(&store.all_newest_first().await.unwrap()).unwrap();
        let fresh = catalogue().await;
        import_csv(&fresh, &offline_tmdb(), &exported, 0).await.unwrap();

        let reimported = &fresh.all_newest_first().await.unwrap()[0];
        assert_eq!(reimported.rating, created.rating);
    }

    #[tokio::test]
    async fn export_formats_fields() {
        let store = catalogue().await;
        store
            .create(NewMovie {
                name: "Heat".to_string(),
                year: 1995,
                imdb_link: "https://example.com".to_string(),
                rating: Some(8.0),
                watch_again: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let out = export_csv(&store.all_newest_first().await.unwrap()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), EXPORT_COLUMNS.join(","));

        let row = lines.next().unwrap();
        assert!(row.starts_with("Heat,1995,https://example.com,"));
        assert!(row.contains(",8.0,"));
        assert!(row.contains(",Yes,"));
    }

    #[test]
    fn error_summary_caps_at_five() {
        let report = ImportReport {
            added: 0,
            errors: (2..10).map(|n| format!("Row {n}: bad")).collect(),
        };
        let summary = report.error_summary().unwrap();
        assert!(summary.starts_with("8 errors occurred:"));
        assert!(summary.contains("Row 6: bad"));
        assert!(!summary.contains("Row 7: bad"));
        assert!(summary.ends_with("... and 3 more errors"));
    }

    #[test]
    fn filename_embeds_timestamp() {
        let name = export_filename();
        assert!(name.starts_with("filmshelf_backup_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "filmshelf_backup_YYYYMMDD_HHMMSS.csv".len());
    }
}
