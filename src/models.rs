use serde::{Deserialize, Serialize};

use crate::{
    entities::movie,
    error::{AppError, AppResult},
};

pub const YEAR_MIN: i32 = 1888;
pub const YEAR_MAX: i32 = 2030;

/// Candidate values for a new or edited catalogue record. Shared by the HTML
/// form, the JSON API and the CSV importer.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewMovie {
    pub name: String,
    pub year: i32,
    pub imdb_link: String,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub poster_image: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub watch_again: bool,
    #[serde(default)]
    pub tmdb_id: Option<i32>,
}

impl NewMovie {
    /// Trims text fields, drops empty optionals and checks the field
    /// constraints. Must pass before the record reaches the store.
    pub fn normalize_and_validate(mut self) -> AppResult<Self> {
        self.name = self.name.trim().to_string();
        self.imdb_link = self.imdb_link.trim().to_string();
        self.poster_url = self.poster_url.and_then(non_empty);
        self.poster_image = self.poster_image.and_then(non_empty);
        self.notes = self.notes.and_then(non_empty);
        self.tags = self.tags.and_then(non_empty);

        if self.name.is_empty() {
            return Err(AppError::validation("movie name is required"));
        }
        if self.imdb_link.is_empty() {
            return Err(AppError::validation("reference link is required"));
        }
        if !(YEAR_MIN..=YEAR_MAX).contains(&self.year) {
            return Err(AppError::validation(format!(
                "year must be between {YEAR_MIN} and {YEAR_MAX}"
            )));
        }
        if let Some(rating) = self.rating {
            if !(0.0..=10.0).contains(&rating) {
                return Err(AppError::validation("rating must be between 0 and 10"));
            }
            // Stored at one-decimal precision, same as the export format.
            self.rating = Some((rating * 10.0).round() / 10.0);
        }

        Ok(self)
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Ordering allow-list for the read paths. Anything outside this set falls
/// back to newest-first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum Sort {
    NameAsc,
    NameDesc,
    YearAsc,
    YearDesc,
    RatingAsc,
    RatingDesc,
    DateAddedAsc,
    #[default]
    DateAddedDesc,
}

impl Sort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Sort::NameAsc),
            "-name" => Some(Sort::NameDesc),
            "year" => Some(Sort::YearAsc),
            "-year" => Some(Sort::YearDesc),
            "rating" => Some(Sort::RatingAsc),
            "-rating" => Some(Sort::RatingDesc),
            "date_added" => Some(Sort::DateAddedAsc),
            "-date_added" => Some(Sort::DateAddedDesc),
            _ => None,
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            Sort::NameAsc => "name",
            Sort::NameDesc => "-name",
            Sort::YearAsc => "year",
            Sort::YearDesc => "-year",
            Sort::RatingAsc => "rating",
            Sort::RatingDesc => "-rating",
            Sort::DateAddedAsc => "date_added",
            Sort::DateAddedDesc => "-date_added",
        }
    }
}

/// Read-path filters shared by the HTML list page and the JSON list
/// endpoint.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub year: Option<i32>,
    pub tag: Option<String>,
    pub watch_again_only: bool,
    pub min_rating: Option<f64>,
    pub sort: Sort,
}

#[derive(Clone, Debug, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatalogueStats {
    pub total_movies: u64,
    pub watch_again_count: u64,
    pub average_rating: Option<f64>,
    pub distinct_tag_count: u64,
    pub movies_by_year: Vec<YearCount>,
    pub tag_counts: Vec<TagCount>,
    #[serde(skip)]
    pub top_rated: Vec<movie::Model>,
}

impl movie::Model {
    /// Best available poster: uploaded image wins over the manual URL.
    pub fn poster(&self) -> Option<&str> {
        self.poster_image.as_deref().or(self.poster_url.as_deref())
    }

    pub fn tags_list(&self) -> Vec<String> {
        self.tags.as_deref().map(split_tags).unwrap_or_default()
    }

    pub fn date_added_display(&self) -> String {
        format_timestamp(self.date_added)
    }
}

pub fn split_tags(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

pub fn format_timestamp(secs: i64) -> String {
    jiff::Timestamp::from_second(secs)
        .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Full serializer for detail responses.
#[derive(Clone, Debug, Serialize)]
pub struct MovieDto {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub imdb_link: String,
    pub poster_url: Option<String>,
    pub poster_image: Option<String>,
    pub poster: Option<String>,
    pub rating: Option<f64>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub tags_list: Vec<String>,
    pub watch_again: bool,
    pub date_added: String,
    pub tmdb_id: Option<i32>,
}

impl From<movie::Model> for MovieDto {
    fn from(m: movie::Model) -> Self {
        Self {
            poster: m.poster().map(str::to_string),
            tags_list: m.tags_list(),
            date_added: m.date_added_display(),
            id: m.id,
            name: m.name,
            year: m.year,
            imdb_link: m.imdb_link,
            poster_url: m.poster_url,
            poster_image: m.poster_image,
            rating: m.rating,
            notes: m.notes,
            tags: m.tags,
            watch_again: m.watch_again,
            tmdb_id: m.tmdb_id,
        }
    }
}

/// Lightweight serializer for list responses.
#[derive(Clone, Debug, Serialize)]
pub struct MovieSummaryDto {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub poster: Option<String>,
    pub rating: Option<f64>,
    pub watch_again: bool,
    pub date_added: String,
}

impl From<movie::Model> for MovieSummaryDto {
    fn from(m: movie::Model) -> Self {
        Self {
            poster: m.poster().map(str::to_string),
            date_added: m.date_added_display(),
            id: m.id,
            name: m.name,
            year: m.year,
            rating: m.rating,
            watch_again: m.watch_again,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> NewMovie {
        NewMovie {
            name: "Heat".to_string(),
            year: 1995,
            imdb_link: "https://www.imdb.com/title/tt0113277/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_year_bounds() {
        for year in [YEAR_MIN, YEAR_MAX, 1995] {
            let m = NewMovie { year, ..candidate() };
            assert!(m.normalize_and_validate().is_ok(), "year {year} should pass");
        }
        for year in [YEAR_MIN - 1, YEAR_MAX + 1, 0] {
            let m = NewMovie { year, ..candidate() };
            assert!(m.normalize_and_validate().is_err(), "year {year} should fail");
        }
    }

    #[test]
    fn accepts_rating_bounds() {
        for rating in [0.0, 10.0, 7.5] {
            let m = NewMovie { rating: Some(rating), ..candidate() };
            assert!(m.normalize_and_validate().is_ok(), "rating {rating} should pass");
        }
        for rating in [-0.1, 10.1] {
            let m = NewMovie { rating: Some(rating), ..candidate() };
            assert!(m.normalize_and_validate().is_err(), "rating {rating} should fail");
        }
    }

    #[test]
    fn rounds_rating_to_one_decimal() {
        let m = NewMovie { rating: Some(8.25), ..candidate() };
        assert_eq!(m.normalize_and_validate().unwrap().rating, Some(8.3));
        let m = NewMovie { rating: Some(7.0), ..candidate() };
        assert_eq!(m.normalize_and_validate().unwrap().rating, Some(7.0));
    }

    #[test]
    fn trims_and_drops_empty_optionals() {
        let m = NewMovie {
            name: "  Heat  ".to_string(),
            poster_url: Some("   ".to_string()),
            notes: Some(" great ".to_string()),
            ..candidate()
        };
        let m = m.normalize_and_validate().unwrap();
        assert_eq!(m.name, "Heat");
        assert_eq!(m.poster_url, None);
        assert_eq!(m.notes.as_deref(), Some("great"));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let m = NewMovie { name: "  ".to_string(), ..candidate() };
        assert!(m.normalize_and_validate().is_err());
        let m = NewMovie { imdb_link: "".to_string(), ..candidate() };
        assert!(m.normalize_and_validate().is_err());
    }

    #[test]
    fn sort_allow_list() {
        assert_eq!(Sort::parse("-date_added"), Some(Sort::DateAddedDesc));
        assert_eq!(Sort::parse("name"), Some(Sort::NameAsc));
        assert_eq!(Sort::parse("-rating"), Some(Sort::RatingDesc));
        assert_eq!(Sort::parse("id"), None);
        assert_eq!(Sort::parse(""), None);
    }

    #[test]
    fn splits_tags() {
        assert_eq!(split_tags("Action, Drama ,,  Sci-Fi "), vec!["Action", "Drama", "Sci-Fi"]);
        assert!(split_tags("  ,").is_empty());
    }
}
