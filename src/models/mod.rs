use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub mod identity;
pub mod recommendation;

pub use identity::{Credentials, Identity, Registration};
pub use recommendation::{
    ComparisonOutcome, ComparisonResult, Fingerprint, RecommendationRequest,
    RecommendationResult, RemoteComparison, SimilarUser, Subject, UserRating,
};

/// Largest result count the scoring service accepts
pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_LIMIT: u32 = 10;

/// Matches a trailing release year, e.g. `"Toy Story (1995)"`
static TRAILING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\((\d{4})\)\s*$").expect("static regex is valid"));

/// Canonical movie shape handed to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub movie_id: i64,
    pub title: String,
    pub genres: Vec<String>,
    pub year: Option<String>,
    pub average_rating: Option<f64>,
    pub rating_count: Option<u64>,
    /// Strategy-specific score (similarity, predicted rating, ...) when the service sends one
    pub score: Option<f64>,
}

impl Movie {
    /// Release year, either sent by the service or split off the title
    pub fn display_year(&self) -> Option<&str> {
        self.year.as_deref()
    }
}

// ============================================================================
// Scoring service wire types
// ============================================================================

/// Genres arrive either pipe-delimited (`"Action|Sci-Fi"`) or as a list
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawGenres {
    Delimited(String),
    List(Vec<String>),
}

impl RawGenres {
    pub fn normalize(self) -> Vec<String> {
        match self {
            RawGenres::Delimited(joined) => joined
                .split('|')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect(),
            RawGenres::List(list) => list,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawYear {
    Text(String),
    Number(i64),
}

impl From<RawYear> for String {
    fn from(year: RawYear) -> Self {
        match year {
            RawYear::Text(text) => text,
            RawYear::Number(n) => n.to_string(),
        }
    }
}

/// Movie record as the scoring service emits it
#[derive(Debug, Clone, Deserialize)]
pub struct RawMovie {
    #[serde(rename = "movieId", alias = "movie_id")]
    pub movie_id: i64,
    pub title: String,
    #[serde(default)]
    pub genres: Option<RawGenres>,
    #[serde(default)]
    pub year: Option<RawYear>,
    #[serde(default, rename = "averageRating", alias = "avg_rating")]
    pub average_rating: Option<f64>,
    #[serde(default, rename = "ratingCount", alias = "rating_count")]
    pub rating_count: Option<f64>,
    #[serde(
        default,
        alias = "similarity",
        alias = "similarity_score",
        alias = "predicted_rating"
    )]
    pub score: Option<f64>,
}

impl From<RawMovie> for Movie {
    fn from(raw: RawMovie) -> Self {
        let explicit_year = raw
            .year
            .map(String::from)
            .filter(|y| !y.trim().is_empty());

        // Only split the title when the service did not send a year
        let (title, year) = match explicit_year {
            Some(year) => (raw.title, Some(year)),
            None => split_title(&raw.title),
        };

        Movie {
            movie_id: raw.movie_id,
            title,
            genres: raw.genres.map(RawGenres::normalize).unwrap_or_default(),
            year,
            average_rating: raw.average_rating,
            rating_count: raw
                .rating_count
                .filter(|c| c.is_finite() && *c >= 0.0)
                .map(|c| c as u64),
            score: raw.score,
        }
    }
}

/// Splits `"Title (YYYY)"` into `("Title", Some("YYYY"))`.
/// Titles without a trailing year come back unchanged.
pub fn split_title(title: &str) -> (String, Option<String>) {
    match TRAILING_YEAR.captures(title) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (title.to_string(), None),
    }
}

/// Movies read from one response list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieBatch {
    /// In service order
    pub movies: Vec<Movie>,
    /// Records that could not be read as movies
    pub skipped: usize,
}

/// Normalizes a list of raw JSON movie objects
///
/// Individual malformed records are skipped and counted. A non-empty list in
/// which no record could be read is a malformed body, not an empty result.
pub fn normalize_movies(values: Vec<serde_json::Value>) -> Result<MovieBatch, TransportError> {
    let total = values.len();
    let mut batch = MovieBatch::default();
    let mut last_error = None;

    for value in values {
        match serde_json::from_value::<RawMovie>(value) {
            Ok(raw) => batch.movies.push(Movie::from(raw)),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed movie record");
                batch.skipped += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if batch.movies.is_empty() => Err(TransportError::malformed(format!(
            "none of {} movie records could be read ({})",
            total, e
        ))),
        _ => Ok(batch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_title_with_year() {
        assert_eq!(
            split_title("Toy Story (1995)"),
            ("Toy Story".to_string(), Some("1995".to_string()))
        );
    }

    #[test]
    fn test_split_title_only_uses_trailing_year() {
        assert_eq!(
            split_title("Ocean's Eleven (a.k.a. Ocean's 11) (1960)"),
            (
                "Ocean's Eleven (a.k.a. Ocean's 11)".to_string(),
                Some("1960".to_string())
            )
        );
        assert_eq!(
            split_title("2001: A Space Odyssey"),
            ("2001: A Space Odyssey".to_string(), None)
        );
        assert_eq!(
            split_title("Blade Runner (Final Cut)"),
            ("Blade Runner (Final Cut)".to_string(), None)
        );
    }

    #[test]
    fn test_pipe_delimited_genres_are_split_in_order() {
        let genres = RawGenres::Delimited("Action|Sci-Fi|Thriller".to_string());
        assert_eq!(genres.normalize(), vec!["Action", "Sci-Fi", "Thriller"]);
    }

    #[test]
    fn test_genre_list_is_identity() {
        let list = vec!["Drama".to_string(), "Comedy".to_string()];
        assert_eq!(RawGenres::List(list.clone()).normalize(), list);
    }

    #[test]
    fn test_raw_movie_from_recommender_record() {
        let raw: RawMovie = serde_json::from_value(json!({
            "movieId": 1,
            "title": "Toy Story (1995)",
            "genres": "Adventure|Animation|Children|Comedy|Fantasy",
            "avg_rating": 3.92,
            "rating_count": 215,
            "similarity": 0.87
        }))
        .unwrap();

        let movie = Movie::from(raw);
        assert_eq!(movie.movie_id, 1);
        assert_eq!(movie.title, "Toy Story");
        assert_eq!(movie.year.as_deref(), Some("1995"));
        assert_eq!(movie.genres.len(), 5);
        assert_eq!(movie.genres[0], "Adventure");
        assert_eq!(movie.average_rating, Some(3.92));
        assert_eq!(movie.rating_count, Some(215));
        assert_eq!(movie.score, Some(0.87));
    }

    #[test]
    fn test_explicit_year_keeps_title() {
        let raw: RawMovie = serde_json::from_value(json!({
            "movieId": 2,
            "title": "Jumanji (1995)",
            "genres": ["Adventure", "Children"],
            "year": 1995
        }))
        .unwrap();

        let movie = Movie::from(raw);
        assert_eq!(movie.title, "Jumanji (1995)");
        assert_eq!(movie.display_year(), Some("1995"));
        assert_eq!(movie.genres, vec!["Adventure", "Children"]);
    }

    #[test]
    fn test_missing_optional_fields() {
        let raw: RawMovie = serde_json::from_value(json!({
            "movieId": 3,
            "title": "Grumpier Old Men"
        }))
        .unwrap();

        let movie = Movie::from(raw);
        assert!(movie.genres.is_empty());
        assert_eq!(movie.year, None);
        assert_eq!(movie.average_rating, None);
        assert_eq!(movie.rating_count, None);
    }

    #[test]
    fn test_normalize_movies_skips_malformed_and_keeps_order() {
        let movies = normalize_movies(vec![
            json!({"movieId": 10, "title": "GoldenEye (1995)"}),
            json!({"title": "No id"}),
            json!({"movieId": 5, "title": "Father of the Bride Part II (1995)"}),
            json!({"movieId": 10, "title": "GoldenEye (1995)"}),
        ])
        .unwrap();

        let ids: Vec<i64> = movies.movies.iter().map(|m| m.movie_id).collect();
        assert_eq!(ids, vec![10, 5, 10]);
        assert_eq!(movies.skipped, 1);
    }

    #[test]
    fn test_all_malformed_records_are_an_error() {
        let err = normalize_movies(vec![
            json!({"title": "No id"}),
            json!({"id": 4, "name": "Waiting to Exhale"}),
        ])
        .unwrap_err();

        match err {
            TransportError::NetworkFailure { message } => {
                assert!(message.starts_with("Malformed response body: none of 2 movie records"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_empty_list_is_empty_batch() {
        assert_eq!(normalize_movies(Vec::new()).unwrap(), MovieBatch::default());
    }

    #[test]
    fn test_movie_serializes_camel_case() {
        let movie = Movie {
            movie_id: 1,
            title: "Toy Story".to_string(),
            genres: vec!["Animation".to_string()],
            year: Some("1995".to_string()),
            average_rating: None,
            rating_count: None,
            score: None,
        };
        let value = serde_json::to_value(&movie).unwrap();
        assert_eq!(value["movieId"], 1);
        assert_eq!(value["averageRating"], serde_json::Value::Null);
    }
}
