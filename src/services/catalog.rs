use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{normalize_movies, Movie, RawMovie, SimilarUser, UserRating, MAX_LIMIT},
    services::{
        envelope::{self, EndpointFamily},
        transport::{Method, Transport},
    },
};

const MIN_RATING: f64 = 0.5;
const MAX_RATING: f64 = 5.0;
const MAX_TAG_LEN: usize = 255;

/// Movie lookups and rating/tag writes against the scoring service
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
}

impl CatalogClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn get_list(
        &self,
        family: EndpointFamily,
        path: &str,
        query: &[(String, String)],
    ) -> AppResult<Vec<Value>> {
        let payload = self.transport.send(Method::Get, path, query, None).await?;
        Ok(envelope::unwrap_list(family, payload)?)
    }

    async fn acknowledge(&self, path: &str, body: Value) -> AppResult<String> {
        let payload = self
            .transport
            .send(Method::Post, path, &[], Some(body))
            .await?;
        let message = envelope::unwrap(EndpointFamily::Acknowledgement, payload)?;
        Ok(message.as_str().unwrap_or("OK").to_string())
    }

    /// Title search, `GET /movies/search?q=`
    pub async fn search_movies(&self, query: &str, limit: u32) -> AppResult<Vec<Movie>> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Err(AppError::InvalidInput(
                "Search query must be at least 2 characters".to_string(),
            ));
        }
        if query.chars().count() > 200 {
            return Err(AppError::InvalidInput(
                "Search query must be at most 200 characters".to_string(),
            ));
        }
        check_limit(limit)?;

        let raw = self
            .get_list(
                EndpointFamily::Movies,
                "/movies/search",
                &[
                    ("q".to_string(), query.to_string()),
                    ("limit".to_string(), limit.to_string()),
                ],
            )
            .await?;
        let batch = normalize_movies(raw)?;

        tracing::info!(
            query = %query,
            results = batch.movies.len(),
            skipped = batch.skipped,
            "Movie search completed"
        );
        Ok(batch.movies)
    }

    pub async fn movie_by_id(&self, movie_id: i64) -> AppResult<Movie> {
        check_id("movie", movie_id)?;
        let payload = self
            .transport
            .send(Method::Get, &format!("/movies/{}", movie_id), &[], None)
            .await?;

        match envelope::unwrap(EndpointFamily::Movies, payload)? {
            Value::Null => Err(AppError::NotFound(format!("Movie {}", movie_id))),
            data => {
                let raw: RawMovie = serde_json::from_value(data).map_err(|e| {
                    AppError::ExternalApi(format!("Malformed movie record: {}", e))
                })?;
                Ok(Movie::from(raw))
            }
        }
    }

    pub async fn movies_by_genre(&self, genre: &str, limit: u32) -> AppResult<Vec<Movie>> {
        let genre = genre.trim();
        if genre.chars().count() < 2 || genre.chars().count() > 50 {
            return Err(AppError::InvalidInput(
                "Genre must be between 2 and 50 characters".to_string(),
            ));
        }
        check_limit(limit)?;

        let raw = self
            .get_list(
                EndpointFamily::Movies,
                &format!("/movies/genre/{}", path_segment(genre)?),
                &[("limit".to_string(), limit.to_string())],
            )
            .await?;
        Ok(normalize_movies(raw)?.movies)
    }

    /// Users with similar taste, most similar first
    pub async fn similar_users(&self, user_id: i64, limit: u32) -> AppResult<Vec<SimilarUser>> {
        check_id("user", user_id)?;
        check_limit(limit)?;

        let raw = self
            .get_list(
                EndpointFamily::Movies,
                &format!("/recommendations/similar-users/{}", user_id),
                &[("limit".to_string(), limit.to_string())],
            )
            .await?;
        Ok(parse_records(raw))
    }

    pub async fn user_ratings(&self, user_id: i64) -> AppResult<Vec<UserRating>> {
        check_id("user", user_id)?;
        let raw = self
            .get_list(
                EndpointFamily::Ratings,
                &format!("/ratings/user/{}", user_id),
                &[],
            )
            .await?;
        Ok(parse_records(raw))
    }

    /// Adds or updates a rating; returns the service's confirmation message
    pub async fn rate_movie(&self, user_id: i64, movie_id: i64, rating: f64) -> AppResult<String> {
        check_id("user", user_id)?;
        check_id("movie", movie_id)?;
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(AppError::InvalidInput(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }

        let message = self
            .acknowledge(
                "/ratings",
                json!({ "userId": user_id, "movieId": movie_id, "rating": rating }),
            )
            .await?;
        tracing::info!(user_id, movie_id, rating, "Rating saved");
        Ok(message)
    }

    pub async fn add_tag(&self, user_id: i64, movie_id: i64, tag: &str) -> AppResult<String> {
        check_id("user", user_id)?;
        check_id("movie", movie_id)?;
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(AppError::InvalidInput("Tag cannot be empty".to_string()));
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(AppError::InvalidInput(format!(
                "Tag must be at most {} characters",
                MAX_TAG_LEN
            )));
        }

        let message = self
            .acknowledge(
                "/tags",
                json!({ "userId": user_id, "movieId": movie_id, "tag": tag }),
            )
            .await?;
        tracing::info!(user_id, movie_id, tag = %tag, "Tag added");
        Ok(message)
    }
}

/// Percent-encodes user input as a single path segment
///
/// `/`, `?` and `#` are escaped so the value cannot change the route.
fn path_segment(raw: &str) -> AppResult<String> {
    let mut url = reqwest::Url::parse("http://localhost/")
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| AppError::InvalidInput(format!("Cannot encode path segment `{}`", raw)))?
        .pop_if_empty()
        .push(raw);
    Ok(url.path().trim_start_matches('/').to_string())
}

fn check_limit(limit: u32) -> AppResult<()> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "Limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(())
}

fn check_id(kind: &str, id: i64) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::InvalidInput(format!(
            "{} id must be positive, got {}",
            kind, id
        )));
    }
    Ok(())
}

fn parse_records<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| {
            serde_json::from_value(value)
                .map_err(|e| tracing::warn!(error = %e, "Skipping malformed record"))
                .ok()
        })
        .collect()
}
