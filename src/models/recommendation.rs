use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Movie, DEFAULT_LIMIT};
use crate::{error::OrchestratorError, tracking::RequestId};

/// Who or what a recommendation is computed for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub user_id: Option<i64>,
    pub movie_id: Option<i64>,
}

impl Subject {
    pub fn user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            movie_id: None,
        }
    }

    pub fn movie(movie_id: i64) -> Self {
        Self {
            user_id: None,
            movie_id: Some(movie_id),
        }
    }

    pub fn with_movie(mut self, movie_id: i64) -> Self {
        self.movie_id = Some(movie_id);
        self
    }
}

/// A single strategy invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationRequest {
    /// Strategy name, resolved against the registry when the request runs
    pub strategy: String,
    pub subject: Subject,
    pub limit: u32,
    /// Additional query parameters. Sorted by key so fingerprints are stable.
    pub extra_params: BTreeMap<String, String>,
}

impl RecommendationRequest {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            subject: Subject::default(),
            limit: DEFAULT_LIMIT,
            extra_params: BTreeMap::new(),
        }
    }

    pub fn for_user(mut self, user_id: i64) -> Self {
        self.subject.user_id = Some(user_id);
        self
    }

    pub fn for_movie(mut self, movie_id: i64) -> Self {
        self.subject.movie_id = Some(movie_id);
        self
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            strategy: self.strategy.clone(),
            user_id: self.subject.user_id,
            movie_id: self.subject.movie_id,
            limit: self.limit,
            extra_params: self
                .extra_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Identity of a request for in-flight deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub strategy: String,
    pub user_id: Option<i64>,
    pub movie_id: Option<i64>,
    pub limit: u32,
    pub extra_params: Vec<(String, String)>,
}

/// Ranked movies returned by one strategy
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub strategy: String,
    /// Service ranking order, never re-sorted
    pub items: Vec<Movie>,
    /// Records in the response that could not be read as movies
    pub skipped: usize,
    pub fetched_at: DateTime<Utc>,
    /// Subject the request was built for, checked before applying the result
    pub subject: Subject,
    pub request_id: RequestId,
}

impl RecommendationResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub type ComparisonOutcome = Result<RecommendationResult, OrchestratorError>;

/// Per-strategy outcomes of a side-by-side comparison
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub subject: Subject,
    pub limit: u32,
    pub entries: BTreeMap<String, ComparisonOutcome>,
}

impl ComparisonResult {
    pub fn get(&self, strategy: &str) -> Option<&ComparisonOutcome> {
        self.entries.get(strategy)
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &RecommendationResult)> {
        self.entries
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().ok().map(|r| (name.as_str(), r)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &OrchestratorError)> {
        self.entries
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|e| (name.as_str(), e)))
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON view with failures rendered as messages
    pub fn to_json(&self) -> serde_json::Value {
        let entries: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(name, outcome)| {
                let value = match outcome {
                    Ok(result) => serde_json::json!({ "ok": result }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                (name.clone(), value)
            })
            .collect();

        serde_json::json!({
            "subject": self.subject,
            "limit": self.limit,
            "succeeded": self.success_count(),
            "failed": self.failure_count(),
            "entries": entries,
        })
    }
}

/// Comparison computed by the service in a single call
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteComparison {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub movie_id: Option<i64>,
    pub movie_title: Option<String>,
    /// Keyed by registry strategy name
    pub methods: BTreeMap<String, Vec<Movie>>,
}

/// A user with similar taste, from `/recommendations/similar-users/{userId}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarUser {
    pub user_id: i64,
    pub username: String,
    pub similarity_score: f64,
    #[serde(default)]
    pub common_movies: u32,
}

/// One rating in a user's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRating {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub rating: f64,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}
