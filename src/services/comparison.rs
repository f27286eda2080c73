use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::{OrchestratorError, PreconditionKind, TransportError},
    models::{
        normalize_movies, ComparisonResult, RecommendationRequest, RemoteComparison, Subject,
    },
    services::{
        envelope::{self, EndpointFamily},
        orchestrator::Orchestrator,
        strategy,
        transport::Method,
    },
};

/// Largest per-method count the service's compare endpoint accepts
pub const REMOTE_COMPARE_MAX_LIMIT: u32 = 50;

/// Runs several strategies side by side against one subject
#[derive(Clone)]
pub struct ComparisonEngine {
    orchestrator: Orchestrator,
}

impl ComparisonEngine {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Fans out one request per strategy and waits for all of them to settle
    ///
    /// A failing strategy is recorded under its name and never cancels the others.
    pub async fn compare<I, S>(&self, strategies: I, subject: Subject, limit: u32) -> ComparisonResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = strategies.into_iter().map(Into::into).collect();

        let futures = names.into_iter().map(|name| {
            let orchestrator = self.orchestrator.clone();
            async move {
                let request = RecommendationRequest::new(name.clone())
                    .with_subject(subject)
                    .with_limit(limit);
                let outcome = orchestrator.recommend(request).await;
                if let Err(e) = &outcome {
                    tracing::warn!(strategy = %name, error = %e, "Strategy failed during comparison");
                }
                (name, outcome)
            }
        });

        let entries: BTreeMap<_, _> = join_all(futures).await.into_iter().collect();
        let result = ComparisonResult {
            subject,
            limit,
            entries,
        };

        if result.failure_count() > 0 {
            tracing::warn!(
                success_count = result.success_count(),
                error_count = result.failure_count(),
                "Partial comparison failure"
            );
        } else {
            tracing::info!(strategies = result.len(), "Comparison completed");
        }

        result
    }

    /// Compares every registered strategy
    pub async fn compare_all(&self, subject: Subject, limit: u32) -> ComparisonResult {
        self.compare(strategy::names(), subject, limit).await
    }

    /// Asks the service to run its own comparison in one call
    pub async fn compare_remote(
        &self,
        subject: Subject,
        limit: u32,
    ) -> Result<RemoteComparison, OrchestratorError> {
        let user_id = subject
            .user_id
            .ok_or(OrchestratorError::PreconditionFailed(PreconditionKind::MissingAuth))?;

        if limit == 0 || limit > REMOTE_COMPARE_MAX_LIMIT {
            return Err(OrchestratorError::InvalidLimit {
                limit,
                max: REMOTE_COMPARE_MAX_LIMIT,
            });
        }

        let methods: Vec<&str> = strategy::names().collect();
        let mut body = json!({
            "userId": user_id,
            "n": limit,
            "methods": methods,
        });
        if let Some(movie_id) = subject.movie_id {
            body["movieId"] = json!(movie_id);
        }

        let payload = self
            .orchestrator
            .transport()
            .send(Method::Post, "/recommendations/compare", &[], Some(body))
            .await?;

        let data = envelope::unwrap(EndpointFamily::Comparison, payload)?;
        let comparison = parse_remote_comparison(data, subject).map_err(|e| {
            tracing::error!(user_id = user_id, error = %e, "Unreadable remote comparison");
            OrchestratorError::Upstream(e)
        })?;

        tracing::info!(
            user_id = user_id,
            methods = comparison.methods.len(),
            "Remote comparison completed"
        );

        Ok(comparison)
    }
}

/// Maps the service's method keys onto registry names
fn canonical_method_name(key: &str) -> &str {
    match key {
        "content_based" => "content",
        "item_based" => "item",
        other => other,
    }
}

fn parse_remote_comparison(
    data: Value,
    subject: Subject,
) -> Result<RemoteComparison, TransportError> {
    let Some(Value::Object(raw_methods)) = data.get("methods") else {
        return Err(TransportError::malformed(
            "comparison response has no `methods` object",
        ));
    };

    let mut methods = BTreeMap::new();
    for (key, value) in raw_methods {
        let Value::Array(items) = value else {
            return Err(TransportError::malformed(format!(
                "method `{}` did not hold a list",
                key
            )));
        };
        let batch = normalize_movies(items.clone())?;
        methods.insert(canonical_method_name(key).to_string(), batch.movies);
    }

    Ok(RemoteComparison {
        user_id: data
            .get("user_id")
            .and_then(Value::as_i64)
            .or(subject.user_id),
        username: data
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_string),
        movie_id: data
            .get("movie_id")
            .and_then(Value::as_i64)
            .or(subject.movie_id),
        movie_title: data
            .get("movie_title")
            .and_then(Value::as_str)
            .map(str::to_string),
        methods,
    })
}
