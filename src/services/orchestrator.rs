use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::Instrument;

use crate::{
    error::OrchestratorError,
    models::{normalize_movies, Fingerprint, RecommendationRequest, RecommendationResult, MAX_LIMIT},
    services::{
        envelope::{self, EndpointFamily},
        strategy::{self, StrategyKind, StrategySpec},
        transport::{Method, QueryPairs, Transport},
    },
    tracking::{request_span, RequestId},
};

type Outcome = Result<RecommendationResult, OrchestratorError>;
type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;
type InFlightMap = HashMap<Fingerprint, InFlight>;

/// One outbound request and the callers currently waiting on it
struct InFlight {
    request_id: RequestId,
    outcome: SharedOutcome,
    waiters: usize,
}

/// Query keys the orchestrator owns; extra params may not override them
const RESERVED_PARAMS: [&str; 2] = ["limit", "movieId"];

/// Path and query for one strategy call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub query: QueryPairs,
}

/// Builds the request for a validated strategy
///
/// Query order is fixed: `limit`, then `movieId` (hybrid only), then extra params by key.
pub fn build_endpoint(spec: &StrategySpec, request: &RecommendationRequest) -> Endpoint {
    let subject = request.subject;
    let user = subject.user_id.unwrap_or_default();
    let movie = subject.movie_id.unwrap_or_default();

    let path = match spec.kind {
        StrategyKind::Popular => "/recommendations/popular".to_string(),
        StrategyKind::Content => format!("/recommendations/content/{}", movie),
        StrategyKind::Item => format!("/recommendations/item/{}", movie),
        StrategyKind::Collaborative => format!("/recommendations/collaborative/{}", user),
        StrategyKind::Hybrid => format!("/recommendations/hybrid/{}", user),
    };

    let mut query: QueryPairs = vec![("limit".to_string(), request.limit.to_string())];
    if spec.kind == StrategyKind::Hybrid {
        if let Some(movie_id) = subject.movie_id {
            query.push(("movieId".to_string(), movie_id.to_string()));
        }
    }
    for (key, value) in &request.extra_params {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            tracing::debug!(param = %key, "Ignoring extra param that shadows a built-in one");
            continue;
        }
        query.push((key.clone(), value.clone()));
    }

    Endpoint { path, query }
}

/// Chooses, validates and runs recommendation strategies
///
/// Concurrent calls with the same fingerprint share one outbound request and
/// all receive its outcome. Failed calls are never retried here. When every
/// caller of a request has been dropped, the request is abandoned and its
/// fingerprint is free again.
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    in_flight: Arc<Mutex<InFlightMap>>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Number of distinct requests currently awaiting the service
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub async fn recommend(&self, request: RecommendationRequest) -> Outcome {
        let spec = strategy::resolve(&request.strategy)?;

        if request.limit == 0 || request.limit > MAX_LIMIT {
            return Err(OrchestratorError::InvalidLimit {
                limit: request.limit,
                max: MAX_LIMIT,
            });
        }

        if let Err(kind) = strategy::validate(spec, &request) {
            tracing::debug!(strategy = spec.name, precondition = ?kind, "Strategy precondition failed");
            return Err(OrchestratorError::PreconditionFailed(kind));
        }

        let fingerprint = request.fingerprint();

        // Check-and-insert under one lock so two callers cannot both miss
        let (request_id, pending) = {
            let mut in_flight = lock(&self.in_flight);
            let entry = match in_flight.entry(fingerprint.clone()) {
                Entry::Occupied(occupied) => {
                    tracing::debug!(strategy = spec.name, "Joining in-flight request");
                    occupied.into_mut()
                }
                Entry::Vacant(vacant) => {
                    let request_id = RequestId::new();
                    let outcome = self.dispatch(spec, request, fingerprint.clone(), request_id);
                    vacant.insert(InFlight {
                        request_id,
                        outcome,
                        waiters: 0,
                    })
                }
            };
            entry.waiters += 1;
            (entry.request_id, entry.outcome.clone())
        };

        let _waiter = Waiter {
            in_flight: &self.in_flight,
            fingerprint,
            request_id,
        };
        pending.await
    }

    fn dispatch(
        &self,
        spec: &'static StrategySpec,
        request: RecommendationRequest,
        fingerprint: Fingerprint,
        request_id: RequestId,
    ) -> SharedOutcome {
        let transport = self.transport.clone();
        let in_flight = self.in_flight.clone();
        let span = request_span(&request_id, spec.name);

        async move {
            let outcome = execute(transport, spec, request, request_id).await;
            remove_entry(&in_flight, &fingerprint, request_id);
            outcome
        }
        .instrument(span)
        .boxed()
        .shared()
    }
}

/// Counts one caller against an in-flight entry for as long as it waits
///
/// Dropping the last waiter before the request settles removes the entry,
/// which drops the pending request with it.
struct Waiter<'a> {
    in_flight: &'a Mutex<InFlightMap>,
    fingerprint: Fingerprint,
    request_id: RequestId,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let abandoned = {
            let mut in_flight = lock(self.in_flight);
            let last = match in_flight.get_mut(&self.fingerprint) {
                Some(entry) if entry.request_id == self.request_id => {
                    entry.waiters -= 1;
                    entry.waiters == 0
                }
                _ => false,
            };
            if last {
                in_flight.remove(&self.fingerprint)
            } else {
                None
            }
        };

        if let Some(entry) = abandoned {
            tracing::debug!(
                request_id = %entry.request_id,
                "Abandoning request with no remaining callers"
            );
        }
    }
}

/// Removes the entry only if it still belongs to `request_id`
///
/// The removed entry is returned so it is dropped outside the lock.
fn remove_entry(
    in_flight: &Mutex<InFlightMap>,
    fingerprint: &Fingerprint,
    request_id: RequestId,
) -> Option<InFlight> {
    let mut in_flight = lock(in_flight);
    match in_flight.get(fingerprint) {
        Some(entry) if entry.request_id == request_id => in_flight.remove(fingerprint),
        _ => None,
    }
}

async fn execute(
    transport: Arc<dyn Transport>,
    spec: &'static StrategySpec,
    request: RecommendationRequest,
    request_id: RequestId,
) -> Outcome {
    let endpoint = build_endpoint(spec, &request);
    tracing::debug!(
        path = %endpoint.path,
        query = ?endpoint.query,
        transport = transport.name(),
        "Dispatching recommendation request"
    );

    let payload = transport
        .send(Method::Get, &endpoint.path, &endpoint.query, None)
        .await
        .map_err(|e| {
            tracing::error!(strategy = spec.name, error = %e, "Recommendation request failed");
            OrchestratorError::Upstream(e)
        })?;

    let raw = envelope::unwrap_list(EndpointFamily::Recommendations, payload)?;
    let batch = normalize_movies(raw).map_err(|e| {
        tracing::error!(strategy = spec.name, error = %e, "Unreadable recommendation list");
        OrchestratorError::Upstream(e)
    })?;

    tracing::info!(
        strategy = spec.name,
        items = batch.movies.len(),
        skipped = batch.skipped,
        user_id = ?request.subject.user_id,
        movie_id = ?request.subject.movie_id,
        "Recommendations fetched"
    );

    Ok(RecommendationResult {
        strategy: spec.name.to_string(),
        items: batch.movies,
        skipped: batch.skipped,
        fetched_at: Utc::now(),
        subject: request.subject,
        request_id,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
