use serde::Serialize;
use uuid::Uuid;

/// Tag attached to every dispatched request, carried into logs and results
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Creates a new random request ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the UUID as a string
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span wrapping one outbound request to the scoring service
pub fn request_span(request_id: &RequestId, strategy: &str) -> tracing::Span {
    tracing::info_span!(
        "recommendation_request",
        request_id = %request_id,
        strategy = %strategy,
    )
}
