use std::fmt;

/// Failures at the HTTP boundary with the scoring service
///
/// Cloneable so a single in-flight outcome can be handed to every caller that
/// joined the same request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Host unreachable, timeout, or a body that could not be read as JSON
    #[error("Network failure: {message}")]
    NetworkFailure { message: String },

    /// The service reported a failure
    ///
    /// `status` is the HTTP status of a non-2xx reply. It is `None` when the
    /// reply was 2xx but the body said `success: false`.
    #[error("{}", describe_http_failure(.status, .message))]
    HttpStatus {
        status: Option<u16>,
        message: Option<String>,
    },
}

fn describe_http_failure(status: &Option<u16>, message: &Option<String>) -> String {
    let message = message.as_deref().unwrap_or("no message");
    match status {
        Some(status) => format!("Scoring service returned status {}: {}", status, message),
        None => format!("Scoring service reported failure: {}", message),
    }
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        TransportError::NetworkFailure {
            message: message.into(),
        }
    }

    /// A body that parsed as JSON but not into the shape the endpoint promises
    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        TransportError::network(format!("Malformed response body: {}", detail))
    }

    /// True for a 2xx reply whose body carried `success: false`
    pub fn is_reported_failure(&self) -> bool {
        matches!(self, TransportError::HttpStatus { status: None, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => *status,
            TransportError::NetworkFailure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            TransportError::NetworkFailure { message } => Some(message),
            TransportError::HttpStatus { message, .. } => message.as_deref(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::network(err.to_string())
    }
}

/// Client-detectable preconditions a strategy can fail before any request is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreconditionKind {
    MissingAuth,
    MissingSubjectItem,
}

impl fmt::Display for PreconditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionKind::MissingAuth => write!(f, "a signed-in user is required"),
            PreconditionKind::MissingSubjectItem => write!(f, "a reference movie is required"),
        }
    }
}

/// Errors surfaced by the recommendation orchestrator and comparison engine
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Unknown recommendation strategy: {0}")]
    UnknownStrategy(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(PreconditionKind),

    #[error("Invalid limit {limit}: must be between 1 and {max}")]
    InvalidLimit { limit: u32, max: u32 },

    #[error("Upstream error: {0}")]
    Upstream(#[from] TransportError),
}

impl OrchestratorError {
    pub fn is_precondition(&self) -> bool {
        matches!(self, OrchestratorError::PreconditionFailed(_))
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            OrchestratorError::Upstream(err) => err.status(),
            _ => None,
        }
    }
}

/// Session persistence errors
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Session storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No location available for session storage")]
    NoStorageLocation,
}

/// Application-level errors for catalog and account operations
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected response from scoring service: {0}")]
    ExternalApi(String),
}

pub type AppResult<T> = Result<T, AppError>;
