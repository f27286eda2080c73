//! Boundary with the remote scoring service
//!
//! The orchestrator, comparison engine and catalog only ever see this trait.
//! Implementations return the raw parsed JSON body; unwrapping the response
//! envelope is left to the caller, which knows the endpoint family it asked for.

use serde_json::Value;
use std::fmt;

use crate::error::TransportError;

pub mod http;

pub use http::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Query parameters in the exact order they go on the wire
pub type QueryPairs = Vec<(String, String)>;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issues one request and returns the parsed JSON body
    ///
    /// A non-success status becomes `TransportError::HttpStatus`; anything that
    /// prevents getting a JSON body at all becomes `TransportError::NetworkFailure`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value, TransportError>;

    /// Transport name for logging and debugging
    fn name(&self) -> &'static str;
}
