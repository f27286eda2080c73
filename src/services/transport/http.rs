//! reqwest-backed transport for the recommendation service
//!
//! Flow per call:
//! 1. Join `api_url` and the endpoint path, append query pairs in caller order
//! 2. Send (JSON body and `Content-Type: application/json` on writes)
//! 3. Non-2xx → `HttpStatus` with the server's `error`/`message` field
//! 4. 2xx → parse the body as JSON, or `NetworkFailure` if it is not JSON

use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

use crate::{
    config::Config,
    error::TransportError,
    services::transport::{Method, Transport},
};

#[derive(Clone)]
pub struct HttpTransport {
    http_client: HttpClient,
    api_url: String,
}

impl HttpTransport {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::new(config.api_url.clone(), config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Pulls the server's explanation out of an error body, if it sent one
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let url = self.url(path);

        let mut request = match method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
        };
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                method = %method,
                url = %url,
                error = %e,
                "Scoring service unreachable"
            );
            TransportError::from(e)
        })?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            let message = error_message(&response_text);
            tracing::error!(
                method = %method,
                url = %url,
                status = %status,
                body = %response_text,
                "Scoring service request failed"
            );
            return Err(TransportError::HttpStatus {
                status: Some(status.as_u16()),
                message,
            });
        }

        tracing::debug!(
            method = %method,
            url = %url,
            response = %response_text,
            "Raw scoring service response"
        );

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                url = %url,
                "Failed to parse scoring service response"
            );
            TransportError::network(format!("Malformed response body: {}", e))
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
