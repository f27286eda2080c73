use serde_json::Value;

use crate::error::TransportError;

/// Endpoint families and the envelope fields each one answers under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointFamily {
    /// `/recommendations/{strategy}/...`
    Recommendations,
    /// `POST /recommendations/compare`
    Comparison,
    /// `/movies/...`, `/recommendations/similar-users/...`
    Movies,
    /// `GET /ratings/...`
    Ratings,
    /// `GET /tags/...`
    Tags,
    /// `POST /users`, `POST /users/authenticate`, `GET /users/{id}`
    Users,
    /// `GET /users/{id}/profile`
    Profile,
    /// Writes answering `{success, message}`
    Acknowledgement,
}

impl EndpointFamily {
    /// Fields probed in order; the first one present wins
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            EndpointFamily::Recommendations => &["data", "results"],
            EndpointFamily::Comparison => &["results", "data"],
            EndpointFamily::Movies | EndpointFamily::Ratings | EndpointFamily::Tags => &["data"],
            EndpointFamily::Users => &["user", "data"],
            EndpointFamily::Profile => &["profile", "user", "data"],
            EndpointFamily::Acknowledgement => &["message"],
        }
    }
}

/// A 2xx body that still reports `success: false` is a failure, not an empty result
fn ensure_success(payload: &Value) -> Result<(), TransportError> {
    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        let message = ["error", "message"]
            .iter()
            .find_map(|field| payload.get(*field).and_then(Value::as_str))
            .map(str::to_string);
        return Err(TransportError::HttpStatus {
            status: None,
            message,
        });
    }
    Ok(())
}

/// Returns the enveloped value, or `Value::Null` when none of the family's fields are present
pub fn unwrap(family: EndpointFamily, mut payload: Value) -> Result<Value, TransportError> {
    ensure_success(&payload)?;

    for field in family.fields() {
        if let Some(value) = payload.get_mut(*field) {
            if !value.is_null() {
                return Ok(value.take());
            }
        }
    }
    Ok(Value::Null)
}

/// Like [`unwrap`] but for list endpoints
///
/// A missing envelope is an empty list. An envelope field holding anything
/// other than a list is a malformed body, never an empty result.
pub fn unwrap_list(family: EndpointFamily, payload: Value) -> Result<Vec<Value>, TransportError> {
    if let Value::Array(items) = payload {
        return Ok(items);
    }

    match unwrap(family, payload)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => {
            tracing::error!(
                family = ?family,
                kind = %json_kind(&other),
                "Envelope did not contain a list"
            );
            Err(TransportError::malformed(format!(
                "expected a list of records, got {}",
                json_kind(&other)
            )))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
