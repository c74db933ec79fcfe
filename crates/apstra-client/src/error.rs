//! Apstra client errors

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur when interacting with the Apstra API
#[derive(Debug, Error)]
pub enum ApstraError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (bad credentials, expired token, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The controller rejected the request because of a concurrent change
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An object with the same identity already exists
    #[error("Already exists: {0}")]
    Exists(String),

    /// A lookup expected one object but found several
    #[error("Multiple matches: {0}")]
    MultipleMatch(String),

    /// The controller is rate limiting us
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// Apstra API returned an error
    #[error("Apstra API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Flattened error text from the response body
        message: String,
    },

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Controller version is not supported by this client or feature
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    /// Wire data could not be translated into its typed form
    #[error("Cannot polish API response: {0}")]
    Polish(String),

    /// An operation did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Client configuration is incomplete or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ApstraError {
    /// Whether the failed request may succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::TooManyRequests(_))
    }

    /// Whether the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Build an error from a non-success HTTP status and its response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = flatten_error_body(body);
        match status {
            401 | 403 => Self::Authentication(message),
            404 => Self::NotFound(message),
            409 if message.to_lowercase().contains("already exists") => Self::Exists(message),
            409 => Self::Conflict(message),
            429 => Self::TooManyRequests(message),
            _ => Self::Api { status, message },
        }
    }
}

/// Shapes the controller uses for error bodies
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Fields(BTreeMap<String, serde_json::Value>),
    List(Vec<serde_json::Value>),
}

#[derive(Deserialize)]
struct ErrorBody {
    errors: Option<ErrorDetail>,
    error: Option<String>,
}

/// Reduce an error response body to one line of text.
///
/// Falls back to the raw body (truncated) when it is not one of the known shapes.
pub(crate) fn flatten_error_body(body: &str) -> String {
    let fallback = || body.chars().take(500).collect::<String>();

    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return fallback();
    };

    match (parsed.errors, parsed.error) {
        (Some(ErrorDetail::Text(text)), _) => text,
        (Some(ErrorDetail::Fields(fields)), _) => fields
            .iter()
            .map(|(field, detail)| format!("{}: {}", field, value_text(detail)))
            .collect::<Vec<_>>()
            .join("; "),
        (Some(ErrorDetail::List(items)), _) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join("; "),
        (None, Some(error)) => error,
        (None, None) => fallback(),
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_plain_errors_string() {
        let body = r#"{"errors": "Blueprint is locked"}"#;
        assert_eq!(flatten_error_body(body), "Blueprint is locked");
    }

    #[test]
    fn test_flatten_field_errors() {
        let body = r#"{"errors": {"label": ["must be unique", "too long"], "vlan_id": ["out of range"]}}"#;
        assert_eq!(
            flatten_error_body(body),
            "label: must be unique, too long; vlan_id: out of range"
        );
    }

    #[test]
    fn test_flatten_single_error_key() {
        assert_eq!(flatten_error_body(r#"{"error": "bad token"}"#), "bad token");
    }

    #[test]
    fn test_flatten_non_json_body() {
        assert_eq!(flatten_error_body("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(ApstraError::from_response(401, ""), ApstraError::Authentication(_)));
        assert!(matches!(ApstraError::from_response(404, "{}"), ApstraError::NotFound(_)));
        assert!(matches!(
            ApstraError::from_response(409, r#"{"errors": "Tag with label 'x' already exists"}"#),
            ApstraError::Exists(_)
        ));
        assert!(matches!(
            ApstraError::from_response(409, r#"{"errors": "staging version mismatch"}"#),
            ApstraError::Conflict(_)
        ));
        assert!(matches!(
            ApstraError::from_response(500, "boom"),
            ApstraError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(ApstraError::Conflict(String::new()).is_retryable());
        assert!(ApstraError::TooManyRequests(String::new()).is_retryable());
        assert!(!ApstraError::Exists(String::new()).is_retryable());
        assert!(!ApstraError::NotFound(String::new()).is_retryable());
    }
}
