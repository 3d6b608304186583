//! Error types for the dispatch client.
//!
//! # Design
//! Every failure a round trip can end in (network error, unreadable body,
//! server-reported `error` payload, local validation) is funnelled through
//! [`normalize`] into one [`FetchError`] shape: a message, a machine-readable
//! `code`, an HTTP-like `status`, and whatever extra fields the server sent.
//! Callers and error listeners therefore only ever see one type.
//!
//! Usage errors (bad arguments to the public API) are kept apart in
//! [`UsageError`]; they never reach the network or the listeners.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Code attached to a normalized error when the source did not carry one.
pub const DEFAULT_CODE: &str = "SERVER_ERROR";

/// Status attached to a normalized error when no failure status is known.
pub const DEFAULT_STATUS: u16 = 500;

pub const UNAVAILABLE_MESSAGE: &str = "The requested resource is temporary unavailable";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";
pub const LOADING_MESSAGE: &str = "An error occurred while loading resources";

/// Extra field holding a server `status` that is not a usable HTTP status.
/// The `status` key itself always holds the normalized value.
pub const UNPARSED_STATUS_KEY: &str = "reported_status";

/// Normalized error surfaced by every failed dispatch or upload.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
    pub code: String,
    pub status: u16,
    /// Server-supplied fields other than `message`, `code` and `status`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FetchError {
    pub fn new(message: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            status,
            extra: Map::new(),
        }
    }

    /// Look up a server-supplied field that has no dedicated struct field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Error returned when `dispatch` is handed a payload that is not an object.
    pub(crate) fn invalid_payload() -> Self {
        Self::new("payload must be an object", "INVALID_PAYLOAD", 400)
    }
}

/// A failure as captured, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawError {
    /// The transport failed before a response body was read.
    Transport(String),
    /// The response body was not a JSON envelope.
    Parse(String),
    /// Any other failure that carries its own message (e.g. validation).
    Failure(String),
    /// The value of the server's `error` field.
    Payload(Value),
    /// Nothing usable was captured.
    Empty,
}

/// Turn a raw failure into a [`FetchError`].
///
/// `status` is the HTTP status of the response, when one arrived before the
/// failure. A failure status (4xx/5xx) always wins; otherwise the status
/// reported by the server payload is used, and finally [`DEFAULT_STATUS`].
pub fn normalize(raw: RawError, status: Option<u16>) -> FetchError {
    let http_failure = status.filter(|s| *s >= 400);

    match raw {
        RawError::Transport(detail) | RawError::Parse(detail) => {
            debug!(%detail, ?status, "normalizing transport failure");
            FetchError::new(
                transport_message(status),
                DEFAULT_CODE,
                http_failure.unwrap_or(DEFAULT_STATUS),
            )
        }
        RawError::Failure(message) => FetchError::new(
            message,
            DEFAULT_CODE,
            http_failure.unwrap_or(DEFAULT_STATUS),
        ),
        RawError::Payload(Value::Object(mut fields)) => {
            let message = fields
                .remove("message")
                .and_then(|v| scalar_text(&v))
                .unwrap_or_else(|| LOADING_MESSAGE.to_string());
            let code = fields
                .remove("code")
                .and_then(|v| scalar_text(&v))
                .unwrap_or_else(|| DEFAULT_CODE.to_string());
            let reported = match fields.remove("status") {
                Some(value) => {
                    let parsed = reported_status(&value);
                    if parsed.is_none() {
                        fields.insert(UNPARSED_STATUS_KEY.to_string(), value);
                    }
                    parsed
                }
                None => None,
            };
            FetchError {
                message,
                code,
                status: http_failure.or(reported).unwrap_or(DEFAULT_STATUS),
                extra: fields,
            }
        }
        RawError::Payload(_) | RawError::Empty => FetchError::new(
            LOADING_MESSAGE,
            DEFAULT_CODE,
            http_failure.unwrap_or(DEFAULT_STATUS),
        ),
    }
}

/// A payload `status` as a non-zero HTTP status; numeric strings count.
fn reported_status(value: &Value) -> Option<u16> {
    let status = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    status
        .and_then(|s| u16::try_from(s).ok())
        .filter(|s| *s != 0)
}

fn transport_message(status: Option<u16>) -> &'static str {
    match status {
        Some(502 | 503) => UNAVAILABLE_MESSAGE,
        Some(500..=599) => UNEXPECTED_MESSAGE,
        _ => LOADING_MESSAGE,
    }
}

/// Text form of a truthy scalar; `None` for empty, zero, false, null and
/// structured values.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Errors produced by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but its body could not be read.
    #[error("failed to read response body (status {status}): {message}")]
    Body { status: u16, message: String },
}

impl TransportError {
    /// HTTP status obtained before the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Network(_) => None,
            TransportError::Body { status, .. } => Some(*status),
        }
    }
}

/// Errors raised while building or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid url {0:?}: expected scheme://host")]
    InvalidUrl(String),

    #[error("no default endpoint origin available: {0}")]
    MissingOrigin(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Bad arguments handed to the public API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("event should be either error or success, got {0:?}")]
    UnknownEvent(String),

    #[error("usage: set_config(key, value); rejected value for key {0:?}")]
    RejectedConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_payload_keeps_message_and_defaults() {
        let err = normalize(RawError::Payload(json!({"message": "bad"})), Some(200));
        assert_eq!(err.message, "bad");
        assert_eq!(err.code, "SERVER_ERROR");
        assert_eq!(err.status, 500);
        assert!(err.extra.is_empty());
    }

    #[test]
    fn server_payload_fields_survive() {
        let err = normalize(
            RawError::Payload(json!({
                "message": "Invalid email",
                "code": "AUTH.INVALID_EMAIL",
                "status": 400,
                "fields": {"email": "required"}
            })),
            Some(200),
        );
        assert_eq!(err.code, "AUTH.INVALID_EMAIL");
        assert_eq!(err.status, 400);
        assert_eq!(err.get("fields"), Some(&json!({"email": "required"})));
    }

    #[test]
    fn http_failure_status_overrides_payload_status() {
        let err = normalize(RawError::Payload(json!({"status": 418})), Some(404));
        assert_eq!(err.status, 404);
        assert_eq!(err.message, LOADING_MESSAGE);
    }

    #[test]
    fn falsy_code_falls_back_to_default() {
        let err = normalize(RawError::Payload(json!({"code": "", "message": 7})), None);
        assert_eq!(err.code, "SERVER_ERROR");
        assert_eq!(err.message, "7");
    }

    #[test]
    fn non_object_payload_is_generic() {
        let err = normalize(RawError::Payload(json!("boom")), None);
        assert_eq!(err.message, LOADING_MESSAGE);
        assert_eq!(err.status, 500);
    }

    #[test]
    fn transport_failure_messages_follow_status() {
        assert_eq!(
            normalize(RawError::Parse("eof".into()), Some(503)).message,
            UNAVAILABLE_MESSAGE
        );
        assert_eq!(
            normalize(RawError::Parse("eof".into()), Some(502)).message,
            UNAVAILABLE_MESSAGE
        );
        assert_eq!(
            normalize(RawError::Parse("eof".into()), Some(500)).message,
            UNEXPECTED_MESSAGE
        );
        assert_eq!(
            normalize(RawError::Transport("refused".into()), None).message,
            LOADING_MESSAGE
        );
        assert_eq!(
            normalize(RawError::Parse("eof".into()), Some(404)).message,
            LOADING_MESSAGE
        );
    }

    #[test]
    fn transport_failure_keeps_http_status() {
        let err = normalize(RawError::Parse("eof".into()), Some(503));
        assert_eq!(err.status, 503);
        assert_eq!(err.code, "SERVER_ERROR");
    }

    #[test]
    fn failure_passes_message_through() {
        let err = normalize(
            RawError::Failure("Please select a file to upload.".into()),
            None,
        );
        assert_eq!(err.message, "Please select a file to upload.");
        assert_eq!(err.code, "SERVER_ERROR");
        assert_eq!(err.status, 500);
    }

    #[test]
    fn numeric_string_status_is_used() {
        let err = normalize(
            RawError::Payload(json!({"message": "gone", "status": "404"})),
            Some(200),
        );
        assert_eq!(err.status, 404);
        assert!(err.extra.is_empty());
    }

    #[test]
    fn unusable_status_is_kept_as_extra() {
        let err = normalize(
            RawError::Payload(json!({"message": "odd", "status": "teapot"})),
            Some(200),
        );
        assert_eq!(err.status, 500);
        assert_eq!(err.get(UNPARSED_STATUS_KEY), Some(&json!("teapot")));

        let wire = serde_json::to_value(&err).unwrap();
        assert_eq!(wire["status"], json!(500));
        assert_eq!(wire["reported_status"], json!("teapot"));
    }

    #[test]
    fn display_is_the_message() {
        let err = FetchError::new("nope", "X", 400);
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn serializes_flat() {
        let mut err = FetchError::new("nope", "X", 400);
        err.extra.insert("field".into(), json!("email"));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({"message": "nope", "code": "X", "status": 400, "field": "email"})
        );
    }
}
