//! Request and response envelopes of the dispatch protocol.
//!
//! A request is `{"type": <action>, "payload": {..}, "filter"?: {..}}`. A
//! reply echoes `type` and carries either `result` (plus optional `meta`)
//! or `error`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RawError;

/// Body of an action request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    #[serde(rename = "type")]
    pub action: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
}

impl DispatchEnvelope {
    pub fn new(action: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            payload,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Map<String, Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Build an envelope from a loosely shaped payload.
    ///
    /// `null` means an empty payload. An object-valued `filter` key is copied
    /// to the envelope (it stays in the payload too), and an object-valued
    /// `payload` key replaces the payload, so both `{a: 1, filter: {..}}` and
    /// `{payload: {a: 1}, filter: {..}}` are accepted. Returns `None` for
    /// anything that is not an object.
    pub fn from_payload(action: &str, payload: Value) -> Option<Self> {
        let mut payload = match payload {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return None,
        };

        let filter = match payload.get("filter") {
            Some(Value::Object(filter)) => Some(filter.clone()),
            _ => None,
        };
        let nested = match payload.get("payload") {
            Some(Value::Object(inner)) => Some(inner.clone()),
            _ => None,
        };
        if let Some(inner) = nested {
            payload = inner;
        }

        Some(Self {
            action: action.to_string(),
            payload,
            filter,
        })
    }
}

/// Unwrap a reply body.
///
/// A truthy `error` field fails the reply. Otherwise the `type` echo is
/// dropped and the bare `result` is returned, unless a `meta` field is
/// present, in which case the whole remaining envelope is returned.
pub fn unwrap_reply(body: &str) -> Result<Value, RawError> {
    let reply: Value = serde_json::from_str(body).map_err(|e| RawError::Parse(e.to_string()))?;
    let mut fields = match reply {
        Value::Object(fields) => fields,
        Value::Null => return Err(RawError::Parse("reply body is null".into())),
        _ => return Ok(Value::Null),
    };

    if fields.get("error").is_some_and(is_truthy) {
        let error = fields.remove("error").unwrap_or(Value::Null);
        return Err(RawError::Payload(error));
    }

    fields.remove("type");
    if fields.contains_key("meta") {
        return Ok(Value::Object(fields));
    }
    Ok(fields.remove("result").unwrap_or(Value::Null))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
