//! Correlation keys and the events flowing to evaluators and downstream.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::error::{Result, ThrottleError};
use crate::protocol::request::ThrottleRequest;

/// In-flight identity of one decision: the caller's key namespaced by a
/// process-unique sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    request_key: Arc<str>,
    seq: u64,
}

impl CorrelationKey {
    pub fn new(request_key: impl Into<Arc<str>>, seq: u64) -> Self {
        Self {
            request_key: request_key.into(),
            seq,
        }
    }

    pub fn request_key(&self) -> &str {
        &self.request_key
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.request_key, self.seq)
    }
}

/// What an evaluator receives: one request plus the key its verdict must carry.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub key: CorrelationKey,
    pub request: Arc<ThrottleRequest>,
}

/// An allowed request on its way to the second tier.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamEvent {
    pub stream_id: String,
    pub timestamp_ms: u64,
    /// Legacy tuple; index 6 holds the properties as a JSON string (or null),
    /// trailing fields follow unchanged.
    pub fields: Vec<Value>,
}

impl DownstreamEvent {
    pub fn from_request(stream_id: &str, request: &ThrottleRequest) -> Self {
        let mut fields = request.to_fields();
        if let Some(slot) = fields.get_mut(6) {
            *slot = match request.properties_string() {
                Some(s) => Value::String(s),
                None => Value::Null,
            };
        }
        Self {
            stream_id: stream_id.to_string(),
            timestamp_ms: now_millis(),
            fields,
        }
    }

    /// Unique key of the forwarded request, if present.
    pub fn unique_key(&self) -> Option<&str> {
        self.fields.first().and_then(Value::as_str)
    }
}

/// Build a `name:version` stream id.
pub fn stream_id(name: &str, version: &str) -> String {
    format!("{name}:{version}")
}

/// Split and validate a `name:version` stream id.
pub fn parse_stream_id(raw: &str) -> Result<(&str, &str)> {
    let (name, version) = raw.split_once(':').ok_or_else(|| {
        ThrottleError::BadRequest(format!("invalid stream id: {raw} (expected name:version)"))
    })?;
    if name.is_empty() || version.is_empty() || version.contains(':') {
        return Err(ThrottleError::BadRequest(format!(
            "invalid stream id: {raw} (expected name:version)"
        )));
    }
    Ok((name, version))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
