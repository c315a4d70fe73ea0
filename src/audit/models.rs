use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::executor::Method;
use crate::headers::Headers;

/// One attempted outbound call. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub method: Method,
    pub endpoint: String,
    pub request_headers: Option<Headers>,
    pub request_body: Option<String>,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub duration_ms: u64,
    pub operation: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CallRecord {
    /// Headers as a JSON object, the shape persisted in `request_headers`.
    pub fn headers_json(&self) -> Option<serde_json::Value> {
        self.request_headers.as_ref().map(|headers| {
            headers
                .iter()
                .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
                .collect::<serde_json::Map<_, _>>()
                .into()
        })
    }

    /// A call either reached the server or faulted in transport, never both.
    pub fn is_consistent(&self) -> bool {
        self.response_status.is_some() != self.error_message.is_some()
    }
}

/// A row read back from a persistent store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCallRecord {
    pub id: i64,
    pub method: String,
    pub endpoint: String,
    pub request_headers: Option<serde_json::Value>,
    pub request_body: Option<String>,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub duration_ms: Option<u64>,
    pub operation: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
}
