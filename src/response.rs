//! Uniform outcome for every API call.
//!
//! Upstream responses are inconsistent across endpoints and API versions: the
//! human-readable error may live under `message`, `error` or `description`,
//! and bodies are sometimes bare arrays or strings. [`normalize`] folds all of
//! them into an [`Outcome`].

use serde_json::{Map, Value};

pub const GENERIC_FAILURE: &str = "API request failed";

const MESSAGE_FIELDS: [&str; 3] = ["message", "error", "description"];

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        data: Value,
        message: Option<String>,
        status_code: u16,
        meta: Option<Value>,
    },
    Failure {
        message: String,
        errors: Option<Value>,
        status_code: Option<u16>,
        meta: Option<Value>,
    },
}

impl Outcome {
    /// A failure that never reached the server.
    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure {
            message: message.into(),
            errors: None,
            status_code: None,
            meta: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Outcome::Success { status_code, .. } => Some(*status_code),
            Outcome::Failure { status_code, .. } => *status_code,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Success { message, .. } => message.as_deref(),
            Outcome::Failure { message, .. } => Some(message),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Outcome::Success { data, .. } => Some(data),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn errors(&self) -> Option<&Value> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { errors, .. } => errors.as_ref(),
        }
    }

    pub fn meta(&self) -> Option<&Value> {
        match self {
            Outcome::Success { meta, .. } | Outcome::Failure { meta, .. } => meta.as_ref(),
        }
    }

    /// Flat JSON view with absent fields omitted.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("success".into(), Value::Bool(self.is_success()));
        match self {
            Outcome::Success { data, .. } if !data.is_null() => {
                map.insert("data".into(), data.clone());
            }
            _ => {}
        }
        if let Some(message) = self.message() {
            map.insert("message".into(), Value::String(message.to_string()));
        }
        if let Some(errors) = self.errors() {
            map.insert("errors".into(), errors.clone());
        }
        if let Some(status) = self.status_code() {
            map.insert("status_code".into(), Value::from(status));
        }
        if let Some(meta) = self.meta() {
            map.insert("meta".into(), meta.clone());
        }
        Value::Object(map)
    }
}

pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

pub fn normalize(status: u16, body: &[u8]) -> Outcome {
    let decoded: Option<Value> = serde_json::from_slice(body).ok();

    if is_success_status(status) {
        let decoded = decoded.unwrap_or(Value::Null);
        let data = field(&decoded, "data")
            .cloned()
            .unwrap_or_else(|| decoded.clone());
        return Outcome::Success {
            data,
            message: field(&decoded, "message")
                .and_then(Value::as_str)
                .map(str::to_string),
            status_code: status,
            meta: field(&decoded, "meta").cloned(),
        };
    }

    Outcome::Failure {
        message: error_message(decoded.as_ref()),
        errors: decoded.as_ref().and_then(|v| field(v, "errors")).cloned(),
        status_code: Some(status),
        meta: decoded.as_ref().and_then(|v| field(v, "meta")).cloned(),
    }
}

fn error_message(decoded: Option<&Value>) -> String {
    let Some(body) = decoded else {
        return GENERIC_FAILURE.to_string();
    };

    for name in MESSAGE_FIELDS {
        if let Some(text) = field(body, name).and_then(Value::as_str) {
            return text.to_string();
        }
    }

    match body {
        Value::String(text) => text.clone(),
        Value::Object(_) | Value::Array(_) => body.to_string(),
        _ => GENERIC_FAILURE.to_string(),
    }
}

/// Non-null member of a JSON object.
fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    value.as_object()?.get(name).filter(|v| !v.is_null())
}
