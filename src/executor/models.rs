use std::{fmt, str::FromStr, time::Duration};

use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::error::Error;
use crate::files::NormalizedFile;
use crate::headers::Headers;
use crate::response::{self, Outcome};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Flat key/value parameters, as the resource layer serializes them.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Methods that may carry a multipart body.
    pub fn accepts_upload(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One logical API call, before it is turned into a wire request.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub endpoint: String,
    pub headers: Headers,
    pub fields: Fields,
    pub timeout: Duration,
    pub operation: Option<String>,
}

impl Call {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: Vec::new(),
            fields: Map::new(),
            timeout: DEFAULT_TIMEOUT,
            operation: None,
        }
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// URL the request goes to: for GET the fields are merged into the query
    /// string after any existing parameters.
    pub fn url(&self) -> Result<String, Error> {
        if self.method != Method::Get || self.fields.is_empty() {
            return Ok(self.endpoint.clone());
        }
        let mut url = Url::parse(&self.endpoint).map_err(|source| Error::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        url.query_pairs_mut()
            .extend_pairs(self.fields.iter().map(|(name, value)| (name, field_text(value))));
        Ok(url.to_string())
    }

    /// Serialized fields as recorded in the audit trail.
    pub fn body_text(&self) -> Option<String> {
        if self.fields.is_empty() {
            None
        } else {
            Some(Value::Object(self.fields.clone()).to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: &'static str,
    pub file: NormalizedFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

/// Fully resolved request handed to a [`Transport`](super::Transport).
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: RequestBody,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn is_success(&self) -> bool {
        response::is_success_status(self.status)
    }

    pub fn outcome(&self) -> Outcome {
        response::normalize(self.status, &self.body)
    }
}

/// Text form of a field value for query strings and multipart text parts.
pub(crate) fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
