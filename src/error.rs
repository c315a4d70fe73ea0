use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::executor::Method;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Faults raised below the response normalizer.
///
/// Upstream error statuses are not represented here; they come back as an
/// [`Outcome::Failure`](crate::response::Outcome::Failure).
#[derive(Debug, Error)]
pub enum Error {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Http(reqwest::Error),

    #[error("invalid endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported HTTP method for file upload: {0}")]
    UnsupportedUploadMethod(Method),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("reading attachment {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading attachment stream {name}: {source}")]
    StreamRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid content type {content_type:?} for attachment {name}")]
    InvalidContentType { name: String, content_type: String },
}

impl Error {
    /// True when no HTTP response was obtained because the network layer failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Connection(_) | Error::Http(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Error::Timeout(timeout)
        } else if err.is_connect() {
            Error::Connection(err.to_string())
        } else {
            Error::Http(err)
        }
    }
}

/// Failures inside an [`AuditStore`](crate::audit::AuditStore).
///
/// These never leave [`AuditLogger`](crate::audit::AuditLogger).
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("serializing audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit store lock poisoned")]
    Poisoned,

    #[error("{0}")]
    Other(String),
}
