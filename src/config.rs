use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};
use url::form_urlencoded;

use crate::headers::{self, Headers};

pub const CONFIG_FILE: &str = "desk365.json";
pub const DEFAULT_BASE_URL: &str = "https://api.desk365.com";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_version() -> String {
    "v3".to_string()
}

fn default_path_prefix() -> String {
    "apis".to_string()
}

/// Reads a `{"Name": "value"}` object into header pairs, keeping document order.
fn header_map<'de, D>(deserializer: D) -> std::result::Result<Option<Headers>, D::Error>
where
    D: Deserializer<'de>,
{
    struct HeaderMapVisitor;

    impl<'de> Visitor<'de> for HeaderMapVisitor {
        type Value = Option<Headers>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of header names to values")
        }

        fn visit_none<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(
            self,
            deserializer: D,
        ) -> std::result::Result<Self::Value, D::Error> {
            deserializer.deserialize_map(self)
        }

        fn visit_map<A: MapAccess<'de>>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut headers = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, value)) = map.next_entry::<String, String>()? {
                headers.push((name, value));
            }
            Ok(Some(headers))
        }
    }

    deserializer.deserialize_option(HeaderMapVisitor)
}

/// Connection and credential settings. Immutable once built.
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Reserved: no retry loop reads this.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    #[serde(default, deserialize_with = "header_map")]
    pub headers: Option<Headers>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: None,
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            version: default_version(),
            path_prefix: default_path_prefix(),
            headers: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    /// Reads `DESK365_*` variables, loading a `.env` file first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("DESK365_API_KEY")
            .filter(|key| !key.is_empty())
            .context("DESK365_API_KEY is not set")?;

        let mut config = Self::new(
            lookup("DESK365_BASE_URL").unwrap_or_else(default_base_url),
            api_key,
        );
        config.api_secret = lookup("DESK365_API_SECRET").filter(|s| !s.is_empty());
        if let Some(timeout) = lookup("DESK365_TIMEOUT") {
            config.timeout = timeout
                .parse()
                .with_context(|| format!("parsing DESK365_TIMEOUT={timeout}"))?;
            if config.timeout == 0 {
                bail!("DESK365_TIMEOUT must be greater than zero");
            }
        }
        if let Some(retries) = lookup("DESK365_RETRY_ATTEMPTS") {
            config.retry_attempts = retries
                .parse()
                .with_context(|| format!("parsing DESK365_RETRY_ATTEMPTS={retries}"))?;
        }
        if let Some(version) = lookup("DESK365_API_VERSION") {
            config.version = version;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Extra headers with `Authorization` and, when a secret is set,
    /// `X-API-Secret` layered on top.
    pub fn auth_headers(&self) -> Headers {
        let mut auth = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )];
        if let Some(secret) = &self.api_secret {
            auth.push(("X-API-Secret".to_string(), secret.clone()));
        }
        headers::layer(self.headers.as_deref().unwrap_or_default(), auth)
    }

    /// `{base_url}/{path_prefix}/{version}/{path}[?query]`
    pub fn endpoint(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut endpoint = format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path_prefix,
            self.version,
            path.trim_start_matches('/')
        );
        if !params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            endpoint.push('?');
            endpoint.push_str(&query);
        }
        endpoint
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &headers::REDACTED)
            .field("api_secret", &self.api_secret.as_ref().map(|_| headers::REDACTED))
            .field("timeout", &self.timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("version", &self.version)
            .field("path_prefix", &self.path_prefix)
            .field("headers", &self.headers.as_ref().map(|h| headers::sanitize(h)))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ApiConfig,
    pub path: PathBuf,
}

/// Loads `target` (a JSON file, or a directory holding `desk365.json`).
/// A missing file is not an error.
pub fn load_config(target: &Path) -> Result<Option<LoadedConfig>> {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()?.join(target)
    };

    let file_path = if resolved.is_dir() {
        resolved.join(CONFIG_FILE)
    } else {
        resolved
    };

    if !file_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file_path)
        .with_context(|| format!("reading config {}", file_path.display()))?;

    let config: ApiConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", file_path.display()))?;

    if config.api_key.is_empty() {
        bail!("api_key is empty in {}", file_path.display());
    }
    if config.timeout == 0 {
        bail!("timeout must be greater than zero in {}", file_path.display());
    }

    Ok(Some(LoadedConfig {
        config,
        path: file_path,
    }))
}
