//! Journal configuration.
//!
//! ```toml
//! endpoint = "http://127.0.0.1:8101"
//! buffer_size = 64
//! max_frame_bytes = 4194304
//! request_timeout_ms = 10000
//! connect_timeout_secs = 30
//!
//! [keep_alive]
//! interval_secs = 10
//! timeout_secs = 20
//!
//! [headers]
//! authorization = "Bearer ..."
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Overrides `endpoint` after a config file is loaded.
pub const ENDPOINT_ENV_VAR: &str = "SLICEFEED_ENDPOINT";

const DEFAULT_BUFFER_SIZE: usize = 64;
const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_KEEP_ALIVE_INTERVAL_SECS: u64 = 10;
const DEFAULT_KEEP_ALIVE_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },
}

const fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

const fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

const fn default_keep_alive_interval_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_INTERVAL_SECS
}

const fn default_keep_alive_timeout_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_TIMEOUT_SECS
}

/// Transport keep-alive, applied to TCP and HTTP/2 pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KeepAliveConfig {
    #[serde(default = "default_keep_alive_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_keep_alive_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_KEEP_ALIVE_INTERVAL_SECS,
            timeout_secs: DEFAULT_KEEP_ALIVE_TIMEOUT_SECS,
        }
    }
}

impl KeepAliveConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    pub endpoint: String,
    /// Envelopes buffered per session before the reader waits on the consumer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Point queries only; streams have no overall timeout.
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
    /// Extra request metadata sent with every call.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl JournalConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            request_timeout_ms: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            keep_alive: KeepAliveConfig::default(),
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sub-millisecond timeouts round up to one millisecond; zero disables it.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        let mut millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 && !timeout.is_zero() {
            millis = 1;
        }
        self.request_timeout_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Parse from TOML. `path` is only used in error messages.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from a TOML file, then apply `SLICEFEED_ENDPOINT` if set.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw, path)?;

        if let Ok(endpoint) = env::var(ENDPOINT_ENV_VAR)
            && !endpoint.trim().is_empty()
        {
            tracing::debug!(%endpoint, "Endpoint overridden from environment");
            config.endpoint = endpoint;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        self.header_map()?;
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let url = Url::parse(self.endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }
        Ok(url)
    }

    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let invalid = || ConfigError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
