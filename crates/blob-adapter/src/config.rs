//! Adapter configuration.
//!
//! The host builds (or deserializes) an [`AdapterConfig`] once at startup and
//! hands it to [`crate::BlobStorageAdapter::new`], which validates it before
//! any handler exists.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

use crate::error::{AdapterError, Result};
use crate::key::normalize_prefix;

/// Default endpoint of the HTTP blob API.
pub const DEFAULT_BLOB_API_URL: &str = "https://blob.vercel-storage.com";

/// A secret credential. Never printed, never serialized back out.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw secret, for building request credentials only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Which remote store the adapter talks to.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage. The directory must already exist.
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// Custom endpoint (e.g., "http://localhost:9000" for MinIO)
        #[serde(default)]
        endpoint: Option<String>,
        access_key: AccessToken,
        secret_key: AccessToken,
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        #[serde(default)]
        region: Option<String>,
    },

    /// Bearer-token HTTP blob API
    BlobApi {
        token: AccessToken,
        #[serde(default = "default_api_url")]
        api_url: Url,
        /// Per-request timeout; reqwest defaults apply when unset
        #[serde(default)]
        request_timeout_secs: Option<u64>,
    },
}

fn default_api_url() -> Url {
    // constant is a valid absolute URL
    Url::parse(DEFAULT_BLOB_API_URL).expect("default blob API URL parses")
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Prefix prepended to every key unless a collection or call overrides it
    #[serde(default)]
    pub prefix: String,
    /// Base URL the bucket serves public objects from
    pub public_base_url: Url,
    /// Whether uploads may replace an existing object at the same key
    #[serde(default = "default_true")]
    pub allow_overwrite: bool,
    /// Cache lifetime in seconds requested for uploaded objects
    #[serde(default)]
    pub cache_control_max_age: Option<u64>,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl AdapterConfig {
    pub fn new(public_base_url: Url, backend: BackendConfig) -> Self {
        Self {
            prefix: String::new(),
            public_base_url,
            allow_overwrite: true,
            cache_control_max_age: None,
            backend,
        }
    }

    /// Config for the HTTP blob API at its default endpoint.
    pub fn blob_api(token: AccessToken, public_base_url: Url) -> Self {
        Self::new(
            public_base_url,
            BackendConfig::BlobApi {
                token,
                api_url: default_api_url(),
                request_timeout_secs: None,
            },
        )
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn with_cache_control_max_age(mut self, seconds: u64) -> Self {
        self.cache_control_max_age = Some(seconds);
        self
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<()> {
        normalize_prefix(&self.prefix)
            .map_err(|e| AdapterError::Configuration(format!("prefix: {}", e)))?;

        match &self.backend {
            BackendConfig::Memory | BackendConfig::Local { .. } => {}
            BackendConfig::S3 {
                access_key,
                secret_key,
                bucket,
                ..
            } => {
                if access_key.is_blank() || secret_key.is_blank() {
                    return Err(AdapterError::Configuration(
                        "S3 access key and secret key are required".into(),
                    ));
                }
                if bucket.trim().is_empty() {
                    return Err(AdapterError::Configuration(
                        "S3 bucket name is required".into(),
                    ));
                }
            }
            BackendConfig::BlobApi { token, api_url, .. } => {
                if token.is_blank() {
                    return Err(AdapterError::Configuration(
                        "blob API token is required".into(),
                    ));
                }
                if api_url.cannot_be_a_base() {
                    return Err(AdapterError::Configuration(format!(
                        "blob API URL '{}' cannot carry a path",
                        api_url
                    )));
                }
            }
        }

        Ok(())
    }
}
