//! Remote store capability and its backends.
//!
//! Handlers only ever see [`RemoteStore`]; which backend sits behind it is
//! decided once, from [`BackendConfig`], when the adapter is built.

mod blob_api;
mod object;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use url::Url;

use crate::address::PublicAddress;
use crate::config::{AdapterConfig, BackendConfig};
use crate::error::AdapterError;
use crate::key::StorageKey;

pub use blob_api::BlobApiStore;
pub use object::ObjectBackend;

/// Errors reported by a backend, before the adapter classifies them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("object storage error: {0}")]
    ObjectStore(object_store::Error),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StoreError::NotFound(path),
            object_store::Error::AlreadyExists { path, .. } => StoreError::AlreadyExists(path),
            object_store::Error::PermissionDenied { path, source }
            | object_store::Error::Unauthenticated { path, source } => {
                StoreError::Unauthorized(format!("{}: {}", path, source))
            }
            other => StoreError::ObjectStore(other),
        }
    }
}

/// Write parameters passed alongside the object bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control_max_age: Option<u64>,
    pub allow_overwrite: bool,
}

/// What the store reports after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    /// Canonical public URL of the written object
    pub url: Url,
    pub content_type: Option<String>,
}

pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// An object being read back, body not yet consumed.
pub struct ObjectStream {
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub body: ByteStream,
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// The minimal set of remote operations the adapter needs.
#[async_trait]
pub trait RemoteStore: fmt::Debug + Send + Sync {
    /// Write `body` at `key`, publicly readable.
    async fn put_object(
        &self,
        key: &StorageKey,
        body: Bytes,
        opts: &PutOptions,
    ) -> Result<PutReceipt, StoreError>;

    /// Remove the object at `key`. A missing object is reported as
    /// [`StoreError::NotFound`] when the backend can tell.
    async fn delete_object(&self, key: &StorageKey) -> Result<(), StoreError>;

    /// Open the object at `key` for streaming.
    async fn fetch_object_stream(&self, key: &StorageKey) -> Result<ObjectStream, StoreError>;

    /// Verify the backend is reachable and the credential accepted.
    async fn check_ready(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub type DynRemoteStore = Arc<dyn RemoteStore>;

/// Build the backend selected by `config`. Performs no network I/O.
pub(crate) fn connect(
    config: &AdapterConfig,
    address: PublicAddress,
) -> Result<DynRemoteStore, AdapterError> {
    let store: DynRemoteStore = match &config.backend {
        BackendConfig::BlobApi {
            token,
            api_url,
            request_timeout_secs,
        } => Arc::new(BlobApiStore::new(
            api_url.clone(),
            token.clone(),
            *request_timeout_secs,
            address,
        )?),
        backend => Arc::new(ObjectBackend::new(backend, address)?),
    };
    Ok(store)
}
