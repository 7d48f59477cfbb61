//! Blob Storage Adapter
//!
//! This crate lets a content-management host hand file storage to a blob
//! store. The host builds a [`BlobStorageAdapter`] once, generates a
//! [`CollectionAdapter`] per collection, and calls its handlers per request:
//!
//! - upload a file and get back its public URL
//! - delete a file (deleting a missing file is a no-op)
//! - generate a file's public URL without any I/O
//! - stream a file back over HTTP
//! - patch the host's bundler configuration
//!
//! # Backends
//!
//! - Bearer-token HTTP blob API (`reqwest`)
//! - S3-compatible buckets, local filesystem, in-memory (`object_store`)
//!
//! Upload URLs come from the same [`PublicAddress`] as generated URLs, so the
//! two never diverge.
//!
//! # Example
//!
//! ```rust,no_run
//! use blob_adapter::{
//!     AccessToken, Adapter, AdapterConfig, BlobStorageAdapter, CollectionContext, FileRecord,
//!     GeneratedAdapter, UrlArgs,
//! };
//! use url::Url;
//!
//! # async fn example() -> Result<(), blob_adapter::AdapterError> {
//! let config = AdapterConfig::blob_api(
//!     AccessToken::new("rw_token"),
//!     Url::parse("https://store-id.public.blob.vercel-storage.com").unwrap(),
//! )
//! .with_prefix("media");
//! let media = BlobStorageAdapter::new(config)?.generate(&CollectionContext::new("media"));
//!
//! let uploaded = media.handle_upload(&FileRecord::new("a.png", vec![0u8; 16])).await?;
//! assert_eq!(uploaded.url, Some(media.generate_url(&UrlArgs::new("a.png"))?));
//! # Ok(())
//! # }
//! ```

mod adapter;
mod address;
mod build_hook;
mod config;
mod error;
mod host;
mod key;

pub mod http;
pub mod store;

pub use adapter::{BlobStorageAdapter, CollectionAdapter, ADAPTER_NAME};
pub use address::PublicAddress;
pub use build_hook::{BuildConfig, BuildHook};
pub use config::{AccessToken, AdapterConfig, BackendConfig, DEFAULT_BLOB_API_URL};
pub use error::{AdapterError, Result};
pub use host::{
    Adapter, CollectionContext, DeleteArgs, FileRecord, GeneratedAdapter, PrefixResolver,
    QueryPrefixResolver, UrlArgs,
};
pub use key::StorageKey;
