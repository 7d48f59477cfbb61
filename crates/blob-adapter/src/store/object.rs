//! Object storage backend (S3/MinIO/local filesystem/memory).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutMode, PutOptions as StorePutOptions};
use tracing::debug;

use super::{ObjectStream, PutOptions, PutReceipt, RemoteStore, StoreError};
use crate::address::PublicAddress;
use crate::config::BackendConfig;
use crate::error::AdapterError;
use crate::key::StorageKey;

/// Wrapper around the `object_store` backends.
///
/// These stores have no notion of a public URL, so receipts are addressed
/// through the configured [`PublicAddress`].
#[derive(Debug, Clone)]
pub struct ObjectBackend {
    inner: Arc<dyn ObjectStore>,
    address: PublicAddress,
    /// Local filesystem rejects object attributes
    attributes: bool,
    bucket: Option<String>,
}

impl ObjectBackend {
    /// Create a backend from configuration. The blob API variant is not an
    /// object store and is rejected.
    pub fn new(config: &BackendConfig, address: PublicAddress) -> Result<Self, AdapterError> {
        match config {
            BackendConfig::Memory => Ok(Self::memory(address)),

            BackendConfig::Local { path } => {
                if !path.is_dir() {
                    return Err(AdapterError::Configuration(format!(
                        "local storage directory '{}' does not exist",
                        path.display()
                    )));
                }
                let store = LocalFileSystem::new_with_prefix(path)
                    .map_err(|e| AdapterError::Configuration(e.to_string()))?;
                Ok(Self {
                    inner: Arc::new(store),
                    address,
                    attributes: false,
                    bucket: None,
                })
            }

            BackendConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let mut builder = AmazonS3Builder::new()
                    .with_access_key_id(access_key.expose())
                    .with_secret_access_key(secret_key.expose())
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"));
                if let Some(endpoint) = endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }

                let store = builder
                    .build()
                    .map_err(|e| AdapterError::Configuration(e.to_string()))?;
                Ok(Self {
                    inner: Arc::new(store),
                    address,
                    attributes: true,
                    bucket: Some(bucket.clone()),
                })
            }

            BackendConfig::BlobApi { .. } => Err(AdapterError::Configuration(
                "blob API backend is not an object store".into(),
            )),
        }
    }

    /// An in-memory backend.
    pub fn memory(address: PublicAddress) -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            address,
            attributes: true,
            bucket: None,
        }
    }

    fn object_path(key: &StorageKey) -> ObjectPath {
        ObjectPath::from(key.as_str())
    }

    fn put_options(&self, opts: &PutOptions) -> StorePutOptions {
        let mut attributes = Attributes::new();
        if self.attributes {
            attributes.insert(Attribute::ContentType, opts.content_type.clone().into());
            if let Some(max_age) = opts.cache_control_max_age {
                attributes.insert(
                    Attribute::CacheControl,
                    format!("public, max-age={}", max_age).into(),
                );
            }
        }

        let mode = if opts.allow_overwrite {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };

        StorePutOptions {
            mode,
            attributes,
            ..Default::default()
        }
    }
}

#[async_trait]
impl RemoteStore for ObjectBackend {
    async fn put_object(
        &self,
        key: &StorageKey,
        body: Bytes,
        opts: &PutOptions,
    ) -> Result<PutReceipt, StoreError> {
        let path = Self::object_path(key);
        let size = body.len();
        self.inner
            .put_opts(&path, body.into(), self.put_options(opts))
            .await?;
        debug!(key = %key, size = size, "object written");

        Ok(PutReceipt {
            url: self.address.url_for(key),
            content_type: Some(opts.content_type.clone()),
        })
    }

    async fn delete_object(&self, key: &StorageKey) -> Result<(), StoreError> {
        let path = Self::object_path(key);
        // Memory and S3 accept deletes of missing objects; only the local
        // filesystem reports them.
        self.inner.delete(&path).await?;
        Ok(())
    }

    async fn fetch_object_stream(&self, key: &StorageKey) -> Result<ObjectStream, StoreError> {
        let path = Self::object_path(key);
        let result = self.inner.get(&path).await?;

        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| {
                let value: &str = value.as_ref();
                value.to_string()
            })
            .or_else(|| {
                mime_guess::from_path(key.as_str())
                    .first()
                    .map(|mime| mime.to_string())
            });
        let size = Some(result.meta.size as u64);
        let body = result.into_stream().map_err(StoreError::from).boxed();

        Ok(ObjectStream {
            content_type,
            size,
            body,
        })
    }

    async fn check_ready(&self) -> Result<(), StoreError> {
        // Listing the root fails fast if the bucket doesn't exist
        let mut stream = self.inner.list(None);
        match stream.try_next().await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::NotFound(
                self.bucket.clone().unwrap_or_default(),
            )),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("NoSuchBucket") {
                    return Err(StoreError::NotFound(self.bucket.clone().unwrap_or_default()));
                }
                Err(e.into())
            }
        }
    }
}
