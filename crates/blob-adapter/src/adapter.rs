//! The adapter factory and the per-collection handlers it generates.

use std::sync::Arc;

use async_trait::async_trait;
use http::request::Parts;
use tracing::{debug, info, warn};

use crate::address::PublicAddress;
use crate::build_hook::{BuildConfig, BuildHook};
use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::host::{
    Adapter, CollectionContext, DeleteArgs, FileRecord, GeneratedAdapter, PrefixResolver, UrlArgs,
};
use crate::http::StaticOutcome;
use crate::key::{effective_prefix, is_within, normalize_prefix, StorageKey};
use crate::store::{self, DynRemoteStore, PutOptions, StoreError};

/// Name reported to the host.
pub const ADAPTER_NAME: &str = "blob-storage";

/// Configuration shared, read-only, by every generated handler.
#[derive(Debug, Clone)]
struct Shared {
    prefix: String,
    address: PublicAddress,
    store: DynRemoteStore,
    allow_overwrite: bool,
    cache_control_max_age: Option<u64>,
    build_hook: BuildHook,
}

/// Adapter factory. Validates configuration up front; talks to the remote
/// store only when a handler runs.
///
/// # Example
///
/// ```rust,no_run
/// use blob_adapter::{AccessToken, Adapter, AdapterConfig, BlobStorageAdapter, CollectionContext};
/// use url::Url;
///
/// # fn example() -> Result<(), blob_adapter::AdapterError> {
/// let config = AdapterConfig::blob_api(
///     AccessToken::new("rw_token"),
///     Url::parse("https://store-id.public.blob.vercel-storage.com").unwrap(),
/// )
/// .with_prefix("media");
///
/// let adapter = BlobStorageAdapter::new(config)?;
/// let media = adapter.generate(&CollectionContext::new("media"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BlobStorageAdapter {
    shared: Arc<Shared>,
}

impl BlobStorageAdapter {
    /// Build the adapter and the backend selected by `config.backend`.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        config.validate()?;
        let address = PublicAddress::new(config.public_base_url.clone())?;
        let store = store::connect(&config, address.clone())?;
        Self::assemble(config, address, store)
    }

    /// Build the adapter over a caller-supplied store.
    pub fn with_store(config: AdapterConfig, store: DynRemoteStore) -> Result<Self> {
        config.validate()?;
        let address = PublicAddress::new(config.public_base_url.clone())?;
        Self::assemble(config, address, store)
    }

    fn assemble(config: AdapterConfig, address: PublicAddress, store: DynRemoteStore) -> Result<Self> {
        let prefix = normalize_prefix(&config.prefix)?;
        info!(
            prefix = %prefix,
            public_base_url = %address.base(),
            allow_overwrite = config.allow_overwrite,
            "blob storage adapter configured"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                prefix,
                address,
                store,
                allow_overwrite: config.allow_overwrite,
                cache_control_max_age: config.cache_control_max_age,
                build_hook: BuildHook::new(),
            }),
        })
    }

    /// Replace the bundler hook handed to generated adapters.
    pub fn with_build_hook(self, build_hook: BuildHook) -> Self {
        let shared = Arc::unwrap_or_clone(self.shared);
        Self {
            shared: Arc::new(Shared {
                build_hook,
                ..shared
            }),
        }
    }

    /// Probe the backend. Optional; handlers never call it.
    pub async fn check_ready(&self) -> Result<()> {
        self.shared
            .store
            .check_ready()
            .await
            .map_err(AdapterError::Unavailable)
    }
}

impl Adapter for BlobStorageAdapter {
    type Generated = CollectionAdapter;

    fn generate(&self, collection: &CollectionContext) -> CollectionAdapter {
        CollectionAdapter {
            shared: self.shared.clone(),
            collection: collection.clone(),
        }
    }
}

/// Handlers bound to one collection.
#[derive(Debug, Clone)]
pub struct CollectionAdapter {
    shared: Arc<Shared>,
    collection: CollectionContext,
}

impl CollectionAdapter {
    pub fn collection(&self) -> &CollectionContext {
        &self.collection
    }

    fn key(&self, call_prefix: Option<&str>, filename: &str) -> Result<StorageKey> {
        let prefix = effective_prefix(
            call_prefix,
            self.collection.prefix.as_deref(),
            &self.shared.prefix,
        );
        StorageKey::new(prefix, filename)
    }

    /// Key for a static request. The request may narrow the prefix but never
    /// leave the collection's own prefix.
    fn static_key(&self, requested: Option<&str>, filename: &str) -> Result<StorageKey> {
        let base = normalize_prefix(effective_prefix(
            None,
            self.collection.prefix.as_deref(),
            &self.shared.prefix,
        ))?;
        let prefix = match requested.map(normalize_prefix).transpose()? {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => base.clone(),
        };

        if !is_within(&prefix, &base) {
            warn!(
                collection = %self.collection.slug,
                prefix = %prefix,
                base = %base,
                "static request outside the collection prefix"
            );
            return Err(AdapterError::NotFound(format!("{}/{}", prefix, filename)));
        }
        StorageKey::new(&prefix, filename)
    }
}

#[async_trait]
impl GeneratedAdapter for CollectionAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn handle_upload(&self, file: &FileRecord) -> Result<FileRecord> {
        let key = self.key(file.prefix.as_deref(), &file.filename)?;
        let content_type = file.mime_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&file.filename)
                .first_or_octet_stream()
                .to_string()
        });
        let opts = PutOptions {
            content_type,
            cache_control_max_age: self.shared.cache_control_max_age,
            allow_overwrite: self.shared.allow_overwrite,
        };

        let receipt = self
            .shared
            .store
            .put_object(&key, file.buffer.clone(), &opts)
            .await
            .map_err(|e| {
                warn!(collection = %self.collection.slug, key = %key, error = %e, "upload failed");
                AdapterError::upload(key.as_str(), e)
            })?;

        let mut uploaded = file.clone();
        uploaded.url = Some(receipt.url.to_string());
        uploaded.size.get_or_insert(file.buffer.len() as u64);
        if uploaded.mime_type.is_none() {
            uploaded.mime_type = Some(receipt.content_type.unwrap_or(opts.content_type));
        }

        info!(
            collection = %self.collection.slug,
            key = %key,
            size = file.buffer.len(),
            "file uploaded"
        );
        Ok(uploaded)
    }

    async fn handle_delete(&self, args: &DeleteArgs) -> Result<()> {
        let key = self.key(args.prefix.as_deref(), &args.filename)?;
        match self.shared.store.delete_object(&key).await {
            Ok(()) => {
                info!(collection = %self.collection.slug, key = %key, "file deleted");
                Ok(())
            }
            // Missing objects are already in the desired state
            Err(StoreError::NotFound(_)) => {
                debug!(collection = %self.collection.slug, key = %key, "delete of missing object, nothing to do");
                Ok(())
            }
            Err(e) => {
                warn!(collection = %self.collection.slug, key = %key, error = %e, "delete failed");
                Err(AdapterError::delete(key.as_str(), e))
            }
        }
    }

    fn generate_url(&self, args: &UrlArgs) -> Result<String> {
        let key = self.key(args.prefix.as_deref(), &args.filename)?;
        Ok(self.shared.address.url_for(&key).to_string())
    }

    async fn static_handler(
        &self,
        request: &Parts,
        filename: &str,
        resolver: &dyn PrefixResolver,
    ) -> StaticOutcome {
        let prefix = resolver.resolve_prefix(request, &self.collection);
        let key = match self.static_key(prefix.as_deref(), filename) {
            Ok(key) => key,
            Err(e) => return StaticOutcome::from_error(e),
        };

        match self.shared.store.fetch_object_stream(&key).await {
            Ok(object) => {
                debug!(collection = %self.collection.slug, key = %key, size = ?object.size, "streaming file");
                StaticOutcome::stream(&key, object)
            }
            Err(e) => StaticOutcome::from_error(AdapterError::fetch(key.as_str(), e)),
        }
    }

    fn extend_build_config(&self, base: BuildConfig) -> BuildConfig {
        self.shared.build_hook.apply(base)
    }
}
