//! The host's plugin contract.
//!
//! The host builds an [`Adapter`] once, asks it for one [`GeneratedAdapter`]
//! per collection, and then calls the generated handlers per request.

use async_trait::async_trait;
use bytes::Bytes;
use http::request::Parts;

use crate::build_hook::BuildConfig;
use crate::error::Result;
use crate::http::StaticOutcome;

/// A file handed to the adapter for upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileRecord {
    pub filename: String,
    pub buffer: Bytes,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    /// Per-document prefix; overrides the collection prefix when non-empty
    pub prefix: Option<String>,
    /// Public URL, set by a successful upload
    pub url: Option<String>,
}

impl FileRecord {
    pub fn new(filename: impl Into<String>, buffer: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            buffer: buffer.into(),
            ..Default::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteArgs {
    pub filename: String,
    pub prefix: Option<String>,
}

impl DeleteArgs {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlArgs {
    pub filename: String,
    pub prefix: Option<String>,
}

impl UrlArgs {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// The collection an adapter instance is generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionContext {
    pub slug: String,
    /// Collection-level prefix; falls back to the adapter prefix when unset
    pub prefix: Option<String>,
}

impl CollectionContext {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Storage operations the host calls for one collection.
#[async_trait]
pub trait GeneratedAdapter: Send + Sync {
    /// Adapter name reported to the host.
    fn name(&self) -> &str;

    /// Store `file` and return a copy with its public `url` set.
    async fn handle_upload(&self, file: &FileRecord) -> Result<FileRecord>;

    /// Remove a stored file.
    async fn handle_delete(&self, args: &DeleteArgs) -> Result<()>;

    /// Public URL of a file, computed locally.
    fn generate_url(&self, args: &UrlArgs) -> Result<String>;

    /// Serve the bytes of `filename` for an inbound request.
    async fn static_handler(
        &self,
        request: &Parts,
        filename: &str,
        resolver: &dyn PrefixResolver,
    ) -> StaticOutcome;

    /// Patch the host's bundler configuration. Identity unless overridden.
    fn extend_build_config(&self, base: BuildConfig) -> BuildConfig {
        base
    }
}

/// Factory producing per-collection handlers.
pub trait Adapter {
    type Generated: GeneratedAdapter;

    fn generate(&self, collection: &CollectionContext) -> Self::Generated;
}

/// Derives the storage prefix for a static request.
///
/// A resolved prefix only narrows the lookup: it must be the collection's
/// prefix or nested below it, otherwise the request is answered as not found.
pub trait PrefixResolver: Send + Sync {
    fn resolve_prefix(&self, request: &Parts, collection: &CollectionContext) -> Option<String>;
}

impl<F> PrefixResolver for F
where
    F: Fn(&Parts, &CollectionContext) -> Option<String> + Send + Sync,
{
    fn resolve_prefix(&self, request: &Parts, collection: &CollectionContext) -> Option<String> {
        self(request, collection)
    }
}

/// Reads the prefix from the `prefix` query parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPrefixResolver;

impl PrefixResolver for QueryPrefixResolver {
    fn resolve_prefix(&self, request: &Parts, _collection: &CollectionContext) -> Option<String> {
        let query = request.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "prefix")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}
