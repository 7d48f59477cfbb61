//! Public addressing of stored objects.

use url::Url;

use crate::error::{AdapterError, Result};
use crate::key::StorageKey;

/// Maps storage keys to the URLs the bucket serves them from.
///
/// Both the URL generator and the backends' write receipts go through this
/// type, so the address handed out after an upload is the one generated later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicAddress {
    base: Url,
}

impl PublicAddress {
    pub fn new(base: Url) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(AdapterError::Configuration(format!(
                "public base URL '{}' cannot carry a path",
                base
            )));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(AdapterError::Configuration(format!(
                "public base URL '{}' must not have a query or fragment",
                base
            )));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL of `key`, with every segment percent-encoded.
    pub fn url_for(&self, key: &StorageKey) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(key.segments());
        }
        url
    }
}
