//! Storage keys: `{prefix}/{filename}` with traversal-safe segments.

use std::fmt;

use crate::error::{AdapterError, Result};

/// A validated object key inside the bucket.
///
/// Keys are `/`-joined segments. No segment may be empty, `.`, `..`, contain a
/// backslash or a control character, so a key can never escape its prefix.
/// Characters object stores rewrite on write ([`RESERVED`]) are refused too,
/// so the stored name is always the key itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Build the key for `filename` under `prefix`.
    ///
    /// The prefix may itself be nested (`media/images`); leading and trailing
    /// slashes are ignored. An empty prefix stores the file at the bucket root.
    pub fn new(prefix: &str, filename: &str) -> Result<Self> {
        let prefix = normalize_prefix(prefix)?;
        let filename = filename.trim_start_matches('/');
        if filename.is_empty() {
            return Err(AdapterError::InvalidKey("filename is empty".into()));
        }
        for segment in filename.split('/') {
            validate_segment(segment)?;
        }

        if prefix.is_empty() {
            Ok(Self(filename.to_string()))
        } else {
            Ok(Self(format!("{}/{}", prefix, filename)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate the `/`-separated segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip surrounding slashes and validate every segment of a prefix.
pub(crate) fn normalize_prefix(prefix: &str) -> Result<String> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for segment in trimmed.split('/') {
        validate_segment(segment)?;
    }
    Ok(trimmed.to_string())
}

/// Pick the prefix that applies to one call.
///
/// A non-empty per-call prefix wins, then the collection prefix, then the
/// adapter-wide one.
pub(crate) fn effective_prefix<'a>(
    call: Option<&'a str>,
    collection: Option<&'a str>,
    adapter: &'a str,
) -> &'a str {
    call.filter(|p| !p.trim_matches('/').is_empty())
        .or_else(|| collection.filter(|p| !p.trim_matches('/').is_empty()))
        .unwrap_or(adapter)
}

/// Characters `object_store` percent-encodes inside a path segment.
pub const RESERVED: &[char] = &[
    '#', '?', '%', '[', ']', '~', '*', '|', '<', '>', '{', '}', '^', '`', '"',
];

/// Whether `prefix` is `base` or nested below it. An empty base contains
/// every prefix.
pub(crate) fn is_within(prefix: &str, base: &str) -> bool {
    base.is_empty()
        || prefix == base
        || prefix
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn validate_segment(segment: &str) -> Result<()> {
    match segment {
        "" => Err(AdapterError::InvalidKey("empty path segment".into())),
        "." | ".." => Err(AdapterError::InvalidKey(format!(
            "path traversal segment '{}'",
            segment
        ))),
        s if s.contains('\\') => Err(AdapterError::InvalidKey(format!(
            "backslash in segment '{}'",
            s
        ))),
        s if s.chars().any(char::is_control) => Err(AdapterError::InvalidKey(
            "control character in path".into(),
        )),
        s if s.contains(RESERVED) => Err(AdapterError::InvalidKey(format!(
            "reserved character in segment '{}'",
            s
        ))),
        _ => Ok(()),
    }
}
