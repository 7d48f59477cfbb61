//! Bundler configuration hook.
//!
//! Hosts that bundle their admin UI for the browser pass their bundler config
//! through [`BuildHook::apply`], which aliases server-only modules to `false`
//! so they are stubbed out of the browser build.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A bundler configuration, kept as opaque JSON apart from `resolve.alias`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildConfig(Value);

impl BuildConfig {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for BuildConfig {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildHook {
    server_only: Vec<String>,
}

impl BuildHook {
    /// A hook with no server-only modules: the identity function.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub `module` out of browser builds.
    pub fn server_only(mut self, module: impl Into<String>) -> Self {
        self.server_only.push(module.into());
        self
    }

    pub fn is_identity(&self) -> bool {
        self.server_only.is_empty()
    }

    /// Return `base` with every server-only module aliased to `false`.
    ///
    /// Aliases the host already set are left untouched.
    pub fn apply(&self, base: BuildConfig) -> BuildConfig {
        if self.is_identity() {
            return base;
        }

        let mut root = match base.0 {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                warn!("bundler config is not an object, leaving it unchanged");
                return BuildConfig(other);
            }
        };

        let Some(resolve) = object_entry(&mut root, "resolve") else {
            warn!("bundler config 'resolve' is not an object, leaving it unchanged");
            return BuildConfig(Value::Object(root));
        };
        let Some(alias) = object_entry(resolve, "alias") else {
            warn!("bundler config 'resolve.alias' is not an object, leaving it unchanged");
            return BuildConfig(Value::Object(root));
        };
        for module in &self.server_only {
            alias
                .entry(module.clone())
                .or_insert(Value::Bool(false));
        }

        BuildConfig(Value::Object(root))
    }
}

/// The object stored at `key`, inserting an empty one when absent.
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    map.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}
