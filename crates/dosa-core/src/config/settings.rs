//! Nested JSON settings with typed defaults.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::ConfigError;

/// Parsed configuration document.
///
/// Lookups walk object keys; a missing key, a `null` or a value of the wrong
/// type yields the caller's default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    root: Value,
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_value(serde_json::from_str(text)?))
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Value at `path`, if every key along it exists.
    pub fn node(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.root, |node, key| node.as_object()?.get(*key))
    }

    pub fn contains(&self, path: &[&str]) -> bool {
        self.node(path).is_some_and(|v| !v.is_null())
    }

    pub fn get<T: DeserializeOwned>(&self, path: &[&str], default: T) -> T {
        let Some(node) = self.node(path).filter(|v| !v.is_null()) else {
            return default;
        };

        match serde_json::from_value(node.clone()) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %path.join("."), error = %e, "Ignoring invalid setting");
                default
            }
        }
    }
}
