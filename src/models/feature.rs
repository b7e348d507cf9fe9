use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{empty_as_none, null_as_default, Properties};

/// A named boolean capability flag.
///
/// `enabled` is the master switch: when it is off the feature is off no
/// matter what its strategy or groups say. When it is on, a direct
/// `strategy` decides; otherwise membership in any satisfied group does;
/// otherwise the feature is unconditionally on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub strategy: Option<String>,
    /// Names of the groups this feature belongs to. Kept sorted, no duplicates.
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            strategy: None,
            groups: BTreeSet::new(),
            enabled: false,
            properties: Properties::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn uses_strategy(&self, strategy: &str) -> bool {
        self.strategy.as_deref() == Some(strategy)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
