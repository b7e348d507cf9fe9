use serde::{Deserialize, Serialize};

use super::{empty_as_none, null_as_default, Properties};

/// A named, reusable strategy binding shared by many features.
///
/// A group contributes to a feature's decision only while `enabled` is set.
/// Its `properties` act as context defaults for its strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub strategy: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Properties,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            strategy: None,
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
}
