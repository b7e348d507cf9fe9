use std::fmt;

use serde::{Deserialize, Serialize};

/// A named rule deciding whether a context satisfies a condition.
///
/// `key` names the context property to inspect and `value` holds what it is
/// compared against. How the comparison works depends on [`StrategyType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: StrategyType,
    pub key: String,
    pub value: String,
}

/// The discriminator of a strategy.
///
/// - `ExactMatch`: `context[key]` equals `value`
/// - `RegexMatch`: regex `value` finds a match in `context[key]`
/// - `Environment`: some process environment variable fully matches regex
///   `key` by name and regex `value` by value; the context is not consulted
///
/// Unknown type strings are kept as `Unsupported` so that stored records
/// from other versions stay readable. Such strategies can be listed but
/// not defined or evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyType {
    ExactMatch,
    RegexMatch,
    Environment,
    Unsupported(String),
}

impl StrategyType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ExactMatch => "exact-match",
            Self::RegexMatch => "regex-match",
            Self::Environment => "environment",
            Self::Unsupported(other) => other,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl From<String> for StrategyType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "exact-match" => Self::ExactMatch,
            "regex-match" => Self::RegexMatch,
            "environment" => Self::Environment,
            _ => Self::Unsupported(s),
        }
    }
}

impl From<&str> for StrategyType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<StrategyType> for String {
    fn from(kind: StrategyType) -> Self {
        match kind {
            StrategyType::Unsupported(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
