use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Properties;

/// Caller-supplied data that strategies evaluate against, such as user attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvalContext(Properties);

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a context where `defaults` fill in keys this context lacks.
    pub fn layered_over(&self, defaults: &Properties) -> Cow<'_, EvalContext> {
        if defaults.is_empty() {
            return Cow::Borrowed(self);
        }
        let mut merged = defaults.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Cow::Owned(Self(merged))
    }

    /// The text form of a scalar property.
    ///
    /// Strings are returned as-is; numbers and booleans by their JSON text.
    /// Null, arrays, objects and missing keys have no text form.
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.get(key)? {
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<Properties> for EvalContext {
    fn from(props: Properties) -> Self {
        Self(props)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for EvalContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parses a `key=value` assignment.
///
/// The value is read as JSON when it parses and as a plain string otherwise,
/// so `tier=3` yields a number and `env=prod` a string. Returns `None` when
/// there is no `=` or the key is empty.
pub fn parse_assignment(input: &str) -> Option<(String, Value)> {
    let (key, raw) = input.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Some((key.to_string(), value))
}
