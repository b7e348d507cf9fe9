//! Domain models for feature flags.
//!
//! # Core Concepts
//!
//! - [`Strategy`]: A named, typed rule that evaluates a caller context to a boolean.
//! - [`Group`]: A named, reusable strategy binding shared by many features.
//! - [`Feature`]: A named boolean flag with a master switch, an optional direct
//!   strategy and optional group memberships.
//! - [`EvalContext`]: Caller-supplied key/value data strategies evaluate against.
//!
//! Relations between entities are by name only. They are resolved when a
//! feature is evaluated, never cached on the entity.

mod context;
mod feature;
mod group;
mod listing;
mod strategy;

pub use context::*;
pub use feature::*;
pub use group::*;
pub use listing::*;
pub use strategy::*;

use serde::{Deserialize, Deserializer};

/// Open JSON mapping carried by features and groups.
///
/// Only structural validity is checked; values are never schema-checked.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Deserialize `null` as the type's default, so `"groups": null` reads as an empty set.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an optional name reference, treating `""` the same as absent.
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}
