use serde::{Deserialize, Serialize};

/// Version of the list envelope. Bump when the envelope shape changes.
pub const LISTING_API_VERSION: u32 = 1;

/// Which resource a [`Listing`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Features,
    Groups,
    Strategies,
}

/// The one envelope every list response uses.
///
/// ```json
/// {"apiVersion": 1, "kind": "features", "items": [...]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing<T> {
    pub api_version: u32,
    pub kind: ResourceKind,
    pub items: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new(kind: ResourceKind, items: impl IntoIterator<Item = T>) -> Self {
        Self {
            api_version: LISTING_API_VERSION,
            kind,
            items: items.into_iter().collect(),
        }
    }
}
