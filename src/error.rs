//! Error types for feature flag storage and evaluation.

use std::fmt;

use thiserror::Error;

/// The kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Feature,
    Group,
    Strategy,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Group => "group",
            Self::Strategy => "strategy",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure the stores and the engine report.
///
/// All variants are recoverable and meant for the caller; none of them is
/// retried internally.
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("{entity} '{name}' not found")]
    NotFound { entity: Entity, name: String },

    #[error("{entity} '{name}' already exists")]
    DuplicateName { entity: Entity, name: String },

    #[error("{entity} '{name}' references unknown {target} '{reference}'")]
    UnknownReference {
        entity: Entity,
        name: String,
        target: Entity,
        reference: String,
    },

    #[error("unsupported strategy type '{0}'")]
    UnsupportedStrategyType(String),

    #[error("{entity} '{name}' is still used by {users}")]
    InUse {
        entity: Entity,
        name: String,
        users: String,
    },

    #[error("invalid {entity} definition: {reason}")]
    InvalidDefinition { entity: Entity, reason: String },

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl FlagError {
    pub fn not_found(entity: Entity, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            name: name.into(),
        }
    }

    pub fn duplicate(entity: Entity, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            entity,
            name: name.into(),
        }
    }

    pub fn invalid(entity: Entity, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            entity,
            reason: reason.into(),
        }
    }

    /// The HTTP status a REST boundary would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::DuplicateName { .. } | Self::InUse { .. } => 409,
            Self::UnknownReference { .. }
            | Self::UnsupportedStrategyType(_)
            | Self::InvalidDefinition { .. } => 400,
            Self::Storage(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for FlagError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}

pub type Result<T, E = FlagError> = std::result::Result<T, E>;
