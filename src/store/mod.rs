//! The three entity stores.
//!
//! Each store owns an in-memory snapshot behind its own `RwLock` and writes
//! through to the shared [`Database`]. A store never takes another store's
//! lock while holding its own: references into other stores are checked
//! first, then the writer's lock is taken. Stores are therefore eventually
//! consistent with each other and the engine tolerates dangling names.

mod features;
mod groups;
mod strategies;

pub use features::FeatureStore;
pub use groups::GroupStore;
pub use strategies::StrategyRegistry;

use crate::db::Database;
use crate::engine::Evaluator;
use crate::error::{Entity, FlagError, Result};

/// All stores, constructed once and passed by reference to whoever needs them.
pub struct Stores {
    pub strategies: StrategyRegistry,
    pub groups: GroupStore,
    pub features: FeatureStore,
}

impl Stores {
    /// Migrates `db` and loads every store from it.
    pub fn open(db: Database) -> Result<Self> {
        db.migrate()?;
        let stores = Self {
            strategies: StrategyRegistry::load(db.clone())?,
            groups: GroupStore::load(db.clone())?,
            features: FeatureStore::load(db)?,
        };
        tracing::debug!(
            strategies = stores.strategies.len(),
            groups = stores.groups.len(),
            features = stores.features.len(),
            "Loaded stores"
        );
        Ok(stores)
    }

    /// Stores over a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::open(Database::open_memory()?)
    }

    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.strategies, &self.groups, &self.features)
    }
}

fn check_name(entity: Entity, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FlagError::invalid(entity, "name must not be empty"));
    }
    Ok(())
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}
