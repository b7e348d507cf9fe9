use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{join_names, FeatureStore, GroupStore};
use crate::db::Database;
use crate::engine::CompiledStrategy;
use crate::error::{Entity, FlagError, Result};
use crate::models::{EvalContext, Strategy};

/// Named evaluation strategies.
///
/// Reads are served from an in-memory snapshot of compiled strategies;
/// writes go to the database and the snapshot together while the write
/// lock is held.
pub struct StrategyRegistry {
    entries: RwLock<BTreeMap<String, CompiledStrategy>>,
    db: Database,
}

impl StrategyRegistry {
    pub fn load(db: Database) -> Result<Self> {
        let entries = db
            .get_all_strategies()?
            .into_iter()
            .map(|s| (s.name.clone(), CompiledStrategy::from_stored(s)))
            .collect();
        Ok(Self {
            entries: RwLock::new(entries),
            db,
        })
    }

    pub fn define(&self, strategy: Strategy) -> Result<Strategy> {
        let compiled = strategy.compile()?;
        let strategy = compiled.strategy().clone();

        let mut entries = self.entries.write();
        if entries.contains_key(&strategy.name) {
            return Err(FlagError::duplicate(Entity::Strategy, &strategy.name));
        }
        self.db.insert_strategy(&strategy)?;
        entries.insert(strategy.name.clone(), compiled);

        tracing::info!(strategy = %strategy.name, kind = %strategy.kind, "Defined strategy");
        Ok(strategy)
    }

    /// Replaces the strategy stored under `name`. The stored record keeps `name`.
    ///
    /// An unknown `name` is reported before anything wrong with the body.
    pub fn update(&self, name: &str, mut strategy: Strategy) -> Result<Strategy> {
        if !self.contains(name) {
            return Err(FlagError::not_found(Entity::Strategy, name));
        }
        strategy.name = name.to_string();
        let compiled = strategy.compile()?;
        let strategy = compiled.strategy().clone();

        let mut entries = self.entries.write();
        let Some(slot) = entries.get_mut(name) else {
            return Err(FlagError::not_found(Entity::Strategy, name));
        };
        self.db.update_strategy(&strategy)?;
        *slot = compiled;

        tracing::info!(strategy = %name, "Updated strategy");
        Ok(strategy)
    }

    /// Removes a strategy nothing refers to.
    ///
    /// Fails with `InUse` while any group or feature names it.
    pub fn remove(
        &self,
        name: &str,
        groups: &GroupStore,
        features: &FeatureStore,
    ) -> Result<Strategy> {
        let users: Vec<String> = groups
            .by_strategy(name)
            .map(|g| format!("group '{}'", g.name))
            .chain(
                features
                    .by_strategy(name)
                    .map(|f| format!("feature '{}'", f.name)),
            )
            .collect();
        if !users.is_empty() {
            return Err(FlagError::InUse {
                entity: Entity::Strategy,
                name: name.to_string(),
                users: join_names(&users),
            });
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(name) {
            return Err(FlagError::not_found(Entity::Strategy, name));
        }
        self.db.delete_strategy(name)?;
        let removed = entries
            .remove(name)
            .map(CompiledStrategy::into_strategy)
            .ok_or_else(|| FlagError::not_found(Entity::Strategy, name))?;

        tracing::info!(strategy = %name, "Removed strategy");
        Ok(removed)
    }

    pub fn resolve(&self, name: &str) -> Result<Strategy> {
        self.get(name)
            .ok_or_else(|| FlagError::not_found(Entity::Strategy, name))
    }

    pub fn get(&self, name: &str) -> Option<Strategy> {
        self.entries.read().get(name).map(|c| c.strategy().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// All strategies ordered by name, taken from one snapshot.
    ///
    /// Call again for a fresh pass.
    pub fn list(&self) -> impl Iterator<Item = Strategy> {
        let snapshot: Vec<Strategy> = self
            .entries
            .read()
            .values()
            .map(|c| c.strategy().clone())
            .collect();
        snapshot.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Evaluates the strategy stored under `name` with its compiled patterns.
    ///
    /// Returns `Ok(None)` when no such strategy exists, so callers can treat
    /// a dangling reference as unsatisfied.
    pub fn evaluate_named(&self, name: &str, ctx: &EvalContext) -> Result<Option<bool>> {
        let compiled = self.entries.read().get(name).cloned();
        compiled.map(|c| c.evaluate(ctx)).transpose()
    }
}
