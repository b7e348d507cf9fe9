use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{check_name, join_names, FeatureStore, StrategyRegistry};
use crate::db::Database;
use crate::error::{Entity, FlagError, Result};
use crate::models::{EvalContext, Group};

/// Named groups, each optionally bound to a strategy.
pub struct GroupStore {
    entries: RwLock<BTreeMap<String, Group>>,
    db: Database,
}

impl GroupStore {
    pub fn load(db: Database) -> Result<Self> {
        let entries = db
            .get_all_groups()?
            .into_iter()
            .map(|g| (g.name.clone(), g))
            .collect();
        Ok(Self {
            entries: RwLock::new(entries),
            db,
        })
    }

    pub fn define(&self, group: Group, strategies: &StrategyRegistry) -> Result<Group> {
        check_name(Entity::Group, &group.name)?;
        check_strategy(&group, strategies)?;

        let mut entries = self.entries.write();
        if entries.contains_key(&group.name) {
            return Err(FlagError::duplicate(Entity::Group, &group.name));
        }
        self.db.insert_group(&group)?;
        entries.insert(group.name.clone(), group.clone());

        tracing::info!(group = %group.name, "Defined group");
        Ok(group)
    }

    /// Replaces the group stored under `name`. The stored record keeps `name`.
    ///
    /// An unknown `name` is reported before a bad strategy reference.
    pub fn update(
        &self,
        name: &str,
        mut group: Group,
        strategies: &StrategyRegistry,
    ) -> Result<Group> {
        if !self.contains(name) {
            return Err(FlagError::not_found(Entity::Group, name));
        }
        group.name = name.to_string();
        check_strategy(&group, strategies)?;

        let mut entries = self.entries.write();
        let Some(slot) = entries.get_mut(name) else {
            return Err(FlagError::not_found(Entity::Group, name));
        };
        self.db.update_group(&group)?;
        *slot = group.clone();

        tracing::info!(group = %name, "Updated group");
        Ok(group)
    }

    /// Removes a group no feature lists.
    pub fn remove(&self, name: &str, features: &FeatureStore) -> Result<Group> {
        let users: Vec<String> = features
            .by_group(name)
            .map(|f| format!("feature '{}'", f.name))
            .collect();
        if !users.is_empty() {
            return Err(FlagError::InUse {
                entity: Entity::Group,
                name: name.to_string(),
                users: join_names(&users),
            });
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(name) {
            return Err(FlagError::not_found(Entity::Group, name));
        }
        self.db.delete_group(name)?;
        let removed = entries
            .remove(name)
            .ok_or_else(|| FlagError::not_found(Entity::Group, name))?;

        tracing::info!(group = %name, "Removed group");
        Ok(removed)
    }

    pub fn resolve(&self, name: &str) -> Result<Group> {
        self.get(name)
            .ok_or_else(|| FlagError::not_found(Entity::Group, name))
    }

    pub fn get(&self, name: &str) -> Option<Group> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// All groups ordered by name, taken from one snapshot.
    pub fn list(&self) -> impl Iterator<Item = Group> {
        let snapshot: Vec<Group> = self.entries.read().values().cloned().collect();
        snapshot.into_iter()
    }

    /// Groups bound to the named strategy.
    pub fn by_strategy<'a>(&self, strategy: &'a str) -> impl Iterator<Item = Group> + 'a {
        self.list().filter(move |g| g.uses_strategy(strategy))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `group` is switched on and its strategy, if any, is satisfied.
    ///
    /// The strategy sees the group's properties overlaid by `ctx`. A strategy
    /// reference that no longer resolves leaves the group unsatisfied.
    pub fn is_enabled_for(
        &self,
        group: &Group,
        ctx: &EvalContext,
        strategies: &StrategyRegistry,
    ) -> Result<bool> {
        if !group.enabled {
            return Ok(false);
        }
        let Some(strategy) = group.strategy.as_deref() else {
            return Ok(true);
        };

        let ctx = ctx.layered_over(&group.properties);
        match strategies.evaluate_named(strategy, &ctx)? {
            Some(satisfied) => Ok(satisfied),
            None => {
                tracing::warn!(
                    group = %group.name,
                    strategy,
                    "Group references a missing strategy"
                );
                Ok(false)
            }
        }
    }
}

fn check_strategy(group: &Group, strategies: &StrategyRegistry) -> Result<()> {
    match group.strategy.as_deref() {
        Some(strategy) if !strategies.contains(strategy) => Err(FlagError::UnknownReference {
            entity: Entity::Group,
            name: group.name.clone(),
            target: Entity::Strategy,
            reference: strategy.to_string(),
        }),
        _ => Ok(()),
    }
}
