use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{check_name, GroupStore, StrategyRegistry};
use crate::db::Database;
use crate::error::{Entity, FlagError, Result};
use crate::models::Feature;

/// Named feature flags.
pub struct FeatureStore {
    entries: RwLock<BTreeMap<String, Feature>>,
    db: Database,
}

impl FeatureStore {
    pub fn load(db: Database) -> Result<Self> {
        let entries = db
            .get_all_features()?
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();
        Ok(Self {
            entries: RwLock::new(entries),
            db,
        })
    }

    pub fn define(
        &self,
        feature: Feature,
        strategies: &StrategyRegistry,
        groups: &GroupStore,
    ) -> Result<Feature> {
        check_name(Entity::Feature, &feature.name)?;
        check_references(&feature, strategies, groups)?;

        let mut entries = self.entries.write();
        if entries.contains_key(&feature.name) {
            return Err(FlagError::duplicate(Entity::Feature, &feature.name));
        }
        self.db.insert_feature(&feature)?;
        entries.insert(feature.name.clone(), feature.clone());

        tracing::info!(feature = %feature.name, enabled = feature.enabled, "Defined feature");
        Ok(feature)
    }

    /// Replaces the feature stored under `name`, memberships included.
    pub fn update(
        &self,
        name: &str,
        mut feature: Feature,
        strategies: &StrategyRegistry,
        groups: &GroupStore,
    ) -> Result<Feature> {
        if !self.contains(name) {
            return Err(FlagError::not_found(Entity::Feature, name));
        }
        feature.name = name.to_string();
        check_references(&feature, strategies, groups)?;

        let mut entries = self.entries.write();
        let Some(slot) = entries.get_mut(name) else {
            return Err(FlagError::not_found(Entity::Feature, name));
        };
        self.db.update_feature(&feature)?;
        *slot = feature.clone();

        tracing::info!(feature = %name, enabled = feature.enabled, "Updated feature");
        Ok(feature)
    }

    /// Flips the master switch and leaves everything else alone.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<Feature> {
        let mut entries = self.entries.write();
        let Some(slot) = entries.get_mut(name) else {
            return Err(FlagError::not_found(Entity::Feature, name));
        };
        self.db.set_feature_enabled(name, enabled)?;
        slot.enabled = enabled;

        tracing::info!(feature = %name, enabled, "Toggled feature");
        Ok(slot.clone())
    }

    pub fn remove(&self, name: &str) -> Result<Feature> {
        let mut entries = self.entries.write();
        if !entries.contains_key(name) {
            return Err(FlagError::not_found(Entity::Feature, name));
        }
        self.db.delete_feature(name)?;
        let removed = entries
            .remove(name)
            .ok_or_else(|| FlagError::not_found(Entity::Feature, name))?;

        tracing::info!(feature = %name, "Removed feature");
        Ok(removed)
    }

    pub fn resolve(&self, name: &str) -> Result<Feature> {
        self.get(name)
            .ok_or_else(|| FlagError::not_found(Entity::Feature, name))
    }

    pub fn get(&self, name: &str) -> Option<Feature> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// All features ordered by name, taken from one snapshot.
    pub fn list(&self) -> impl Iterator<Item = Feature> {
        let snapshot: Vec<Feature> = self.entries.read().values().cloned().collect();
        snapshot.into_iter()
    }

    /// Features whose direct strategy is the named one.
    pub fn by_strategy<'a>(&self, strategy: &'a str) -> impl Iterator<Item = Feature> + 'a {
        self.list().filter(move |f| f.uses_strategy(strategy))
    }

    /// Features that list the named group.
    pub fn by_group<'a>(&self, group: &'a str) -> impl Iterator<Item = Feature> + 'a {
        self.list().filter(move |f| f.in_group(group))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn check_references(
    feature: &Feature,
    strategies: &StrategyRegistry,
    groups: &GroupStore,
) -> Result<()> {
    let unknown = |target: Entity, reference: &str| FlagError::UnknownReference {
        entity: Entity::Feature,
        name: feature.name.clone(),
        target,
        reference: reference.to_string(),
    };

    if let Some(strategy) = feature.strategy.as_deref() {
        if !strategies.contains(strategy) {
            return Err(unknown(Entity::Strategy, strategy));
        }
    }
    if let Some(group) = feature.groups.iter().find(|g| !groups.contains(g)) {
        return Err(unknown(Entity::Group, group));
    }
    Ok(())
}
