//! Feature evaluation.
//!
//! The decision for a feature is taken in a fixed order:
//!
//! 1. master switch off → off
//! 2. direct strategy set → that strategy decides, groups are ignored
//! 3. groups listed → on if any group is enabled and satisfied
//! 4. otherwise → on
//!
//! Each entity is read once per evaluation, out of its store's snapshot.

mod matcher;

pub use matcher::CompiledStrategy;

use serde::Serialize;

use crate::error::Result;
use crate::models::EvalContext;
use crate::store::{FeatureStore, GroupStore, StrategyRegistry};

/// Which step of the evaluation order settled a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decided_by", rename_all = "snake_case")]
pub enum Decision {
    /// The master switch is off.
    Disabled,
    /// The direct strategy decided.
    Strategy { name: String, satisfied: bool },
    /// The direct strategy no longer exists.
    DanglingStrategy { name: String },
    /// The first group, by name, that was enabled and satisfied.
    Group { name: String },
    /// None of the listed groups was enabled and satisfied.
    NoGroupMatched,
    /// No strategy and no groups.
    Unconditional,
}

impl Decision {
    pub fn enabled(&self) -> bool {
        match self {
            Self::Strategy { satisfied, .. } => *satisfied,
            Self::Group { .. } | Self::Unconditional => true,
            Self::Disabled | Self::DanglingStrategy { .. } | Self::NoGroupMatched => false,
        }
    }
}

/// Answers whether a feature is on for a context.
///
/// Borrows the stores; build one per call site with [`crate::store::Stores::evaluator`].
pub struct Evaluator<'a> {
    strategies: &'a StrategyRegistry,
    groups: &'a GroupStore,
    features: &'a FeatureStore,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        strategies: &'a StrategyRegistry,
        groups: &'a GroupStore,
        features: &'a FeatureStore,
    ) -> Self {
        Self {
            strategies,
            groups,
            features,
        }
    }

    /// Fails with `NotFound` if the feature does not exist.
    pub fn is_enabled(&self, feature: &str, ctx: &EvalContext) -> Result<bool> {
        self.explain(feature, ctx).map(|d| d.enabled())
    }

    /// Like [`Self::is_enabled`], but reports which step decided.
    pub fn explain(&self, feature: &str, ctx: &EvalContext) -> Result<Decision> {
        let feature = self.features.resolve(feature)?;

        let decision = if !feature.enabled {
            Decision::Disabled
        } else if let Some(strategy) = feature.strategy.as_deref() {
            let ctx = ctx.layered_over(&feature.properties);
            match self.strategies.evaluate_named(strategy, &ctx)? {
                Some(satisfied) => Decision::Strategy {
                    name: strategy.to_string(),
                    satisfied,
                },
                None => {
                    tracing::warn!(
                        feature = %feature.name,
                        strategy,
                        "Feature references a missing strategy"
                    );
                    Decision::DanglingStrategy {
                        name: strategy.to_string(),
                    }
                }
            }
        } else if !feature.groups.is_empty() {
            self.first_satisfied_group(&feature.name, &feature.groups, ctx)?
                .map_or(Decision::NoGroupMatched, |name| Decision::Group { name })
        } else {
            Decision::Unconditional
        };

        tracing::debug!(feature = %feature.name, ?decision, "Evaluated feature");
        Ok(decision)
    }

    fn first_satisfied_group<'g>(
        &self,
        feature: &str,
        groups: impl IntoIterator<Item = &'g String>,
        ctx: &EvalContext,
    ) -> Result<Option<String>> {
        for name in groups {
            let Some(group) = self.groups.get(name) else {
                tracing::warn!(feature, group = %name, "Feature references a missing group");
                continue;
            };
            if self.groups.is_enabled_for(&group, ctx, self.strategies)? {
                return Ok(Some(group.name));
            }
        }
        Ok(None)
    }
}
