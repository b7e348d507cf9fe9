//! How each strategy type decides against a context.
//!
//! Patterns are compiled once, when a strategy is defined or loaded, and
//! kept next to the definition in a [`CompiledStrategy`].

use regex::Regex;

use crate::error::{Entity, FlagError, Result};
use crate::models::{EvalContext, Strategy, StrategyType};

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    Pattern(Regex),
    Environment { key: Regex, value: Regex },
    Unsupported(String),
    /// A stored definition that no longer validates.
    Rejected(String),
}

/// A strategy together with its compiled patterns.
#[derive(Debug, Clone)]
pub struct CompiledStrategy {
    strategy: Strategy,
    matcher: Matcher,
}

impl Strategy {
    /// Checks the invariants a strategy must hold before it is stored.
    pub fn validate(&self) -> Result<()> {
        self.matcher().map(drop)
    }

    /// Validates and compiles, ready for repeated evaluation.
    pub fn compile(self) -> Result<CompiledStrategy> {
        let matcher = self.matcher()?;
        Ok(CompiledStrategy {
            strategy: self,
            matcher,
        })
    }

    fn matcher(&self) -> Result<Matcher> {
        if self.name.trim().is_empty() {
            return Err(FlagError::invalid(Entity::Strategy, "name must not be empty"));
        }
        if let StrategyType::Unsupported(kind) = &self.kind {
            return Err(FlagError::UnsupportedStrategyType(kind.clone()));
        }
        if self.key.trim().is_empty() {
            return Err(FlagError::invalid(
                Entity::Strategy,
                format!("'{}' has an empty key", self.name),
            ));
        }
        if self.value.trim().is_empty() {
            return Err(FlagError::invalid(
                Entity::Strategy,
                format!("'{}' has an empty value", self.name),
            ));
        }
        Ok(match &self.kind {
            StrategyType::ExactMatch => Matcher::Exact,
            StrategyType::RegexMatch => Matcher::Pattern(compile(&self.value)?),
            StrategyType::Environment => Matcher::Environment {
                key: compile_anchored(&self.key)?,
                value: compile_anchored(&self.value)?,
            },
            StrategyType::Unsupported(kind) => Matcher::Unsupported(kind.clone()),
        })
    }
}

impl CompiledStrategy {
    /// Accepts a definition read back from storage even when it no longer
    /// validates; the problem is reported by [`Self::evaluate`] instead.
    pub fn from_stored(strategy: Strategy) -> Self {
        let matcher = match strategy.matcher() {
            Ok(matcher) => matcher,
            Err(FlagError::UnsupportedStrategyType(kind)) => Matcher::Unsupported(kind),
            Err(FlagError::InvalidDefinition { reason, .. }) => {
                tracing::warn!(
                    strategy = %strategy.name,
                    %reason,
                    "Stored strategy does not validate"
                );
                Matcher::Rejected(reason)
            }
            Err(other) => Matcher::Rejected(other.to_string()),
        };
        Self { strategy, matcher }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn into_strategy(self) -> Strategy {
        self.strategy
    }

    /// Decides whether `ctx` satisfies this strategy.
    ///
    /// Fails with `UnsupportedStrategyType` for unknown types and with
    /// `InvalidDefinition` when a stored definition does not validate.
    pub fn evaluate(&self, ctx: &EvalContext) -> Result<bool> {
        let key = self.strategy.key.as_str();
        match &self.matcher {
            Matcher::Exact => Ok(ctx
                .text(key)
                .is_some_and(|v| v.as_ref() == self.strategy.value.as_str())),
            Matcher::Pattern(pattern) => Ok(ctx.text(key).is_some_and(|v| pattern.is_match(&v))),
            Matcher::Environment { key, value } => {
                Ok(std::env::vars_os().any(|(k, v)| match (k.to_str(), v.to_str()) {
                    (Some(k), Some(v)) => key.is_match(k) && value.is_match(v),
                    _ => false,
                }))
            }
            Matcher::Unsupported(kind) => Err(FlagError::UnsupportedStrategyType(kind.clone())),
            Matcher::Rejected(reason) => Err(FlagError::invalid(Entity::Strategy, reason.clone())),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        FlagError::invalid(Entity::Strategy, format!("bad pattern '{pattern}': {e}"))
    })
}

fn compile_anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        FlagError::invalid(Entity::Strategy, format!("bad pattern '{pattern}': {e}"))
    })
}
