//! Feature flags with group membership and strategy-based targeting.
//!
//! Three stores hold the managed entities: [`store::StrategyRegistry`],
//! [`store::GroupStore`] and [`store::FeatureStore`]. They are bundled in
//! [`store::Stores`], persisted through [`db::Database`], and read by
//! [`engine::Evaluator`] to decide whether a feature is on for a context.

pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;

pub use engine::{Decision, Evaluator};
pub use error::{Entity, FlagError, Result};
pub use store::Stores;
