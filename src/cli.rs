//! The `ffctl` command surface.
//!
//! Parsing lives here rather than in the binary so commands can be driven
//! against any [`Stores`] and any writer.

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::db::Database;
use crate::models::*;
use crate::{FlagError, Stores};

#[derive(Parser)]
#[command(name = "ffctl")]
#[command(about = "Manage feature flags, groups and strategies")]
pub struct Cli {
    /// Database file (overrides config and FEATUREFLAGS_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long, global = true, conflicts_with = "db")]
    pub memory: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage strategies
    Strategy {
        #[command(subcommand)]
        command: StrategyCommand,
    },
    /// Manage groups
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },
    /// Manage features
    Feature {
        #[command(subcommand)]
        command: FeatureCommand,
    },
    /// Decide whether a feature is enabled for a context
    Eval {
        feature: String,
        /// Context entry as key=value; values that parse as JSON are kept typed
        #[arg(long = "ctx", value_name = "KEY=VALUE", value_parser = parse_pair)]
        context: Vec<(String, Value)>,
        /// Report which evaluation step decided
        #[arg(long)]
        explain: bool,
    },
}

#[derive(Subcommand)]
pub enum StrategyCommand {
    Define(StrategyArgs),
    Update(StrategyArgs),
    Remove { name: String },
    Show { name: String },
    List,
}

#[derive(Subcommand)]
pub enum GroupCommand {
    Define(GroupArgs),
    Update(GroupArgs),
    Remove { name: String },
    Show { name: String },
    List,
    /// Groups bound to a strategy
    ByStrategy { strategy: String },
}

#[derive(Subcommand)]
pub enum FeatureCommand {
    Define(FeatureArgs),
    Update(FeatureArgs),
    Remove { name: String },
    Show { name: String },
    List,
    /// Turn the master switch on
    Enable { name: String },
    /// Turn the master switch off
    Disable { name: String },
    /// Features whose direct strategy is the given one
    ByStrategy { strategy: String },
    /// Features that belong to the given group
    ByGroup { group: String },
}

#[derive(Args)]
pub struct StrategyArgs {
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    /// exact-match, regex-match or environment
    #[arg(long = "type", value_name = "TYPE")]
    kind: String,
    /// Context property to inspect
    #[arg(long)]
    key: String,
    /// Value or pattern to match
    #[arg(long)]
    value: String,
}

impl From<StrategyArgs> for Strategy {
    fn from(args: StrategyArgs) -> Self {
        Strategy {
            name: args.name,
            description: args.description,
            kind: StrategyType::from(args.kind),
            key: args.key,
            value: args.value,
        }
    }
}

#[derive(Args)]
pub struct GroupArgs {
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    strategy: Option<String>,
    #[arg(long)]
    enabled: bool,
    /// Property as key=value; repeatable
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_pair)]
    properties: Vec<(String, Value)>,
}

impl From<GroupArgs> for Group {
    fn from(args: GroupArgs) -> Self {
        Group {
            name: args.name,
            description: args.description,
            strategy: args.strategy.filter(|s| !s.is_empty()),
            enabled: args.enabled,
            properties: args.properties.into_iter().collect(),
        }
    }
}

#[derive(Args)]
pub struct FeatureArgs {
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    strategy: Option<String>,
    /// Group membership; repeatable
    #[arg(long = "group")]
    groups: Vec<String>,
    #[arg(long)]
    enabled: bool,
    /// Property as key=value; repeatable
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_pair)]
    properties: Vec<(String, Value)>,
}

impl From<FeatureArgs> for Feature {
    fn from(args: FeatureArgs) -> Self {
        Feature {
            name: args.name,
            description: args.description,
            strategy: args.strategy.filter(|s| !s.is_empty()),
            groups: args.groups.into_iter().collect(),
            enabled: args.enabled,
            properties: args.properties.into_iter().collect(),
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, Value), String> {
    parse_assignment(s).ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

pub fn open_stores(cli: &Cli, config: &Config) -> anyhow::Result<Stores> {
    if cli.memory {
        return Ok(Stores::in_memory()?);
    }

    let db = match cli.db.clone().or_else(|| config.database_path.clone()) {
        Some(path) => Database::open(path)?,
        None => Database::open_default()?,
    };
    Ok(Stores::open(db)?)
}

fn print_json(out: &mut dyn Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn run_strategy(
    command: StrategyCommand,
    stores: &Stores,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let strategies = &stores.strategies;
    match command {
        StrategyCommand::Define(args) => print_json(out, &strategies.define(args.into())?),
        StrategyCommand::Update(args) => {
            let name = args.name.clone();
            print_json(out, &strategies.update(&name, args.into())?)
        }
        StrategyCommand::Remove { name } => {
            print_json(out, &strategies.remove(&name, &stores.groups, &stores.features)?)
        }
        StrategyCommand::Show { name } => print_json(out, &strategies.resolve(&name)?),
        StrategyCommand::List => print_json(out, &Listing::new(
            ResourceKind::Strategies,
            strategies.list(),
        )),
    }
}

fn run_group(command: GroupCommand, stores: &Stores, out: &mut dyn Write) -> anyhow::Result<()> {
    let groups = &stores.groups;
    match command {
        GroupCommand::Define(args) => {
            print_json(out, &groups.define(args.into(), &stores.strategies)?)
        }
        GroupCommand::Update(args) => {
            let name = args.name.clone();
            print_json(out, &groups.update(&name, args.into(), &stores.strategies)?)
        }
        GroupCommand::Remove { name } => print_json(out, &groups.remove(&name, &stores.features)?),
        GroupCommand::Show { name } => print_json(out, &groups.resolve(&name)?),
        GroupCommand::List => print_json(out, &Listing::new(ResourceKind::Groups, groups.list())),
        GroupCommand::ByStrategy { strategy } => print_json(out, &Listing::new(
            ResourceKind::Groups,
            groups.by_strategy(&strategy),
        )),
    }
}

fn run_feature(
    command: FeatureCommand,
    stores: &Stores,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let features = &stores.features;
    match command {
        FeatureCommand::Define(args) => print_json(out, &features.define(
            args.into(),
            &stores.strategies,
            &stores.groups,
        )?),
        FeatureCommand::Update(args) => {
            let name = args.name.clone();
            print_json(out, &features.update(
                &name,
                args.into(),
                &stores.strategies,
                &stores.groups,
            )?)
        }
        FeatureCommand::Remove { name } => print_json(out, &features.remove(&name)?),
        FeatureCommand::Show { name } => print_json(out, &features.resolve(&name)?),
        FeatureCommand::List => {
            print_json(out, &Listing::new(ResourceKind::Features, features.list()))
        }
        FeatureCommand::Enable { name } => print_json(out, &features.set_enabled(&name, true)?),
        FeatureCommand::Disable { name } => print_json(out, &features.set_enabled(&name, false)?),
        FeatureCommand::ByStrategy { strategy } => print_json(out, &Listing::new(
            ResourceKind::Features,
            features.by_strategy(&strategy),
        )),
        FeatureCommand::ByGroup { group } => print_json(out, &Listing::new(
            ResourceKind::Features,
            features.by_group(&group),
        )),
    }
}

/// Runs one command, writing its JSON result to `out`.
pub fn run(command: Commands, stores: &Stores, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Commands::Strategy { command } => run_strategy(command, stores, out),
        Commands::Group { command } => run_group(command, stores, out),
        Commands::Feature { command } => run_feature(command, stores, out),
        Commands::Eval {
            feature,
            context,
            explain,
        } => {
            let ctx: EvalContext = context.into_iter().collect();
            let evaluator = stores.evaluator();
            if explain {
                let decision = evaluator.explain(&feature, &ctx)?;
                print_json(out, &serde_json::json!({
                    "feature": feature,
                    "enabled": decision.enabled(),
                    "decision": decision,
                }))
            } else {
                let enabled = evaluator.is_enabled(&feature, &ctx)?;
                print_json(out, &serde_json::json!({ "feature": feature, "enabled": enabled }))
            }
        }
    }
}

/// The line printed on stderr when a command fails, led by the HTTP status
/// class of the error.
pub fn error_report(err: &anyhow::Error) -> String {
    let status = err
        .downcast_ref::<FlagError>()
        .map_or(500, FlagError::status_code);
    format!("error [{}]: {:#}", status, err)
}
