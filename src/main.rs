use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use featureflags::cli::{self, Cli};
use featureflags::config::Config;

/// Initialize tracing on stderr so stdout carries only JSON output
fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match Config::load(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default().with_env_overrides(), Some(e)),
    };
    init_tracing(config.log_filter());
    if let Some(e) = config_error {
        tracing::warn!("Failed to load config, using defaults: {:#}", e);
    }

    let stores = cli::open_stores(&cli, &config)?;

    if let Err(err) = cli::run(cli.command, &stores, &mut std::io::stdout().lock()) {
        eprintln!("{}", cli::error_report(&err));
        std::process::exit(1);
    }

    Ok(())
}
