use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::Cli;
use config::Config;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(catalog) = &cli.catalog {
        config.catalog = catalog.clone();
    }
    if let Some(central) = &cli.central_db {
        config.central = central.clone();
    }

    init_tracing(&config.log_directive(cli.debug, cli.verbose))?;
    match &source {
        Some(path) => debug!(path = %path.display(), "loaded config file"),
        None => debug!("no config file found, using defaults"),
    }

    commands::run_command(cli, &config)
}

/// `RUST_LOG` wins over the level derived from flags and config.
fn init_tracing(directive: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive)?,
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
    Ok(())
}
