mod config;
mod context;
mod database;
mod monitoring;
mod notify;
mod orchestrator;
mod parameters;
mod pool;
mod tracker;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, info};

use crate::config::Config;
use crate::context::InvocationContext;
use crate::orchestrator::Orchestrator;
use crate::parameters::{EnvParameterResolver, FileParameterResolver, ParameterResolver};

/// Check the configured sites once and report outages and recoveries
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Identifier used to correlate the log lines of this run
    #[arg(long)]
    request_id: Option<String>,

    /// Resolve `parameterstore_` entries from files under this directory
    /// instead of from environment variables
    #[arg(long)]
    secrets_dir: Option<PathBuf>,

    /// Log the notification instead of publishing it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let cli = Cli::parse();

    let ctx = cli
        .request_id
        .map(InvocationContext::new)
        .unwrap_or_else(InvocationContext::generate);

    let resolver: Box<dyn ParameterResolver> = match cli.secrets_dir {
        Some(dir) => Box::new(FileParameterResolver::new(Some(dir))),
        None => Box::new(EnvParameterResolver),
    };

    let config_path = cli.config;
    let dry_run = cli.dry_run;

    let span = ctx.span();
    async move {
        info!("Starting {}", ctx);
        let config = Config::from_config(&config_path, resolver.as_ref()).with_context(|| {
            format!("failed to load configuration from {}", config_path.display())
        })?;
        info!("{}", config);

        let report = Orchestrator::start(Arc::new(config), dry_run).await?;

        let outcome = match report.notification() {
            None => "not needed".to_string(),
            Some(n) if report.published() => format!("published ({})", n.subject),
            Some(n) => format!("failed ({})", n.subject),
        };
        info!("Run finished: {} sites checked, notification {}", report.decisions.len(), outcome);
        Ok::<_, anyhow::Error>(())
    }
    .instrument(span)
    .await
}
