/// Orchestrator module - one end-to-end run of the notifier
///
/// A run is strictly phased:
/// - every configured site is checked concurrently and joined
/// - each outcome is reconciled against, and then written to, the state store
/// - flagged sites are aggregated into a single notification and published
///
/// Nothing is published before every state record of the run is written.


use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{Instrument, info};

use crate::config::Config;
use crate::context::InvocationContext;
use crate::database::{LibsqlStateStore, StateStore};
use crate::monitoring::{ConcurrentRunner, HttpProbe, SiteProbe};
use crate::notify::{Dispatch, LogPublisher, Notification, Notifier, Publisher, WebhookPublisher};
use crate::pool;
use crate::tracker::{NotifyDecision, StateTracker};

/// Pool size for the state database; reconciliation is sequential
const STATE_POOL_SIZE: usize = 2;

/// Everything a run decided and did
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One decision per configured site, in configuration order
    pub decisions: Vec<NotifyDecision>,
    /// Present when at least one site was flagged
    pub dispatch: Option<Dispatch>,
}

impl RunReport {
    pub fn notification(&self) -> Option<&Notification> {
        self.dispatch.as_ref().map(|d| &d.notification)
    }

    pub fn published(&self) -> bool {
        self.dispatch.as_ref().is_some_and(|d| d.published)
    }

    #[cfg(test)]
    pub fn decision(&self, site_name: &str) -> Option<&NotifyDecision> {
        self.decisions.iter().find(|d| d.check.name == site_name)
    }
}

/// Main orchestrator for the notifier
pub struct Orchestrator {
    config: Arc<Config>,
    runner: ConcurrentRunner,
    store: Arc<dyn StateStore>,
    notifier: Notifier,
}

impl Orchestrator {
    /// Build the production wiring from `config` and run once, logging
    /// into the caller's current span.
    /// This is a convenience method for the binary entry point.
    pub async fn start(config: Arc<Config>, dry_run: bool) -> Result<RunReport> {
        let orchestrator = Self::from_config(config, dry_run).await?;
        orchestrator.execute().await
    }

    /// Open the state database and pick the publisher described by `config`
    pub async fn from_config(config: Arc<Config>, dry_run: bool) -> Result<Self> {
        info!("Opening state database at {}", config.database_path);
        let pool = pool::open_local(&config.database_path, STATE_POOL_SIZE)
            .await
            .with_context(|| format!("failed to open state database {}", config.database_path))?;

        let store = LibsqlStateStore::new_from_pool(pool, config.state_table.clone());
        store.initialize().await.context("failed to prepare state table")?;

        let probe = HttpProbe::new(config.timeout_seconds)?;

        let publisher: Arc<dyn Publisher> = match (&config.topic_url, dry_run) {
            (Some(url), false) => {
                Arc::new(WebhookPublisher::new(url.clone(), config.topic_token.clone())?)
            }
            (Some(_), true) => {
                info!("Dry run, notifications go to the log");
                Arc::new(LogPublisher)
            }
            (None, _) => {
                info!("No topic configured, notifications go to the log");
                Arc::new(LogPublisher)
            }
        };

        Ok(Self::new(config, Arc::new(probe), Arc::new(store), publisher))
    }

    /// Assemble an orchestrator from already built parts
    pub fn new(
        config: Arc<Config>,
        probe: Arc<dyn SiteProbe>,
        store: Arc<dyn StateStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let notifier = Notifier::new(publisher, config.templates.clone());
        Self { config, runner: ConcurrentRunner::new(probe), store, notifier }
    }

    /// Check, reconcile and notify once inside the span of `ctx`.
    ///
    /// Errors from the runner or the state store abort the run; a failed
    /// publish does not.
    pub async fn run(&self, ctx: &InvocationContext) -> Result<RunReport> {
        self.execute().instrument(ctx.span()).await
    }

    /// Same as [`Orchestrator::run`], logging into the current span
    pub async fn execute(&self) -> Result<RunReport> {
        info!("Checking {} sites", self.config.sites.len());
        let checks = self.runner.run(&self.config.sites).await?;

        let tracker = StateTracker::new(Arc::clone(&self.store), Utc::now());
        let decisions = tracker.reconcile_all(checks).await?;

        let flagged = decisions.iter().filter(|d| d.notify()).count();
        info!("{} of {} sites flagged for notification", flagged, decisions.len());

        let dispatch = self.notifier.dispatch(&decisions).await;
        Ok(RunReport { decisions, dispatch })
    }
}
