use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use super::probe::SiteProbe;
use super::types::CheckOutcome;
use crate::config::SiteConfig;

/// One in-flight check of one site. Single use: started once, joined once.
pub struct Checker {
    index: usize,
    site: SiteConfig,
    handle: JoinHandle<CheckOutcome>,
}

/// A finished check, tagged with the site's position in the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheck {
    pub index: usize,
    pub name: String,
    pub url: String,
    pub outcome: CheckOutcome,
}

impl Checker {
    /// Spawn the probe for `site` on the runtime and return immediately
    pub fn start(index: usize, site: SiteConfig, probe: Arc<dyn SiteProbe>) -> Self {
        let span = info_span!("check", site = %site.name);
        let task_site = site.clone();

        let handle = tokio::spawn(
            async move {
                let outcome = probe.probe(&task_site).await;
                if outcome.exceptional {
                    warn!("{} is down: {}", task_site.url, outcome.message);
                } else {
                    debug!("{} is up: {}", task_site.url, outcome.message);
                }
                outcome
            }
            .instrument(span),
        );

        Self { index, site, handle }
    }

    pub fn name(&self) -> &str {
        &self.site.name
    }

    /// Wait for the check to finish.
    ///
    /// Errors only when the task itself died (panic or runtime shutdown);
    /// site failures are part of the returned outcome.
    pub async fn join(self) -> Result<CompletedCheck> {
        let Self { index, site, handle } = self;

        let outcome = handle
            .await
            .with_context(|| format!("check for site `{}` did not complete", site.name))?;

        Ok(CompletedCheck { index, name: site.name, url: site.url, outcome })
    }
}

impl CompletedCheck {
    pub fn exceptional(&self) -> bool {
        self.outcome.exceptional
    }

    pub fn message(&self) -> &str {
        &self.outcome.message
    }
}
