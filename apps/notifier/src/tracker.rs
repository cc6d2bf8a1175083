//! Reconciles a finished check against the site's previous state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::database::{StateRecord, StateStore};
use crate::monitoring::CompletedCheck;

/// Why a site made it into the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyReason {
    /// Health flipped since the previous run (including first-run failures)
    StateChanged,
    /// Was down and is still down
    StillExceptional,
}

impl fmt::Display for NotifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyReason::StateChanged => write!(f, "state-changed"),
            NotifyReason::StillExceptional => write!(f, "still-exceptional"),
        }
    }
}

/// Outcome of reconciling one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyDecision {
    pub check: CompletedCheck,
    pub reason: Option<NotifyReason>,
}

impl NotifyDecision {
    pub fn notify(&self) -> bool {
        self.reason.is_some()
    }
}

/// Decide whether a site is worth reporting.
///
/// A site is reported while it is down, and once more when it recovers. A
/// site with no previous record is assumed to have been healthy, so a
/// failure on the very first run is always reported.
pub fn decide(
    previously_exceptional: Option<bool>,
    currently_exceptional: bool,
) -> Option<NotifyReason> {
    let previous = previously_exceptional.unwrap_or(false);

    if previous != currently_exceptional {
        Some(NotifyReason::StateChanged)
    } else if currently_exceptional {
        Some(NotifyReason::StillExceptional)
    } else {
        None
    }
}

/// Writes each site's new state and yields its notify decision
pub struct StateTracker {
    store: Arc<dyn StateStore>,
    timestamp: DateTime<Utc>,
}

impl StateTracker {
    /// `timestamp` is recorded as `last_checked` for every site of this run
    pub fn new(store: Arc<dyn StateStore>, timestamp: DateTime<Utc>) -> Self {
        Self { store, timestamp }
    }

    /// Read the prior record, decide, then persist the current outcome.
    ///
    /// The new record is written before the decision is returned, so a
    /// decision only exists once the state behind it is durable. Store errors
    /// are propagated, never treated as "nothing changed".
    pub async fn reconcile(&self, check: CompletedCheck) -> Result<NotifyDecision> {
        let prior = self
            .store
            .get(&check.name)
            .await
            .with_context(|| format!("failed to read previous state of {}", check.name))?;

        let reason = decide(prior.as_ref().map(|r| r.exceptional), check.exceptional());

        let record = StateRecord::new(
            check.name.clone(),
            check.exceptional(),
            self.timestamp,
            check.message(),
        );
        self.store
            .put(&record)
            .await
            .with_context(|| format!("failed to record state of {}", check.name))?;

        match reason {
            Some(reason) => info!(site = %check.name, %reason, "Site flagged for notification"),
            None => info!(site = %check.name, "No notification needed"),
        }

        Ok(NotifyDecision { check, reason })
    }

    /// Reconcile every check in order, stopping at the first store error
    pub async fn reconcile_all(&self, checks: Vec<CompletedCheck>) -> Result<Vec<NotifyDecision>> {
        let mut decisions = Vec::with_capacity(checks.len());
        for check in checks {
            decisions.push(self.reconcile(check).await?);
        }
        Ok(decisions)
    }
}
