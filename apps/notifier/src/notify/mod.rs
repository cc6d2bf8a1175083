//! Aggregation of flagged sites into a single outbound notification.

pub mod message;
pub mod publisher;

pub use message::{Notification, Title};
pub use publisher::{LogPublisher, Publisher, WebhookPublisher};

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Templates;
use crate::monitoring::CompletedCheck;
use crate::tracker::NotifyDecision;

/// What happened to the notification of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub notification: Notification,
    pub published: bool,
}

/// Builds and publishes the aggregated message
pub struct Notifier {
    publisher: Arc<dyn Publisher>,
    templates: Templates,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn Publisher>, templates: Templates) -> Self {
        Self { publisher, templates }
    }

    /// Publish one message covering every flagged decision.
    ///
    /// Returns `None` when nothing was flagged. A failed publish is logged
    /// and reported through [`Dispatch::published`]; it is not an error
    /// because the state behind the decisions is already recorded.
    pub async fn dispatch(&self, decisions: &[NotifyDecision]) -> Option<Dispatch> {
        let mut flagged: Vec<CompletedCheck> =
            decisions.iter().filter(|d| d.notify()).map(|d| d.check.clone()).collect();
        flagged.sort_by_key(|check| check.index);

        let Some(notification) = Notification::compose(&flagged, &self.templates) else {
            info!("All checks passed.");
            return None;
        };

        warn!("{} Will notify", notification.title.prefix(&self.templates));

        let published = match self
            .publisher
            .publish(&notification.subject, &notification.body)
            .await
        {
            Ok(()) => {
                info!("Published notification: {}", notification.subject);
                true
            }
            Err(e) => {
                error!("Failed to publish notification: {:#}", e);
                false
            }
        };

        Some(Dispatch { notification, published })
    }
}
