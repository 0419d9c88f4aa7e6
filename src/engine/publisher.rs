//! Commits classified observations and emits change events.
//!
//! Ordering is write-then-publish: the store is the durable source of truth,
//! so a failed publish never rolls the write back, and a failed write never
//! publishes.

use std::sync::Arc;
use tracing::{error, info, Instrument};

use super::detector::{Classification, Observation};
use crate::bus::MessageBus;
use crate::db::models::ScoreChangeEvent;
use crate::db::ScoreStore;
use crate::metrics::{Counter, Metrics};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Score matched the store; nothing written.
    Unchanged,
    /// First observation committed silently.
    Committed { revision: u64 },
    /// Transition committed and published.
    Published { revision: u64 },
    WriteFailed,
    /// Transition committed but the event could not be published.
    PublishFailed { revision: u64 },
}

pub struct Publisher {
    store: Arc<dyn ScoreStore>,
    bus: Arc<dyn MessageBus>,
    topic: String,
    metrics: Arc<Metrics>,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        bus: Arc<dyn MessageBus>,
        topic: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Publisher {
            store,
            bus,
            topic: topic.into(),
            metrics,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn apply(&self, obs: &Observation) -> PublishOutcome {
        let previous = match &obs.classification {
            Classification::Unchanged => return PublishOutcome::Unchanged,
            Classification::FirstSeen => None,
            Classification::Changed { previous } => Some(previous.as_str()),
        };

        let put = self
            .store
            .put(&obs.fingerprint, &obs.score)
            .instrument(tracing::info_span!("store_put", key = %obs.fingerprint))
            .await;
        let revision = match put {
            Ok(rev) => {
                self.metrics.incr(Counter::StorePutSuccess);
                rev
            }
            Err(e) => {
                self.metrics.incr(Counter::StorePutFailure);
                error!(game_id = %obs.game_id, key = %obs.fingerprint, "Failed to store score: {}", e);
                return PublishOutcome::WriteFailed;
            }
        };

        let Some(previous) = previous else {
            return PublishOutcome::Committed { revision };
        };

        self.metrics.incr(Counter::ScoreChanges);
        let update = ScoreChangeEvent {
            game_id: obs.game_id.clone(),
            score: obs.score.clone(),
            quarter_scores: obs.quarter_scores.clone(),
        };
        let payload = match serde_json::to_vec(&update) {
            Ok(p) => p,
            Err(e) => {
                self.metrics.incr(Counter::PublishFailure);
                error!(game_id = %obs.game_id, "Failed to serialize score update: {}", e);
                return PublishOutcome::PublishFailed { revision };
            }
        };

        let sent = self
            .bus
            .publish(&self.topic, payload)
            .instrument(tracing::info_span!("bus_publish", topic = %self.topic))
            .await;
        if let Err(e) = sent {
            self.metrics.incr(Counter::PublishFailure);
            error!(game_id = %obs.game_id, "Failed to publish score update: {}", e);
            return PublishOutcome::PublishFailed { revision };
        }

        info!(
            game_id = %obs.game_id,
            old_score = %previous,
            new_score = %obs.score,
            revision,
            "Score update published"
        );
        PublishOutcome::Published { revision }
    }
}
