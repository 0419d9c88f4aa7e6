//! Publish/subscribe transport for score-change events.
//!
//! The engine only needs [`MessageBus::publish`]; delivery is fire-and-forget.
//! [`BroadcastBus`] fans messages out in-process, and the HTTP layer bridges
//! its subscribers onto WebSocket clients.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// NATS-style default ceiling on a single message body.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },
}

/// A message as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// In-process broadcast bus. Publishing with no live subscribers succeeds;
/// slow subscribers lag and lose the oldest messages.
pub struct BroadcastBus {
    tx: broadcast::Sender<BusMessage>,
    max_payload: usize,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        Self::with_max_payload(capacity, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(capacity: usize, max_payload: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastBus { tx, max_payload }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl MessageBus for BroadcastBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if payload.len() > self.max_payload {
            return Err(BusError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }
        let msg = BusMessage {
            topic: topic.to_string(),
            payload,
        };
        match self.tx.send(msg) {
            Ok(receivers) => debug!(topic, receivers, "Published bus message"),
            Err(_) => debug!(topic, "Published bus message with no subscribers"),
        }
        Ok(())
    }
}
