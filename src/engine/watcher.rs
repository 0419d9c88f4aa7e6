//! Audit log of every score store mutation, including ones written by other
//! processes. Runs beside the poll loop and never feeds back into it.

use futures_util::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::db::models::StoreEntry;
use crate::db::{ScoreStore, StoreError};
use crate::metrics::{Counter, Metrics};

pub struct StoreWatcher {
    updates: BoxStream<'static, StoreEntry>,
    metrics: Arc<Metrics>,
}

impl StoreWatcher {
    /// Subscribe now, so no mutation committed after this returns is missed
    /// even if the watcher task starts later.
    pub fn subscribe(store: &dyn ScoreStore, metrics: Arc<Metrics>) -> Result<Self, StoreError> {
        Ok(StoreWatcher {
            updates: store.watch_all()?,
            metrics,
        })
    }

    /// Log mutations until `shutdown` fires. Returns how many were seen.
    pub async fn run(mut self, shutdown: CancellationToken) -> u64 {
        info!("Store watcher started");
        let mut seen = 0u64;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.updates.next() => match next {
                    Some(entry) => {
                        seen += 1;
                        self.metrics.incr(Counter::StoreMutationsObserved);
                        info!(
                            key = %entry.key,
                            value = %entry.value,
                            revision = entry.revision,
                            "Score changed"
                        );
                    }
                    None => {
                        warn!("Store watch stream ended");
                        break;
                    }
                },
            }
        }
        info!(seen, "Store watcher stopped");
        seen
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }
}
