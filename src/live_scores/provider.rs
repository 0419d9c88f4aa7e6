use async_trait::async_trait;
use std::time::Duration;

use crate::db::models::GameSnapshot;

/// Why a snapshot could not be produced. Any of these aborts the whole poll
/// cycle.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    BadStatus(u16),
    #[error("failed to decode scoreboard: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Decode failures happen after a successful poll; everything else is a
    /// failed poll.
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode(_))
    }
}

/// Trait that every scoreboard feed must implement.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Return a snapshot of every game currently on the scoreboard.
    async fn fetch_snapshot(&self) -> Result<GameSnapshot, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
