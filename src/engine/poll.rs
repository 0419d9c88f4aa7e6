//! Fixed-interval poll loop: fetch → detect → publish.
//!
//! Cycles run inline on the loop's own task, so they never overlap. A cycle
//! that overruns its period causes the missed ticks to be skipped rather
//! than queued (`MissedTickBehavior::Skip`).

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use super::{CycleReport, ScoreEngine};
use crate::live_scores::{FeedSource, FetchError};
use crate::metrics::{Counter, Metrics};

pub struct PollLoop {
    source: Arc<dyn FeedSource>,
    engine: Arc<ScoreEngine>,
    metrics: Arc<Metrics>,
    interval: Duration,
    fetch_timeout: Duration,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn FeedSource>,
        engine: Arc<ScoreEngine>,
        metrics: Arc<Metrics>,
        interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        PollLoop {
            source,
            engine,
            metrics,
            interval,
            fetch_timeout,
        }
    }

    /// One fetch → classify → publish pass. A fetch failure aborts the
    /// whole cycle before any store access.
    pub async fn run_cycle(&self) -> Result<CycleReport, FetchError> {
        let fetch = tokio::time::timeout(self.fetch_timeout, self.source.fetch_snapshot())
            .instrument(tracing::info_span!("fetch_snapshot", source = %self.source.name()))
            .await;

        let snapshot = match fetch {
            Ok(Ok(snapshot)) => {
                self.metrics.incr(Counter::ApiPollSuccess);
                self.metrics.incr(Counter::ApiDecodeSuccess);
                snapshot
            }
            Ok(Err(e)) => {
                if e.is_decode() {
                    self.metrics.incr(Counter::ApiPollSuccess);
                    self.metrics.incr(Counter::ApiDecodeFailure);
                } else {
                    self.metrics.incr(Counter::ApiPollFailure);
                }
                return Err(e);
            }
            Err(_) => {
                self.metrics.incr(Counter::ApiPollFailure);
                return Err(FetchError::Timeout(self.fetch_timeout));
            }
        };

        Ok(self.engine.process_snapshot(&snapshot).await)
    }

    /// Run until `shutdown` fires. The first cycle starts immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            source = %self.source.name(),
            team = %self.engine.filter().as_str(),
            interval = ?self.interval,
            fetch_timeout = ?self.fetch_timeout,
            "Poll loop started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycle: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            cycle += 1;

            let span = tracing::info_span!("poll_cycle", cycle);
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.run_cycle().instrument(span) => result,
            };

            match result {
                Ok(report) => info!(
                    cycle,
                    observed = report.observed,
                    first_seen = report.first_seen,
                    unchanged = report.unchanged,
                    published = report.published,
                    failures = report.read_failures + report.write_failures + report.publish_failures,
                    "Poll cycle complete"
                ),
                Err(e) => error!(cycle, "Poll cycle aborted: {}", e),
            }
        }

        info!("Poll loop stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
