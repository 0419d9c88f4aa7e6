pub mod detector;
pub mod poll;
pub mod publisher;
pub mod watcher;

pub use detector::TeamFilter;
pub use poll::PollLoop;
pub use publisher::{PublishOutcome, Publisher};
pub use watcher::StoreWatcher;

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::models::GameSnapshot;
use crate::db::ScoreStore;
use crate::metrics::{Counter, Metrics};

/// Tally of one snapshot's worth of observations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub observed: usize,
    pub first_seen: usize,
    pub unchanged: usize,
    pub published: usize,
    pub read_failures: usize,
    pub write_failures: usize,
    pub publish_failures: usize,
}

/// Change detector plus publisher, applied to whole snapshots.
pub struct ScoreEngine {
    store: Arc<dyn ScoreStore>,
    publisher: Publisher,
    filter: TeamFilter,
    metrics: Arc<Metrics>,
}

impl ScoreEngine {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        publisher: Publisher,
        filter: TeamFilter,
        metrics: Arc<Metrics>,
    ) -> Self {
        ScoreEngine {
            store,
            publisher,
            filter,
            metrics,
        }
    }

    pub fn filter(&self) -> &TeamFilter {
        &self.filter
    }

    /// Classify and publish every matching competitor in the snapshot. A
    /// failure on one fingerprint never stops the others.
    pub async fn process_snapshot(&self, snapshot: &GameSnapshot) -> CycleReport {
        let mut report = CycleReport::default();

        if snapshot.events.is_empty() {
            warn!("No games found in response");
            return report;
        }
        if !snapshot.has_competitors() {
            warn!("No competitors found in any competition");
            return report;
        }

        for event in &snapshot.events {
            for comp in &event.competitions {
                for competitor in detector::matching_competitors(comp, &self.filter) {
                    report.observed += 1;

                    let obs = match detector::classify(self.store.as_ref(), comp, competitor).await {
                        Ok(obs) => obs,
                        Err(e) => {
                            self.metrics.incr(Counter::StoreGetFailure);
                            report.read_failures += 1;
                            error!(game_id = %comp.id, "Failed to get previous score: {}", e);
                            continue;
                        }
                    };

                    match self.publisher.apply(&obs).await {
                        PublishOutcome::Unchanged => report.unchanged += 1,
                        PublishOutcome::Committed { .. } => report.first_seen += 1,
                        PublishOutcome::Published { .. } => report.published += 1,
                        PublishOutcome::WriteFailed => {
                            report.write_failures += 1;
                            continue;
                        }
                        PublishOutcome::PublishFailed { .. } => report.publish_failures += 1,
                    }

                    info!(
                        game = %event.name,
                        date = %event.date,
                        competition_id = %comp.id,
                        status = %event.status.kind.description,
                        team = %obs.team,
                        score = %obs.score,
                        quarter_scores = ?obs.quarter_scores,
                        "Game details"
                    );
                }
            }
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::bus::BroadcastBus;
    use crate::db::memory::MemoryScoreStore;
    use crate::db::models::{Competition, Competitor, Event, Linescore, Team};

    pub fn competitor(team_id: &str, name: &str, score: &str) -> Competitor {
        Competitor {
            id: team_id.into(),
            team: Team {
                id: team_id.into(),
                display_name: name.into(),
                ..Default::default()
            },
            score: score.into(),
            linescores: vec![Linescore { value: 7.0 }],
            ..Default::default()
        }
    }

    pub fn snapshot(games: &[(&str, Vec<Competitor>)]) -> GameSnapshot {
        GameSnapshot {
            events: games
                .iter()
                .map(|(id, competitors)| Event {
                    id: id.to_string(),
                    name: format!("Game {}", id),
                    competitions: vec![Competition {
                        id: id.to_string(),
                        competitors: competitors.clone(),
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .collect(),
        }
    }

    pub struct Harness {
        pub store: Arc<MemoryScoreStore>,
        pub bus: Arc<BroadcastBus>,
        pub metrics: Arc<Metrics>,
        pub engine: Arc<ScoreEngine>,
    }

    pub fn harness(team: &str) -> Harness {
        let store = Arc::new(MemoryScoreStore::new());
        let bus = Arc::new(BroadcastBus::new(64));
        let metrics = Arc::new(Metrics::new());
        let publisher = Publisher::new(store.clone(), bus.clone(), "eagles.updates", metrics.clone());
        let engine = Arc::new(ScoreEngine::new(
            store.clone(),
            publisher,
            TeamFilter::new(team),
            metrics.clone(),
        ));
        Harness {
            store,
            bus,
            metrics,
            engine,
        }
    }
}
