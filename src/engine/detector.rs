//! Per-competitor change detection against the score store.

use tracing::{debug, Instrument};

use crate::db::models::{Competition, Competitor, ScoreFingerprint};
use crate::db::{ScoreLookup, ScoreStore, StoreError};

/// Case-insensitive substring match on a team's display name.
#[derive(Debug, Clone)]
pub struct TeamFilter {
    needle: String,
}

impl TeamFilter {
    pub fn new(team: &str) -> Self {
        TeamFilter {
            needle: team.trim().to_lowercase(),
        }
    }

    pub fn matches(&self, display_name: &str) -> bool {
        display_name.to_lowercase().contains(&self.needle)
    }

    pub fn as_str(&self) -> &str {
        &self.needle
    }
}

/// How a fetched score relates to what the store last committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    FirstSeen,
    Unchanged,
    Changed { previous: String },
}

/// A classified competitor, carrying everything the publisher needs.
#[derive(Debug, Clone)]
pub struct Observation {
    pub fingerprint: ScoreFingerprint,
    /// Competition id, published as `game_id`
    pub game_id: String,
    pub team: String,
    pub score: String,
    pub quarter_scores: Vec<i64>,
    pub classification: Classification,
}

/// Competitors of `competition` whose display name passes the filter.
pub fn matching_competitors<'a>(
    competition: &'a Competition,
    filter: &'a TeamFilter,
) -> impl Iterator<Item = &'a Competitor> + 'a {
    competition
        .competitors
        .iter()
        .filter(move |c| filter.matches(&c.team.display_name))
}

/// Look the competitor's fingerprint up and classify its current score.
/// Scores compare as opaque strings.
pub async fn classify(
    store: &dyn ScoreStore,
    competition: &Competition,
    competitor: &Competitor,
) -> Result<Observation, StoreError> {
    let fingerprint = ScoreFingerprint::new(&competition.id, &competitor.team.id);

    let lookup = store
        .get(&fingerprint)
        .instrument(tracing::info_span!("store_get", key = %fingerprint))
        .await;

    let classification = match lookup {
        ScoreLookup::Absent => Classification::FirstSeen,
        ScoreLookup::Found(stored) if stored.score == competitor.score => Classification::Unchanged,
        ScoreLookup::Found(stored) => Classification::Changed {
            previous: stored.score,
        },
        ScoreLookup::Failed(e) => return Err(e),
    };
    debug!(key = %fingerprint, score = %competitor.score, ?classification, "Classified competitor");

    Ok(Observation {
        fingerprint,
        game_id: competition.id.clone(),
        team: competitor.team.display_name.clone(),
        score: competitor.score.clone(),
        quarter_scores: competitor.period_scores(),
        classification,
    })
}
