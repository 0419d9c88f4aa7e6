use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One fetch cycle's view of the upstream scoreboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameSnapshot {
    #[serde(default)]
    pub events: Vec<Event>,
}

impl GameSnapshot {
    /// True when at least one competition lists a competitor.
    pub fn has_competitors(&self) -> bool {
        self.events
            .iter()
            .flat_map(|ev| &ev.competitions)
            .any(|comp| !comp.competitors.is_empty())
    }
}

/// A scheduled or in-progress game as reported by the feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub date: String,
    /// e.g. "Green Bay Packers at Philadelphia Eagles"
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub competitions: Vec<Competition>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Competition {
    /// Stable for the life of the game; first half of the fingerprint
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub competitors: Vec<Competitor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    #[serde(default)]
    pub id: String,
    /// "home" | "away"
    #[serde(default)]
    pub home_away: String,
    #[serde(default)]
    pub team: Team,
    /// Upstream formatting is preserved; never parsed for comparison
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub linescores: Vec<Linescore>,
}

impl Competitor {
    /// Per-period scores as integers, index-aligned with `linescores`.
    pub fn period_scores(&self) -> Vec<i64> {
        self.linescores.iter().map(|l| l.value as i64).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Linescore {
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub clock: f64,
    #[serde(default)]
    pub display_clock: String,
    #[serde(default)]
    pub period: i32,
    #[serde(default, rename = "type")]
    pub kind: StatusType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusType {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// "pre" | "in" | "post"
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub description: String,
}

/// Store key identifying one team's participation in one competition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreFingerprint(String);

impl ScoreFingerprint {
    pub fn new(competition_id: &str, team_id: &str) -> Self {
        ScoreFingerprint(format!("{}-{}", competition_id, team_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ScoreFingerprint {
    fn from(key: String) -> Self {
        ScoreFingerprint(key)
    }
}

impl fmt::Display for ScoreFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last committed value for a fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredScore {
    pub score: String,
    /// Store-wide revision assigned by the write that produced this value
    pub revision: u64,
}

/// A single store mutation, as delivered to watchers and history readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub key: ScoreFingerprint,
    pub value: String,
    pub revision: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Payload published on the update topic for every detected transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChangeEvent {
    pub game_id: String,
    pub score: String,
    pub quarter_scores: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOREBOARD: &str = r#"{
        "events": [{
            "id": "401671889",
            "date": "2025-01-19T20:00Z",
            "name": "Los Angeles Rams at Philadelphia Eagles",
            "shortName": "LAR @ PHI",
            "status": {
                "clock": 0.0,
                "displayClock": "0:00",
                "period": 4,
                "type": {"id": "3", "name": "STATUS_FINAL", "state": "post", "completed": true, "description": "Final"}
            },
            "competitions": [{
                "id": "401671889",
                "date": "2025-01-19T20:00Z",
                "attendance": 69879,
                "competitors": [
                    {
                        "id": "21", "homeAway": "home", "winner": true,
                        "team": {"id": "21", "location": "Philadelphia", "name": "Eagles", "abbreviation": "PHI", "displayName": "Philadelphia Eagles"},
                        "score": "28",
                        "linescores": [{"value": 7.0}, {"value": 6.0}, {"value": 0.0}, {"value": 15.0}]
                    },
                    {
                        "id": "14", "homeAway": "away",
                        "team": {"id": "14", "displayName": "Los Angeles Rams"},
                        "score": "22"
                    }
                ]
            }]
        }]
    }"#;

    #[test]
    fn test_decode_scoreboard() {
        let snap: GameSnapshot = serde_json::from_str(SCOREBOARD).unwrap();
        assert_eq!(snap.events.len(), 1);
        let ev = &snap.events[0];
        assert_eq!(ev.short_name, "LAR @ PHI");
        assert_eq!(ev.status.kind.description, "Final");
        assert!(ev.status.kind.completed);

        let comp = &ev.competitions[0];
        assert_eq!(comp.competitors.len(), 2);
        assert_eq!(comp.competitors[0].team.display_name, "Philadelphia Eagles");
        assert_eq!(comp.competitors[0].period_scores(), vec![7, 6, 0, 15]);
        assert!(comp.competitors[1].linescores.is_empty());
        assert!(snap.has_competitors());
    }

    #[test]
    fn test_empty_payload_decodes_to_empty_snapshot() {
        let snap: GameSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snap.events.is_empty());
        assert!(!snap.has_competitors());
    }

    #[test]
    fn test_competitions_without_competitors() {
        let snap = GameSnapshot {
            events: vec![Event {
                competitions: vec![Competition::default()],
                ..Default::default()
            }],
        };
        assert!(!snap.has_competitors());
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = ScoreFingerprint::new("401671889", "21");
        assert_eq!(fp.as_str(), "401671889-21");
        assert_eq!(fp.to_string(), "401671889-21");
    }

    #[test]
    fn test_change_event_wire_format() {
        let ev = ScoreChangeEvent {
            game_id: "401671889".into(),
            score: "14".into(),
            quarter_scores: vec![7, 7],
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"game_id": "401671889", "score": "14", "quarter_scores": [7, 7]})
        );
    }
}
