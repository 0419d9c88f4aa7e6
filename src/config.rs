use clap::Parser;
use std::time::Duration;

use crate::live_scores::espn::DEFAULT_SCOREBOARD_URL;

/// Live score watcher: polls a scoreboard and publishes score changes
#[derive(Parser, Debug, Clone)]
#[command(name = "scorewatch", version, about)]
pub struct Config {
    /// Team to follow (case-insensitive substring of the display name)
    #[arg(long, env = "TEAM_FILTER", default_value = "Eagles")]
    pub team_filter: String,

    /// Scoreboard feed URL
    #[arg(long, env = "FEED_URL", default_value = DEFAULT_SCOREBOARD_URL)]
    pub feed_url: String,

    /// Pin the scoreboard to a date (YYYYMMDD); defaults to the current week
    #[arg(long, env = "FEED_DATES")]
    pub feed_dates: Option<String>,

    /// Polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "5")]
    pub poll_interval_secs: u64,

    /// Upper bound on a single feed fetch, in milliseconds
    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value = "2000")]
    pub fetch_timeout_ms: u64,

    /// SQLite database path for the score store
    #[arg(long, env = "DATABASE_PATH", default_value = "scores.db")]
    pub database_path: String,

    /// Revisions kept per score key
    #[arg(long, env = "STORE_HISTORY", default_value = "10")]
    pub store_history: u32,

    /// How often the store watcher checks for new mutations, in milliseconds
    #[arg(long, env = "WATCH_POLL_MS", default_value = "250")]
    pub watch_poll_ms: u64,

    /// Topic score-change events are published on
    #[arg(long, env = "UPDATE_TOPIC", default_value = "eagles.updates")]
    pub update_topic: String,

    /// Per-subscriber buffer of the in-process bus
    #[arg(long, env = "BUS_CAPACITY", default_value = "1024")]
    pub bus_capacity: usize,

    /// Listen address for /metrics, /api and /ws endpoints
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:2112")]
    pub http_addr: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.team_filter.trim().is_empty() {
            anyhow::bail!("team_filter must not be empty");
        }
        if self.update_topic.trim().is_empty() {
            anyhow::bail!("update_topic must not be empty");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.fetch_timeout_ms == 0 {
            anyhow::bail!("fetch_timeout_ms must be positive");
        }
        if self.store_history == 0 {
            anyhow::bail!("store_history must be at least 1");
        }
        if self.watch_poll_ms == 0 {
            anyhow::bail!("watch_poll_ms must be positive");
        }
        if self.bus_capacity == 0 {
            anyhow::bail!("bus_capacity must be positive");
        }
        if let Some(dates) = &self.feed_dates {
            if dates.len() != 8 || !dates.chars().all(|c| c.is_ascii_digit()) {
                anyhow::bail!("feed_dates must be YYYYMMDD, got {:?}", dates);
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn watch_poll(&self) -> Duration {
        Duration::from_millis(self.watch_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["scorewatch"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = parse(&[]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.update_topic, "eagles.updates");
    }

    #[test]
    fn test_rejects_zero_interval() {
        let cfg = parse(&["--poll-interval-secs", "0"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_blank_team() {
        let cfg = parse(&["--team-filter", "  "]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_feed_dates_format() {
        assert!(parse(&["--feed-dates", "20250119"]).validate().is_ok());
        assert!(parse(&["--feed-dates", "2025-01-19"]).validate().is_err());
    }
}
