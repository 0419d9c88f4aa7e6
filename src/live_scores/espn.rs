use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::provider::{FeedSource, FetchError};
use crate::db::models::GameSnapshot;

pub const DEFAULT_SCOREBOARD_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard";

/// Scoreboard feed backed by ESPN's public site API.
pub struct EspnScoreboard {
    http: Client,
    url: Url,
}

impl EspnScoreboard {
    /// `dates` pins the scoreboard to a day (`YYYYMMDD`); without it ESPN
    /// serves the current week.
    pub fn new(feed_url: &str, dates: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        let mut url = Url::parse(feed_url).with_context(|| format!("Invalid feed URL {}", feed_url))?;
        if let Some(dates) = dates {
            url.query_pairs_mut().append_pair("dates", dates);
        }
        Ok(EspnScoreboard { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl FeedSource for EspnScoreboard {
    fn name(&self) -> &str {
        "ESPN"
    }

    async fn fetch_snapshot(&self) -> Result<GameSnapshot, FetchError> {
        debug!("Fetching scoreboard from {}", self.url);

        let resp = self.http.get(self.url.clone()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let body = resp.bytes().await?;
        parse_scoreboard(&body)
    }
}

pub fn parse_scoreboard(body: &[u8]) -> Result<GameSnapshot, FetchError> {
    Ok(serde_json::from_slice(body)?)
}
