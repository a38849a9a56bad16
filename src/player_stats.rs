use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PlayerLookupError {
    #[error("player {0} not found")]
    NotFound(String),
    #[error("player stats request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("player stats service answered {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub elo: i64,
    pub rank: i64,
    pub league: League,
    pub win_rate: f64,
    pub duels_wins: i64,
    pub duels_losses: i64,
    pub duels_tied: i64,
}

/// The service reports unknown players with a `message` body instead of a profile.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EloRankBody {
    Missing { message: String },
    Found(PlayerRating),
}

pub trait PlayerStatsClient: Send + Sync {
    fn lookup(&self, username: &str) -> BoxFuture<'static, Result<PlayerRating, PlayerLookupError>>;
}

#[derive(Clone)]
pub struct MockPlayerStatsClient;

impl PlayerStatsClient for MockPlayerStatsClient {
    fn lookup(&self, username: &str) -> BoxFuture<'static, Result<PlayerRating, PlayerLookupError>> {
        let username = username.trim().to_string();
        Box::pin(async move {
            if username.is_empty() || username.eq_ignore_ascii_case("nobody") {
                return Err(PlayerLookupError::NotFound(username));
            }
            let seed = username.bytes().map(i64::from).sum::<i64>();
            Ok(PlayerRating {
                elo: 1000 + seed % 1000,
                rank: 1 + seed % 5000,
                league: League {
                    name: "Trekker".into(),
                    emoji: "🥾".into(),
                    color: "#a0522d".into(),
                },
                win_rate: 0.5,
                duels_wins: seed % 50,
                duels_losses: seed % 40,
                duels_tied: seed % 3,
            })
        })
    }
}

#[derive(Clone)]
pub struct WorldGuessrClient {
    pub base_url: String,
    http: reqwest::Client,
}

impl WorldGuessrClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PlayerLookupError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl PlayerStatsClient for WorldGuessrClient {
    fn lookup(&self, username: &str) -> BoxFuture<'static, Result<PlayerRating, PlayerLookupError>> {
        let url = format!("{}/api/eloRank", self.base_url);
        let http = self.http.clone();
        let username = username.trim().to_string();
        Box::pin(async move {
            let response = http
                .get(&url)
                .query(&[("username", username.as_str())])
                .send()
                .await?;
            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(PlayerLookupError::NotFound(username));
            }
            if !status.is_success() {
                return Err(PlayerLookupError::Status(status.as_u16()));
            }
            match response.json::<EloRankBody>().await? {
                EloRankBody::Found(rating) => Ok(rating),
                EloRankBody::Missing { message } => {
                    tracing::debug!("player lookup for {} returned: {}", username, message);
                    Err(PlayerLookupError::NotFound(username))
                }
            }
        })
    }
}
