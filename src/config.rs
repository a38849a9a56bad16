use crate::engine::{ChannelAssignments, QuizSettings};
use crate::models::{Category, ChannelId, UnknownCategory};
use std::time::Duration;

pub const DEFAULT_CHANNELS: &str = "1419838438349344829:tld,1419838438349344830:flags";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://quiz_data.db?mode=rwc";
pub const DEFAULT_PLAYER_STATS_URL: &str = "https://api.worldguessr.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("channel entry {0:?} is not of the form <channel_id>:<category>")]
    MalformedChannel(String),
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
    #[error("QUIZ_CHANNELS does not name any channel")]
    NoChannels,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub host: String,
    pub port: u16,
    /// Empty disables persistence; stats are then kept in memory.
    pub database_url: String,
    pub channels: ChannelAssignments,
    pub next_question_delay: Duration,
    pub answer_window: Option<Duration>,
    pub hint_threshold: u32,
    pub player_stats_base_url: String,
    pub player_stats_timeout: Duration,
    pub player_stats_mock: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        let settings = QuizSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            channels: parse_channels(DEFAULT_CHANNELS).unwrap_or_default(),
            next_question_delay: settings.next_question_delay,
            answer_window: settings.answer_window,
            hint_threshold: settings.hint_threshold,
            player_stats_base_url: DEFAULT_PLAYER_STATS_URL.to_string(),
            player_stats_timeout: Duration::from_secs(10),
            player_stats_mock: false,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let defaults = Self::default();

        let channels = match get("QUIZ_CHANNELS").filter(|v| !v.is_empty()) {
            Some(raw) => parse_channels(&raw)?,
            None => defaults.channels,
        };
        let answer_window_secs: u64 = number(&get, "QUIZ_ANSWER_WINDOW_SECS", 60)?;

        Ok(Self {
            host: get("BOT_HOST").filter(|v| !v.is_empty()).unwrap_or(defaults.host),
            port: number(&get, "BOT_PORT", defaults.port)?,
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            channels,
            next_question_delay: Duration::from_millis(number(&get, "QUIZ_NEXT_QUESTION_DELAY_MS", 3000)?),
            answer_window: (answer_window_secs > 0).then(|| Duration::from_secs(answer_window_secs)),
            hint_threshold: number(&get, "QUIZ_HINT_THRESHOLD", defaults.hint_threshold)?.max(1),
            player_stats_base_url: get("PLAYER_STATS_BASE_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.player_stats_base_url),
            player_stats_timeout: Duration::from_secs(number(&get, "PLAYER_STATS_TIMEOUT_SECS", 10)?),
            player_stats_mock: get("PLAYER_STATS_MOCK")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.player_stats_mock),
        })
    }

    pub fn quiz_settings(&self) -> QuizSettings {
        QuizSettings {
            next_question_delay: self.next_question_delay,
            answer_window: self.answer_window,
            hint_threshold: self.hint_threshold,
        }
    }
}

fn number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

pub fn parse_channels(raw: &str) -> Result<ChannelAssignments, ConfigError> {
    let mut assignments = ChannelAssignments::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, category) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::MalformedChannel(entry.to_string()))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(ConfigError::MalformedChannel(entry.to_string()));
        }
        let category: Category = category.parse()?;
        assignments = assignments.assign(ChannelId::new(id), category);
    }
    if assignments.is_empty() {
        return Err(ConfigError::NoChannels);
    }
    Ok(assignments)
}
