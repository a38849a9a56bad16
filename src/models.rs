use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Messages starting with one of these are commands, never quiz answers.
pub const COMMAND_PREFIXES: [char; 2] = ['/', '!'];

pub const OPTION_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tld,
    Flags,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Tld, Category::Flags];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tld => "tld",
            Category::Flags => "flags",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Tld => "Country TLD",
            Category::Flags => "Country Flags",
        }
    }

    pub fn question_text(self) -> &'static str {
        match self {
            Category::Tld => "Which country uses this top-level domain?",
            Category::Flags => "Which country does this flag belong to?",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quiz category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tld" => Ok(Category::Tld),
            "flags" | "flag" => Ok(Category::Flags),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub category: Category,
    pub prompt: String,
    pub answer: String,
}

/// Ordered multiple-choice options; position `i` is shown as letter `A + i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet(Vec<String>);

impl OptionSet {
    pub fn new(options: Vec<String>) -> Self {
        Self(options)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn contains(&self, country: &str) -> bool {
        self.0.iter().any(|o| o == country)
    }

    /// Resolves a single letter (`a`..`e`, any case) to the option at that position.
    pub fn resolve_letter(&self, letter: char) -> Option<&str> {
        let upper = letter.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return None;
        }
        self.get((upper as u8 - b'A') as usize)
    }

    pub fn labeled(&self) -> Vec<LabeledOption> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, country)| LabeledOption {
                letter: (b'A' + i as u8) as char,
                country: country.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledOption {
    pub letter: char,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub text: String,
    pub is_command_prefixed: bool,
}

impl InboundMessage {
    pub fn new(channel_id: ChannelId, author_id: UserId, text: impl Into<String>) -> Self {
        let text = text.into();
        let is_command_prefixed = text.trim_start().starts_with(COMMAND_PREFIXES);
        Self {
            channel_id,
            author_id,
            text,
            is_command_prefixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCategoryStat {
    pub user_id: UserId,
    pub category: Category,
    pub correct: i64,
    pub incorrect: i64,
    pub total_attempts: i64,
    pub last_attempt_at: DateTime<Utc>,
}

impl UserCategoryStat {
    pub fn accuracy_pct(&self) -> f64 {
        accuracy_pct(self.correct, self.total_attempts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub correct: i64,
    pub incorrect: i64,
    pub total_attempts: i64,
    pub accuracy: f64,
    pub categories_played: i64,
}

pub fn accuracy_pct(correct: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        (correct as f64 * 1000.0 / total as f64).round() / 10.0
    }
}
