use crate::gateway::{display_name_or_fallback, ChatGateway};
use crate::models::{accuracy_pct, Category, LeaderboardEntry, UserCategoryStat, UserId};
use crate::player_stats::{League, PlayerRating};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardScope {
    Overall,
    Category(Category),
}

impl LeaderboardScope {
    pub fn title(self) -> String {
        match self {
            LeaderboardScope::Overall => "Overall Quiz Leaderboard".to_string(),
            LeaderboardScope::Category(category) => format!("{} Leaderboard", category.display_name()),
        }
    }
}

impl FromStr for LeaderboardScope {
    type Err = crate::models::UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("overall") {
            Ok(LeaderboardScope::Overall)
        } else {
            s.parse().map(LeaderboardScope::Category)
        }
    }
}

/// Medal for the top three (0-based position), `#n` below.
pub fn medal(position: usize) -> String {
    MEDALS
        .get(position)
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("#{}", position + 1))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatsReport {
    pub category: Category,
    pub category_name: &'static str,
    pub correct: i64,
    pub incorrect: i64,
    pub total_attempts: i64,
    pub accuracy: f64,
    pub last_attempt_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl CategoryStatsReport {
    pub fn new(stat: &UserCategoryStat, rank: Option<u32>) -> Self {
        Self {
            category: stat.category,
            category_name: stat.category.display_name(),
            correct: stat.correct,
            incorrect: stat.incorrect,
            total_attempts: stat.total_attempts,
            accuracy: stat.accuracy_pct(),
            last_attempt_at: stat.last_attempt_at,
            rank,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub correct: i64,
    pub incorrect: i64,
    pub total_attempts: i64,
    pub accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub user_id: UserId,
    pub display_name: String,
    pub categories: Vec<CategoryStatsReport>,
    /// Only present when the user played more than one category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallStats>,
}

impl StatsReport {
    pub fn new(user_id: UserId, display_name: String, categories: Vec<CategoryStatsReport>, overall_rank: Option<u32>) -> Self {
        let overall = (categories.len() > 1).then(|| {
            let correct = categories.iter().map(|c| c.correct).sum();
            let incorrect = categories.iter().map(|c| c.incorrect).sum();
            let total_attempts = categories.iter().map(|c| c.total_attempts).sum();
            OverallStats {
                correct,
                incorrect,
                total_attempts,
                accuracy: accuracy_pct(correct, total_attempts),
                rank: overall_rank,
            }
        });
        Self {
            user_id,
            display_name,
            categories,
            overall,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardLine {
    pub position: usize,
    pub medal: String,
    pub user_id: UserId,
    pub display_name: String,
    pub correct: i64,
    pub incorrect: i64,
    pub accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_played: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardReport {
    pub title: String,
    pub description: String,
    pub lines: Vec<LeaderboardLine>,
}

pub async fn leaderboard_report(
    scope: LeaderboardScope,
    entries: Vec<LeaderboardEntry>,
    gateway: &dyn ChatGateway,
) -> LeaderboardReport {
    let mut lines = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let display_name = display_name_or_fallback(gateway, &entry.user_id).await;
        lines.push(LeaderboardLine {
            position: i + 1,
            medal: medal(i),
            user_id: entry.user_id,
            display_name,
            correct: entry.correct,
            incorrect: entry.incorrect,
            accuracy: entry.accuracy,
            categories_played: matches!(scope, LeaderboardScope::Overall).then_some(entry.categories_played),
        });
    }
    LeaderboardReport {
        title: scope.title(),
        description: format!("Top {} players by correct answers", lines.len()),
        lines,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelRecord {
    pub wins: i64,
    pub losses: i64,
    pub ties: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReport {
    pub username: String,
    pub elo: i64,
    pub global_rank: i64,
    pub league: League,
    pub win_rate: f64,
    pub duels: DuelRecord,
}

impl PlayerReport {
    pub fn new(username: &str, rating: PlayerRating) -> Self {
        Self {
            username: username.to_string(),
            elo: rating.elo,
            global_rank: rating.rank,
            league: rating.league,
            win_rate: (rating.win_rate * 1000.0).round() / 10.0,
            duels: DuelRecord {
                wins: rating.duels_wins,
                losses: rating.duels_losses,
                ties: rating.duels_tied,
            },
        }
    }
}
