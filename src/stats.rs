use crate::error::StatsError;
use crate::models::{accuracy_pct, Category, LeaderboardEntry, UserCategoryStat, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn record_attempt(&self, user: &UserId, category: Category, correct: bool) -> Result<(), StatsError>;

    async fn stats(&self, user: &UserId, category: Category) -> Result<Option<UserCategoryStat>, StatsError>;

    async fn all_stats(&self, user: &UserId) -> Result<Vec<UserCategoryStat>, StatsError>;

    async fn leaderboard(&self, category: Category, limit: u32) -> Result<Vec<LeaderboardEntry>, StatsError>;

    async fn overall_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StatsError>;

    /// 1-based position in the category leaderboard; `None` without attempts.
    async fn rank(&self, user: &UserId, category: Category) -> Result<Option<u32>, StatsError>;

    async fn overall_rank(&self, user: &UserId) -> Result<Option<u32>, StatsError>;
}

fn ahead(a_correct: i64, a_total: i64, b_correct: i64, b_total: i64) -> bool {
    a_correct > b_correct || (a_correct == b_correct && a_correct * b_total > b_correct * a_total)
}

/// Exact ratio comparison; `accuracy` on the entry is rounded for display only.
fn leaderboard_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.correct
        .cmp(&a.correct)
        .then_with(|| (b.correct * a.total_attempts).cmp(&(a.correct * b.total_attempts)))
}

#[derive(sqlx::FromRow)]
struct StatRow {
    user_id: String,
    category: String,
    correct: i64,
    incorrect: i64,
    total_attempts: i64,
    last_attempt_at: DateTime<Utc>,
}

impl TryFrom<StatRow> for UserCategoryStat {
    type Error = StatsError;

    fn try_from(row: StatRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId(row.user_id),
            category: Category::from_str(&row.category)?,
            correct: row.correct,
            incorrect: row.incorrect,
            total_attempts: row.total_attempts,
            last_attempt_at: row.last_attempt_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LeaderboardRow {
    user_id: String,
    correct: i64,
    incorrect: i64,
    total_attempts: i64,
    accuracy: f64,
    categories_played: i64,
}

impl From<LeaderboardRow> for LeaderboardEntry {
    fn from(row: LeaderboardRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            correct: row.correct,
            incorrect: row.incorrect,
            total_attempts: row.total_attempts,
            accuracy: row.accuracy,
            categories_played: row.categories_played,
        }
    }
}

#[derive(Clone)]
pub struct SqliteStatsStore {
    pool: SqlitePool,
}

impl SqliteStatsStore {
    pub async fn connect(database_url: &str) -> Result<Self, StatsError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(5));
        pool_options = if database_url.contains(":memory:") {
            pool_options.max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl StatsStore for SqliteStatsStore {
    async fn record_attempt(&self, user: &UserId, category: Category, correct: bool) -> Result<(), StatsError> {
        let (correct_inc, incorrect_inc) = if correct { (1_i64, 0_i64) } else { (0, 1) };
        sqlx::query(
            "INSERT INTO user_stats (user_id, category, correct, incorrect, total_attempts, last_attempt_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)
             ON CONFLICT (user_id, category) DO UPDATE SET
                 correct = correct + excluded.correct,
                 incorrect = incorrect + excluded.incorrect,
                 total_attempts = total_attempts + 1,
                 last_attempt_at = excluded.last_attempt_at",
        )
        .bind(user.as_str())
        .bind(category.as_str())
        .bind(correct_inc)
        .bind(incorrect_inc)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stats(&self, user: &UserId, category: Category) -> Result<Option<UserCategoryStat>, StatsError> {
        let row = sqlx::query_as::<_, StatRow>(
            "SELECT user_id, category, correct, incorrect, total_attempts, last_attempt_at
             FROM user_stats WHERE user_id = ?1 AND category = ?2",
        )
        .bind(user.as_str())
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserCategoryStat::try_from).transpose()
    }

    async fn all_stats(&self, user: &UserId) -> Result<Vec<UserCategoryStat>, StatsError> {
        let rows = sqlx::query_as::<_, StatRow>(
            "SELECT user_id, category, correct, incorrect, total_attempts, last_attempt_at
             FROM user_stats WHERE user_id = ?1 ORDER BY category",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UserCategoryStat::try_from).collect()
    }

    async fn leaderboard(&self, category: Category, limit: u32) -> Result<Vec<LeaderboardEntry>, StatsError> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT user_id, correct, incorrect, total_attempts,
                    ROUND(correct * 100.0 / total_attempts, 1) AS accuracy,
                    1 AS categories_played
             FROM user_stats
             WHERE category = ?1 AND total_attempts > 0
             ORDER BY correct DESC, CAST(correct AS REAL) / total_attempts DESC, user_id
             LIMIT ?2",
        )
        .bind(category.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LeaderboardEntry::from).collect())
    }

    async fn overall_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StatsError> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT user_id,
                    SUM(correct) AS correct,
                    SUM(incorrect) AS incorrect,
                    SUM(total_attempts) AS total_attempts,
                    ROUND(SUM(correct) * 100.0 / SUM(total_attempts), 1) AS accuracy,
                    COUNT(DISTINCT category) AS categories_played
             FROM user_stats
             WHERE total_attempts > 0
             GROUP BY user_id
             ORDER BY SUM(correct) DESC, CAST(SUM(correct) AS REAL) / SUM(total_attempts) DESC, user_id
             LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LeaderboardEntry::from).collect())
    }

    async fn rank(&self, user: &UserId, category: Category) -> Result<Option<u32>, StatsError> {
        let Some(me) = self.stats(user, category).await? else {
            return Ok(None);
        };
        if me.total_attempts == 0 {
            return Ok(None);
        }
        let ahead: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_stats
             WHERE category = ?1 AND total_attempts > 0
               AND (correct > ?2 OR (correct = ?2 AND correct * ?3 > ?2 * total_attempts))",
        )
        .bind(category.as_str())
        .bind(me.correct)
        .bind(me.total_attempts)
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(ahead as u32 + 1))
    }

    async fn overall_rank(&self, user: &UserId) -> Result<Option<u32>, StatsError> {
        let mine = self.all_stats(user).await?;
        let correct: i64 = mine.iter().map(|s| s.correct).sum();
        let total: i64 = mine.iter().map(|s| s.total_attempts).sum();
        if total == 0 {
            return Ok(None);
        }
        let ahead: i64 = sqlx::query_scalar(
            "WITH totals AS (
                 SELECT user_id, SUM(correct) AS correct, SUM(total_attempts) AS attempts
                 FROM user_stats WHERE total_attempts > 0 GROUP BY user_id
             )
             SELECT COUNT(*) FROM totals
             WHERE correct > ?1 OR (correct = ?1 AND correct * ?2 > ?1 * attempts)",
        )
        .bind(correct)
        .bind(total)
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(ahead as u32 + 1))
    }
}

#[derive(Default)]
pub struct InMemoryStatsStore {
    rows: DashMap<(UserId, Category), UserCategoryStat>,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn overall_totals(&self) -> HashMap<UserId, LeaderboardEntry> {
        let mut totals: HashMap<UserId, LeaderboardEntry> = HashMap::new();
        for row in self.rows.iter().filter(|r| r.total_attempts > 0) {
            let entry = totals.entry(row.user_id.clone()).or_insert_with(|| LeaderboardEntry {
                user_id: row.user_id.clone(),
                correct: 0,
                incorrect: 0,
                total_attempts: 0,
                accuracy: 0.0,
                categories_played: 0,
            });
            entry.correct += row.correct;
            entry.incorrect += row.incorrect;
            entry.total_attempts += row.total_attempts;
            entry.categories_played += 1;
        }
        for entry in totals.values_mut() {
            entry.accuracy = accuracy_pct(entry.correct, entry.total_attempts);
        }
        totals
    }
}

fn ranked(mut entries: Vec<LeaderboardEntry>, limit: u32) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| leaderboard_order(a, b).then_with(|| a.user_id.cmp(&b.user_id)));
    entries.truncate(limit as usize);
    entries
}

#[async_trait]
impl StatsStore for InMemoryStatsStore {
    async fn record_attempt(&self, user: &UserId, category: Category, correct: bool) -> Result<(), StatsError> {
        let mut row = self
            .rows
            .entry((user.clone(), category))
            .or_insert_with(|| UserCategoryStat {
                user_id: user.clone(),
                category,
                correct: 0,
                incorrect: 0,
                total_attempts: 0,
                last_attempt_at: Utc::now(),
            });
        if correct {
            row.correct += 1;
        } else {
            row.incorrect += 1;
        }
        row.total_attempts += 1;
        row.last_attempt_at = Utc::now();
        Ok(())
    }

    async fn stats(&self, user: &UserId, category: Category) -> Result<Option<UserCategoryStat>, StatsError> {
        Ok(self.rows.get(&(user.clone(), category)).map(|r| r.clone()))
    }

    async fn all_stats(&self, user: &UserId) -> Result<Vec<UserCategoryStat>, StatsError> {
        let mut rows: Vec<UserCategoryStat> = self
            .rows
            .iter()
            .filter(|r| r.user_id == *user)
            .map(|r| r.clone())
            .collect();
        rows.sort_by_key(|r| r.category.as_str());
        Ok(rows)
    }

    async fn leaderboard(&self, category: Category, limit: u32) -> Result<Vec<LeaderboardEntry>, StatsError> {
        let entries = self
            .rows
            .iter()
            .filter(|r| r.category == category && r.total_attempts > 0)
            .map(|r| LeaderboardEntry {
                user_id: r.user_id.clone(),
                correct: r.correct,
                incorrect: r.incorrect,
                total_attempts: r.total_attempts,
                accuracy: r.accuracy_pct(),
                categories_played: 1,
            })
            .collect();
        Ok(ranked(entries, limit))
    }

    async fn overall_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StatsError> {
        Ok(ranked(self.overall_totals().into_values().collect(), limit))
    }

    async fn rank(&self, user: &UserId, category: Category) -> Result<Option<u32>, StatsError> {
        let Some(me) = self.stats(user, category).await? else {
            return Ok(None);
        };
        if me.total_attempts == 0 {
            return Ok(None);
        }
        let ahead_count = self
            .rows
            .iter()
            .filter(|r| r.category == category && r.total_attempts > 0)
            .filter(|r| ahead(r.correct, r.total_attempts, me.correct, me.total_attempts))
            .count();
        Ok(Some(ahead_count as u32 + 1))
    }

    async fn overall_rank(&self, user: &UserId) -> Result<Option<u32>, StatsError> {
        let totals = self.overall_totals();
        let Some(me) = totals.get(user) else {
            return Ok(None);
        };
        let ahead_count = totals
            .values()
            .filter(|o| ahead(o.correct, o.total_attempts, me.correct, me.total_attempts))
            .count();
        Ok(Some(ahead_count as u32 + 1))
    }
}
