pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod matcher;
pub mod models;
pub mod player_stats;
pub mod question_bank;
pub mod reports;
pub mod routes;
pub mod session_store;
pub mod state;
pub mod stats;
pub mod ws_protocol;

use std::sync::Arc;

pub async fn build_state(config: config::BotConfig) -> anyhow::Result<state::AppState> {
    let bank = question_bank::QuestionBank::builtin()?;
    for category in models::Category::ALL {
        tracing::info!(category = %category, questions = bank.question_count(category), "question deck loaded");
    }

    let stats: Arc<dyn stats::StatsStore> = if config.database_url.trim().is_empty() {
        tracing::info!("DATABASE_URL is empty, keeping quiz stats in memory");
        Arc::new(stats::InMemoryStatsStore::new())
    } else {
        match stats::SqliteStatsStore::connect(&config.database_url).await {
            Ok(store) => {
                tracing::info!("stats database connected and migrations applied");
                Arc::new(store)
            }
            Err(err) => {
                tracing::warn!(
                    "stats database is unavailable ({}), bot continues with in-memory stats",
                    err
                );
                Arc::new(stats::InMemoryStatsStore::new())
            }
        }
    };

    let players: Arc<dyn player_stats::PlayerStatsClient> = if config.player_stats_mock {
        Arc::new(player_stats::MockPlayerStatsClient)
    } else {
        Arc::new(player_stats::WorldGuessrClient::new(
            &config.player_stats_base_url,
            config.player_stats_timeout,
        )?)
    };

    let gateway = Arc::new(gateway::BroadcastGateway::new());
    let engine = engine::QuizEngine::new(
        bank,
        config.channels.clone(),
        stats.clone(),
        gateway.clone(),
        config.quiz_settings(),
    );

    Ok(state::AppState {
        engine,
        stats,
        gateway,
        players,
    })
}
