use crate::engine::QuizEngine;
use crate::gateway::BroadcastGateway;
use crate::player_stats::PlayerStatsClient;
use crate::stats::StatsStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: QuizEngine,
    pub stats: Arc<dyn StatsStore>,
    pub gateway: Arc<BroadcastGateway>,
    pub players: Arc<dyn PlayerStatsClient>,
}
