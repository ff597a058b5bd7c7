use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    common::SessionId,
    configs::Config,
    monitoring::StatsCollector,
    player::PlayerServices,
    protocol::Stats,
    server::session_manager::Session,
};

/// Top-level application state.
pub struct AppState {
    pub sessions: DashMap<SessionId, Arc<Session>>,
    pub config: Arc<Config>,
    /// Shared by every player the node creates.
    pub services: PlayerServices,
    pub stats: StatsCollector,
}

impl AppState {
    pub fn new(services: PlayerServices) -> Self {
        Self {
            sessions: DashMap::new(),
            config: services.config.clone(),
            services,
            stats: StatsCollector::new(),
        }
    }

    pub fn session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn collect_stats(&self) -> Stats {
        self.stats.collect(&self.services.metrics)
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
