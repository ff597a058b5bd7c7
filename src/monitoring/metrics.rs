use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

/// Process-wide player gauges.
///
/// `players` follows player setup and destroy, `playing_players` follows
/// genuine track starts and the end of their playback bookkeeping.
#[derive(Clone)]
pub struct PlayerMetrics {
    registry: Registry,
    players: IntGauge,
    playing_players: IntGauge,
}

impl PlayerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let players = IntGauge::new("resonode_players", "Players set up on this node")?;
        let playing_players = IntGauge::new(
            "resonode_playing_players",
            "Players currently playing a track",
        )?;
        registry.register(Box::new(players.clone()))?;
        registry.register(Box::new(playing_players.clone()))?;

        Ok(Self {
            registry,
            players,
            playing_players,
        })
    }

    pub fn player_created(&self) {
        self.players.inc();
    }

    pub fn player_destroyed(&self) {
        self.players.dec();
    }

    pub fn playback_started(&self) {
        self.playing_players.inc();
    }

    pub fn playback_stopped(&self) {
        self.playing_players.dec();
    }

    pub fn players(&self) -> i64 {
        self.players.get()
    }

    pub fn playing_players(&self) -> i64 {
        self.playing_players.get()
    }

    /// Prometheus text exposition of every gauge.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
