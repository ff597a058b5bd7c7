use std::{
    collections::VecDeque,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{
    handle::{PlayerCommand, PlayerRegistry},
    state::{Player, PlayerState},
};
use crate::{
    audio::FilterPipeline,
    common::{GuildId, UserId},
    configs::Config,
    monitoring::PlayerMetrics,
    protocol::{NodeEvent, OutgoingMessage},
    server::now_ms,
    sources::ResourceResolver,
    voice::{VoiceConnector, VoiceEvent, VoiceSession},
};

/// Milliseconds of audio per transport packet.
pub const FRAME_MS: u64 = 20;

/// Collaborators shared by every player of the node.
#[derive(Clone)]
pub struct PlayerServices {
    pub resolver: Arc<dyn ResourceResolver>,
    pub pipeline: Arc<dyn FilterPipeline>,
    pub connector: Arc<dyn VoiceConnector>,
    pub metrics: PlayerMetrics,
    pub config: Arc<Config>,
}

/// Private playback bookkeeping, never exposed to the client.
#[derive(Debug)]
pub struct PlaybackCache {
    /// Source of the current track, reused when filters change.
    pub url: Option<String>,
    pub protocol: Option<String>,
    pub additional_data: serde_json::Value,
    pub started_at: Option<u64>,
    pub transcoder: Option<u32>,
    /// Volume set while nothing was playing, applied to the next track.
    pub volume: i32,
    /// Resource the transport is playing for the current track. Transport
    /// events about any other resource are stale.
    pub resource_id: Option<u64>,
    /// TrackStart was emitted for the current track.
    pub track_started: bool,
    /// The playing gauge was incremented for the current track.
    pub counted_playing: bool,
    /// Track position at which the current resource starts.
    pub position_offset: Arc<AtomicU64>,
}

impl Default for PlaybackCache {
    fn default() -> Self {
        Self {
            url: None,
            protocol: None,
            additional_data: serde_json::json!({}),
            started_at: None,
            transcoder: None,
            volume: 100,
            resource_id: None,
            track_started: false,
            counted_playing: false,
            position_offset: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Playback state machine of one guild. Only ever touched by its actor
/// task, so every operation runs to completion before the next starts.
pub struct PlayerContext {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub config: Player,
    pub cache: PlaybackCache,
    pub voice: Option<Arc<dyn VoiceSession>>,
    pub voice_events: Option<mpsc::UnboundedReceiver<VoiceEvent>>,
    pub services: PlayerServices,
    pub telemetry: Option<JoinHandle<()>>,
    pub cancel: CancellationToken,
    pub(super) id: u64,
    pub(super) events: flume::Sender<OutgoingMessage>,
    pub(super) commands: flume::Receiver<PlayerCommand>,
    /// Commands received while waiting for the voice connection.
    pub(super) deferred: VecDeque<PlayerCommand>,
    pub(super) registry: Weak<PlayerRegistry>,
}

impl PlayerContext {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: u64,
        guild_id: GuildId,
        user_id: UserId,
        services: PlayerServices,
        events: flume::Sender<OutgoingMessage>,
        commands: flume::Receiver<PlayerCommand>,
        registry: Weak<PlayerRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config: Player::new(guild_id.clone()),
            guild_id,
            user_id,
            cache: PlaybackCache::default(),
            voice: None,
            voice_events: None,
            services,
            telemetry: None,
            cancel,
            id,
            events,
            commands,
            deferred: VecDeque::new(),
            registry,
        }
    }

    /// Joins a voice session and counts the player.
    pub fn setup(&mut self) {
        self.services.metrics.player_created();
        self.join_voice();
    }

    pub fn join_voice(&mut self) {
        let link = self.services.connector.join(&self.guild_id, self.user_id);
        self.voice = Some(link.session);
        self.voice_events = Some(link.events);
        debug!("[{}] joined voice session", self.guild_id);
    }

    /// Tears the transport handle down. Its pending events are dropped.
    pub fn release_voice(&mut self) {
        if let Some(voice) = self.voice.take() {
            voice.destroy();
        }
        self.voice_events = None;
    }

    pub fn emit(&self, event: NodeEvent) {
        if self.events.send(OutgoingMessage::from(event)).is_err() {
            trace!("[{}] control channel closed, event dropped", self.guild_id);
        }
    }

    /// Runs `fut` unless the player is destroyed first.
    pub async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Position derived from frames the transport delivered.
    pub fn real_time_position(&self) -> u64 {
        match &self.voice {
            Some(voice) if voice.player_status().has_stream() => {
                self.cache.position_offset.load(Ordering::Relaxed)
                    + voice.packets_sent() * FRAME_MS
            }
            _ => 0,
        }
    }

    /// Current telemetry, present only while a track is playing or paused.
    pub fn player_state(&self) -> Option<PlayerState> {
        self.config.track.as_ref()?;
        let voice = self.voice.as_ref()?;
        if !voice.player_status().has_stream() {
            return None;
        }

        Some(PlayerState {
            time: now_ms(),
            position: self.real_time_position(),
            connected: voice.status().is_connected(),
            ping: voice.ping(),
        })
    }

    pub fn snapshot(&self) -> Player {
        Player {
            state: self.player_state(),
            ..self.config.clone()
        }
    }

    /// Ends playback bookkeeping: telemetry and the playing gauge.
    pub fn stop_track(&mut self) {
        if let Some(task) = self.telemetry.take() {
            task.abort();
        }
        if self.cache.counted_playing {
            self.cache.counted_playing = false;
            self.services.metrics.playback_stopped();
        }
    }

    /// Stops whatever the transport is playing and forgets its resource.
    pub fn abandon_stream(&mut self) {
        if let Some(voice) = &self.voice {
            if voice.has_stream() {
                voice.stop();
            }
        }
        self.cache.resource_id = None;
    }

    /// Final cleanup after destroy.
    pub(super) fn teardown(&mut self) {
        self.release_voice();
        self.stop_track();
        self.services.metrics.player_destroyed();

        if let Some(registry) = self.registry.upgrade() {
            let id = self.id;
            registry.remove_if(&self.guild_id, |_, handle| handle.id() == id);
        }
        debug!("[{}] player destroyed", self.guild_id);
    }
}
