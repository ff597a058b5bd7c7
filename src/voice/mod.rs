//! Seam between the playback state machine and the voice transport.
//!
//! The transport owns the wire protocol. The player only sees a
//! [`VoiceSession`] handle plus a stream of [`VoiceEvent`]s, and reads the
//! connection state through a watch channel so it can wait for
//! connectivity without consuming events.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::{
    audio::AudioResource,
    common::{GuildId, UserId},
};

pub mod close_codes;
pub mod dry;

pub use dry::{DryConnector, DrySession};

/// Connectivity of the voice transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    /// Created, not asked to connect yet.
    Idle,
    Connecting,
    Connected,
    Disconnected { code: u16, reason: String },
}

impl TransportStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }

    /// Connecting or connected: no new connect attempt is needed.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
}

impl PlayerStatus {
    /// Playing or paused: a stream is loaded and frames count towards position.
    pub fn has_stream(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Why the transport's player changed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReason {
    /// `play()` was called with a new resource.
    Requested,
    /// The resource reached its end.
    Finished,
    Stopped,
    /// A newer resource took over.
    Replaced,
    Paused,
    Unpaused,
    Errored,
}

/// One side of a player status change. `resource` is the id of the
/// [`AudioResource`] the status refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerTransition {
    pub status: PlayerStatus,
    pub reason: StatusReason,
    pub resource: Option<u64>,
}

impl PlayerTransition {
    pub const IDLE: Self = Self {
        status: PlayerStatus::Idle,
        reason: StatusReason::Stopped,
        resource: None,
    };

    pub fn new(status: PlayerStatus, reason: StatusReason, resource: Option<u64>) -> Self {
        Self {
            status,
            reason,
            resource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    SpeakStart {
        user_id: UserId,
        ssrc: u32,
    },
    StateChange {
        old: TransportStatus,
        new: TransportStatus,
    },
    PlayerStateChange {
        old: PlayerTransition,
        new: PlayerTransition,
    },
    /// The stream of `resource` failed mid-playback.
    Error {
        resource: Option<u64>,
        message: String,
    },
}

/// Per-guild handle to the voice transport. Never blocks; outcomes surface
/// as [`VoiceEvent`]s.
pub trait VoiceSession: Send + Sync {
    fn voice_state_update(&self, session_id: &str);
    fn voice_server_update(&self, token: &str, endpoint: &str);
    fn connect(&self);

    fn status(&self) -> TransportStatus;
    fn watch_status(&self) -> watch::Receiver<TransportStatus>;
    fn player_status(&self) -> PlayerStatus;
    /// Whether an audio stream is currently loaded.
    fn has_stream(&self) -> bool;

    fn play(&self, resource: AudioResource);
    fn pause(&self);
    fn unpause(&self);
    fn stop(&self);
    /// Volume of the current stream, 1.0 = unchanged.
    fn set_volume(&self, volume: f32);

    /// 20 ms frames delivered for the current stream.
    fn packets_sent(&self) -> u64;
    /// Round-trip estimate in ms, -1 when unknown.
    fn ping(&self) -> i64;
    fn destroy(&self);
}

/// A joined voice session and its event stream.
pub struct VoiceLink {
    pub session: Arc<dyn VoiceSession>,
    pub events: mpsc::UnboundedReceiver<VoiceEvent>,
}

/// Creates voice sessions for guilds.
pub trait VoiceConnector: Send + Sync {
    fn join(&self, guild_id: &GuildId, user_id: UserId) -> VoiceLink;
}
