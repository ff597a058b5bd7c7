use serde::Serialize;

use crate::{
    common::{GuildId, PlaybackError, SessionId, Severity},
    player::PlayerState,
    protocol::{stats::Stats, tracks::Track},
};

/// Messages sent from the node to the control client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutgoingMessage {
    Ready {
        resumed: bool,
        session_id: SessionId,
    },
    PlayerUpdate {
        guild_id: GuildId,
        state: PlayerState,
    },
    Stats {
        #[serde(flatten)]
        stats: Stats,
    },
    Event {
        #[serde(flatten)]
        event: NodeEvent,
    },
}

/// Player lifecycle events, sent as `{"op":"event","type":...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum NodeEvent {
    #[serde(rename = "TrackStartEvent")]
    TrackStart { guild_id: GuildId, track: Track },

    #[serde(rename = "TrackEndEvent")]
    TrackEnd {
        guild_id: GuildId,
        track: Track,
        reason: TrackEndReason,
    },

    #[serde(rename = "TrackExceptionEvent")]
    TrackException {
        guild_id: GuildId,
        track: Track,
        exception: TrackException,
    },

    #[serde(rename = "WebSocketClosedEvent")]
    WebSocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
        by_remote: bool,
    },
}

impl NodeEvent {
    pub fn guild_id(&self) -> &GuildId {
        match self {
            Self::TrackStart { guild_id, .. }
            | Self::TrackEnd { guild_id, .. }
            | Self::TrackException { guild_id, .. }
            | Self::WebSocketClosed { guild_id, .. } => guild_id,
        }
    }
}

impl From<NodeEvent> for OutgoingMessage {
    fn from(event: NodeEvent) -> Self {
        Self::Event { event }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackException {
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
}

impl From<&PlaybackError> for TrackException {
    fn from(err: &PlaybackError) -> Self {
        Self {
            message: Some(err.to_string()),
            severity: err.severity(),
            cause: err.cause(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tracks::TrackInfo;

    fn track() -> Track {
        Track::new(TrackInfo {
            identifier: "x".into(),
            title: "X".into(),
            source_name: "http".into(),
            ..Default::default()
        })
    }

    #[test]
    fn track_end_envelope_is_flat() {
        let msg: OutgoingMessage = NodeEvent::TrackEnd {
            guild_id: "G1".into(),
            track: track(),
            reason: TrackEndReason::LoadFailed,
        }
        .into();

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["op"], "event");
        assert_eq!(json["type"], "TrackEndEvent");
        assert_eq!(json["guildId"], "G1");
        assert_eq!(json["reason"], "loadFailed");
        assert_eq!(json["track"]["info"]["identifier"], "x");
    }

    #[test]
    fn websocket_closed_uses_camel_case_fields() {
        let msg: OutgoingMessage = NodeEvent::WebSocketClosed {
            guild_id: "G1".into(),
            code: 4014,
            reason: "Disconnected".into(),
            by_remote: true,
        }
        .into();

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "WebSocketClosedEvent");
        assert_eq!(json["code"], 4014);
        assert_eq!(json["byRemote"], true);
    }

    #[test]
    fn player_update_carries_guild_and_state() {
        let msg = OutgoingMessage::PlayerUpdate {
            guild_id: "G1".into(),
            state: PlayerState {
                time: 1,
                position: 2000,
                connected: true,
                ping: 12,
            },
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["op"], "playerUpdate");
        assert_eq!(json["guildId"], "G1");
        assert_eq!(json["state"]["position"], 2000);
    }

    #[test]
    fn exception_is_built_from_playback_error() {
        let exception = TrackException::from(&PlaybackError::ConnectTimeout(15000));
        assert_eq!(exception.severity, Severity::Common);
        assert_eq!(
            exception.message.as_deref(),
            Some("voice connection was not ready within 15000 ms")
        );
    }
}
