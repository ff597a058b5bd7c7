use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    common::GuildId,
    player::{Filters, VoiceState},
    protocol::tracks::Track,
    server::{AppState, Session},
};

/// Credentials half of a `voiceUpdate` op.
#[derive(Deserialize, Debug)]
pub struct VoiceServerEvent {
    pub token: String,
    pub endpoint: String,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IncomingMessage {
    VoiceUpdate {
        guild_id: GuildId,
        session_id: String,
        event: VoiceServerEvent,
    },
    Play {
        guild_id: GuildId,
        /// Base64-encoded track.
        track: String,
        #[serde(default)]
        no_replace: bool,
        #[serde(default)]
        user_data: Option<Value>,
    },
    Stop {
        guild_id: GuildId,
    },
    Pause {
        guild_id: GuildId,
        pause: bool,
    },
    Volume {
        guild_id: GuildId,
        volume: i32,
    },
    Filters {
        guild_id: GuildId,
        #[serde(default)]
        end_time: Option<u64>,
        #[serde(flatten)]
        filters: Filters,
    },
    Destroy {
        guild_id: GuildId,
    },
}

impl IncomingMessage {
    pub fn guild_id(&self) -> &GuildId {
        match self {
            Self::VoiceUpdate { guild_id, .. }
            | Self::Play { guild_id, .. }
            | Self::Stop { guild_id }
            | Self::Pause { guild_id, .. }
            | Self::Volume { guild_id, .. }
            | Self::Filters { guild_id, .. }
            | Self::Destroy { guild_id } => guild_id,
        }
    }
}

/// Queues the command an op asks for on the guild's player.
///
/// Never waits for the player: ops from one socket are ordered by the
/// player's queue, and results reach the client as events.
pub fn handle_op(op: IncomingMessage, state: &AppState, session: &Session) -> Result<(), String> {
    debug!("[{}] op {:?}", op.guild_id(), op);

    match op {
        IncomingMessage::VoiceUpdate {
            guild_id,
            session_id,
            event,
        } => {
            let voice = VoiceState {
                token: event.token,
                endpoint: event.endpoint,
                session_id,
            };
            let _ = session.player(&guild_id, &state.services).update_voice(voice);
        }
        IncomingMessage::Play {
            guild_id,
            track,
            no_replace,
            user_data,
        } => {
            let track = Track::decode(&track)
                .ok_or_else(|| format!("Invalid encoded track for guild {}", guild_id))?
                .with_user_data(user_data);
            let _ = session
                .player(&guild_id, &state.services)
                .play(track, no_replace);
        }
        IncomingMessage::Stop { guild_id } => {
            if let Some(player) = session.get(&guild_id) {
                let _ = player.stop();
            }
        }
        IncomingMessage::Pause { guild_id, pause } => {
            let _ = session.player(&guild_id, &state.services).pause(pause);
        }
        IncomingMessage::Volume { guild_id, volume } => {
            let _ = session.player(&guild_id, &state.services).volume(volume);
        }
        IncomingMessage::Filters {
            guild_id,
            end_time,
            filters,
        } => {
            let _ = session
                .player(&guild_id, &state.services)
                .filters(filters, end_time);
        }
        IncomingMessage::Destroy { guild_id } => {
            session.destroy_player(&guild_id);
        }
    }

    Ok(())
}
