use super::super::context::PlayerContext;
use crate::{
    common::PlaybackError,
    protocol::{
        NodeEvent,
        events::{TrackEndReason, TrackException},
        tracks::Track,
    },
};

/// Emit `TrackException` followed by `TrackEnd: LoadFailed` for `track`.
pub fn send_load_failed(player: &PlayerContext, track: &Track, err: &PlaybackError) {
    let guild_id = player.guild_id.clone();

    player.emit(NodeEvent::TrackException {
        guild_id: guild_id.clone(),
        track: track.clone(),
        exception: TrackException::from(err),
    });

    player.emit(NodeEvent::TrackEnd {
        guild_id,
        track: track.clone(),
        reason: TrackEndReason::LoadFailed,
    });
}
