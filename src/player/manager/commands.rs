use tracing::debug;

use super::super::{context::PlayerContext, state::Filters};
use crate::{
    player::state::VoiceState,
    protocol::{NodeEvent, events::TrackEndReason},
};

/// Ends the current track. No-op when idle.
pub fn stop(ctx: &mut PlayerContext) {
    let Some(track) = ctx.config.track.take() else {
        return;
    };

    debug!("[{}] stopping '{}'", ctx.guild_id, track.info.title);
    ctx.emit(NodeEvent::TrackEnd {
        guild_id: ctx.guild_id.clone(),
        track,
        reason: TrackEndReason::Stopped,
    });

    ctx.abandon_stream();
    ctx.config.filters = Filters::default();
    ctx.cache.url = None;
    ctx.stop_track();
}

/// Applies `volume` (percent) to the live stream, or stages it for the
/// next track when nothing is loaded.
pub fn volume(ctx: &mut PlayerContext, volume: i32) {
    let volume = volume.clamp(0, ctx.services.config.player.max_volume);

    match ctx.voice.as_ref().filter(|v| v.has_stream()) {
        Some(voice) => {
            voice.set_volume(volume as f32 / 100.0);
            ctx.config.volume = volume;
        }
        None => ctx.cache.volume = volume,
    }
}

pub fn pause(ctx: &mut PlayerContext, paused: bool) {
    if let Some(voice) = &ctx.voice {
        if paused {
            voice.pause();
        } else {
            voice.unpause();
        }
    }
    ctx.config.paused = paused;
}

/// Stores the credentials and forwards them to the transport, connecting
/// it when it is neither connecting nor connected. Never waits.
pub fn update_voice(ctx: &mut PlayerContext, voice: VoiceState) {
    if ctx.voice.is_none() {
        ctx.join_voice();
    }
    ctx.config.voice = voice;

    let Some(session) = &ctx.voice else {
        return;
    };
    let creds = &ctx.config.voice;
    session.voice_state_update(&creds.session_id);
    session.voice_server_update(&creds.token, &creds.endpoint);

    if !session.status().is_active() {
        session.connect();
    }
}
