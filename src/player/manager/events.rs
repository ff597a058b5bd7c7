use tracing::{debug, info, trace, warn};

use super::{
    super::{context::PlayerContext, state::Player},
    error::send_load_failed,
    monitor::spawn_player_updates,
};
use crate::{
    common::PlaybackError,
    player::context::PlaybackCache,
    protocol::{NodeEvent, events::TrackEndReason},
    server::now_ms,
    voice::{
        PlayerStatus, PlayerTransition, StatusReason, TransportStatus, VoiceEvent, close_codes,
    },
};

/// Single dispatch point for everything the voice transport reports.
pub fn handle_voice_event(ctx: &mut PlayerContext, event: VoiceEvent) {
    match event {
        VoiceEvent::SpeakStart { user_id, ssrc } => {
            trace!("[{}] user {} started speaking (ssrc {})", ctx.guild_id, user_id, ssrc);
        }
        VoiceEvent::StateChange { old, new } => on_transport_state(ctx, old, new),
        VoiceEvent::PlayerStateChange { old, new } => {
            if new.resource != ctx.cache.resource_id {
                trace!(
                    "[{}] ignoring {:?} for superseded resource {:?}",
                    ctx.guild_id, new.status, new.resource
                );
                return;
            }
            on_player_state(ctx, old, new);
        }
        VoiceEvent::Error { resource, message } => {
            if resource.is_some() && resource != ctx.cache.resource_id {
                trace!("[{}] ignoring stale stream error: {}", ctx.guild_id, message);
                return;
            }
            on_stream_error(ctx, message);
        }
    }
}

fn on_transport_state(ctx: &mut PlayerContext, old: TransportStatus, new: TransportStatus) {
    let TransportStatus::Disconnected { code, .. } = new else {
        trace!("[{}] voice {:?} -> {:?}", ctx.guild_id, old, new);
        return;
    };
    if old.is_disconnected() {
        return;
    }
    if close_codes::is_resumable(code) {
        debug!("[{}] voice server crashed, transport resumes", ctx.guild_id);
        return;
    }

    let reason = close_codes::describe(code);
    info!("[{}] voice connection closed: {} ({})", ctx.guild_id, code, reason);

    ctx.release_voice();
    ctx.stop_track();
    ctx.config = Player::new(ctx.guild_id.clone());
    ctx.cache = PlaybackCache::default();

    ctx.emit(NodeEvent::WebSocketClosed {
        guild_id: ctx.guild_id.clone(),
        code,
        reason: reason.to_string(),
        by_remote: true,
    });
}

fn on_player_state(ctx: &mut PlayerContext, old: PlayerTransition, new: PlayerTransition) {
    match (new.status, new.reason) {
        (PlayerStatus::Idle, StatusReason::Finished) if old.status != PlayerStatus::Idle => {
            on_track_finished(ctx)
        }
        (PlayerStatus::Playing, StatusReason::Requested) => on_track_started(ctx),
        _ => trace!("[{}] player {:?} ({:?})", ctx.guild_id, new.status, new.reason),
    }
}

fn on_track_finished(ctx: &mut PlayerContext) {
    ctx.stop_track();
    ctx.cache.url = None;
    ctx.cache.resource_id = None;

    if let Some(track) = ctx.config.track.take() {
        debug!("[{}] finished '{}'", ctx.guild_id, track.info.title);
        ctx.emit(NodeEvent::TrackEnd {
            guild_id: ctx.guild_id.clone(),
            track,
            reason: TrackEndReason::Finished,
        });
    }
}

/// A genuine start of the current track. A resource swapped in for new
/// filters reports `Requested` too but keeps the first start.
fn on_track_started(ctx: &mut PlayerContext) {
    if ctx.cache.track_started {
        return;
    }
    let Some(track) = ctx.config.track.clone() else {
        return;
    };

    ctx.cache.track_started = true;
    ctx.cache.started_at = Some(now_ms());
    if !ctx.cache.counted_playing {
        ctx.cache.counted_playing = true;
        ctx.services.metrics.playback_started();
    }

    if let Some(period) = ctx.services.config.player.update_interval() {
        if let Some(task) = ctx.telemetry.take() {
            task.abort();
        }
        ctx.telemetry = spawn_player_updates(ctx, period);
    }

    info!("[{}] started '{}'", ctx.guild_id, track.info.title);
    ctx.emit(NodeEvent::TrackStart {
        guild_id: ctx.guild_id.clone(),
        track,
    });
}

fn on_stream_error(ctx: &mut PlayerContext, message: String) {
    ctx.stop_track();
    ctx.cache.resource_id = None;

    let Some(track) = ctx.config.track.take() else {
        warn!("[{}] stream error without a track: {}", ctx.guild_id, message);
        return;
    };

    warn!("[{}] stream of '{}' failed: {}", ctx.guild_id, track.info.title, message);
    send_load_failed(ctx, &track, &PlaybackError::Transport(message));
}
