use std::sync::atomic::Ordering;

use tracing::{debug, error, info};

use super::{
    super::context::PlayerContext, connection::wait_for_connection, error::send_load_failed,
};
use crate::{
    audio::{AudioResource, FilterRequest},
    common::PlaybackError,
    player::state::Filters,
    protocol::{NodeEvent, events::TrackEndReason, tracks::Track},
};

/// Track replace protocol: resolve, end the old track, build, start.
pub async fn play(ctx: &mut PlayerContext, track: Track, no_replace: bool) {
    // -- 1. noReplace keeps whatever is active -----------------------------
    if no_replace && ctx.config.track.is_some() {
        debug!("[{}] noReplace with an active track, ignoring play", ctx.guild_id);
        return;
    }

    let old_track = ctx.config.track.clone();
    let resolver = ctx.services.resolver.clone();

    // -- 2. Resolve --------------------------------------------------------
    let resolved = match PlayerContext::guarded(&ctx.cancel, resolver.resolve(&track.info)).await {
        None => return,
        Some(Ok(resolved)) => resolved,
        Some(Err(e)) => {
            error!("[{}] failed to resolve '{}': {}", ctx.guild_id, track.info.title, e);
            // The old stream keeps playing but is no longer the active track,
            // so its telemetry and playing count end here.
            ctx.config.track = None;
            ctx.cache.url = None;
            ctx.stop_track();
            send_load_failed(ctx, &track, &e);
            return;
        }
    };

    // -- 3. The old track is replaced from here on -------------------------
    if let Some(old) = old_track.as_ref() {
        ctx.emit(NodeEvent::TrackEnd {
            guild_id: ctx.guild_id.clone(),
            track: old.clone(),
            reason: TrackEndReason::Replaced,
        });
    }

    // -- 4. Build the playable resource ------------------------------------
    let built = if ctx.config.filters.is_all_none() {
        ctx.cache.url = Some(resolved.url.clone());
        PlayerContext::guarded(&ctx.cancel, resolver.open(&track.info, &resolved))
            .await
            .map(|opened| opened.map(|stream| AudioResource::new(stream, resolved.format)))
    } else {
        let pipeline = ctx.services.pipeline.clone();
        let filters = pipeline.configure(ctx.config.filters.clone());
        ctx.config.filters = filters.clone();

        let request = FilterRequest {
            guild_id: ctx.guild_id.clone(),
            info: track.info.clone(),
            filters,
            protocol: resolved.protocol.clone(),
            url: resolved.url.clone(),
            seek_ms: None,
            end_time_ms: None,
            transcoder: ctx.cache.transcoder,
            additional_data: resolved.additional_data.clone(),
        };
        PlayerContext::guarded(&ctx.cancel, pipeline.build(request)).await
    };

    let Some(built) = built else {
        return;
    };
    if old_track.is_some() {
        ctx.stop_track();
    }

    // -- 5. Build failure ---------------------------------------------------
    let resource = match built {
        Ok(resource) => resource,
        Err(e) => {
            error!("[{}] failed to load '{}': {}", ctx.guild_id, track.info.title, e);
            fail_load(ctx, &track, &e);
            return;
        }
    };

    // -- 6. Start -----------------------------------------------------------
    ctx.config.track = Some(track.clone());
    ctx.cache.track_started = false;
    ctx.cache.position_offset.store(0, Ordering::Relaxed);

    if ctx.cache.volume != 100 {
        ctx.config.volume = ctx.cache.volume;
        ctx.cache.volume = 100;
    }
    resource.set_volume(ctx.config.volume as f32 / 100.0);

    if let Err(e) = wait_for_connection(ctx).await {
        if ctx.cancel.is_cancelled() {
            return;
        }
        error!("[{}] cannot start '{}': {}", ctx.guild_id, track.info.title, e);
        fail_load(ctx, &track, &e);
        return;
    }

    start_resource(ctx, resource);
    ctx.cache.protocol = Some(resolved.protocol);
    ctx.cache.url = Some(resolved.url);
    ctx.cache.additional_data = resolved.additional_data;

    info!("[{}] playback starting: {}", ctx.guild_id, track.info.title);
}

/// Hands `resource` to the transport as the current resource.
pub(super) fn start_resource(ctx: &mut PlayerContext, resource: AudioResource) {
    let Some(voice) = ctx.voice.clone() else {
        return;
    };

    ctx.cache.resource_id = Some(resource.id());
    ctx.cache.transcoder = resource.transcoder();
    voice.play(resource);

    if ctx.config.paused {
        voice.pause();
    }
}

/// Clears the track after a failed build or start and reports it.
pub(super) fn fail_load(ctx: &mut PlayerContext, track: &Track, err: &PlaybackError) {
    ctx.config.track = None;
    ctx.config.filters = Filters::default();
    ctx.cache.url = None;
    ctx.abandon_stream();
    ctx.stop_track();
    send_load_failed(ctx, track, err);
}
