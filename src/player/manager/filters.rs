use std::sync::atomic::Ordering;

use tracing::{debug, error};

use super::{
    super::{context::PlayerContext, state::Filters},
    connection::wait_for_connection,
    start::{fail_load, start_resource},
};
use crate::{audio::FilterRequest, voice::PlayerStatus};

/// Reconfigures filters and restarts the current track through the filter
/// pipeline at its real-time position.
///
/// Ignored unless the transport is playing and filters are enabled on this
/// node. The swap keeps the track's start bookkeeping untouched.
pub async fn apply_filters(ctx: &mut PlayerContext, filters: Filters, end_time: Option<u64>) {
    let playing = ctx
        .voice
        .as_ref()
        .is_some_and(|v| v.player_status() == PlayerStatus::Playing);
    if !playing || !ctx.services.config.filters.enabled {
        debug!("[{}] filters ignored: nothing playing or filters disabled", ctx.guild_id);
        return;
    }

    let pipeline = ctx.services.pipeline.clone();
    ctx.config.filters = pipeline.configure(filters);

    let Some(track) = ctx.config.track.clone() else {
        return;
    };

    let position = ctx.real_time_position();
    let request = FilterRequest {
        guild_id: ctx.guild_id.clone(),
        info: track.info.clone(),
        filters: ctx.config.filters.clone(),
        protocol: ctx.cache.protocol.clone().unwrap_or_default(),
        url: ctx.cache.url.clone().unwrap_or_default(),
        seek_ms: Some(position),
        end_time_ms: end_time,
        transcoder: ctx.cache.transcoder,
        additional_data: ctx.cache.additional_data.clone(),
    };
    debug!("[{}] rebuilding '{}' at {} ms", ctx.guild_id, track.info.title, position);

    let resource = match PlayerContext::guarded(&ctx.cancel, pipeline.build(request)).await {
        None => return,
        Some(Ok(resource)) => resource,
        Some(Err(e)) => {
            error!("[{}] failed to apply filters: {}", ctx.guild_id, e);
            fail_load(ctx, &track, &e);
            return;
        }
    };
    resource.set_volume(ctx.config.volume as f32 / 100.0);

    if let Err(e) = wait_for_connection(ctx).await {
        if ctx.cancel.is_cancelled() {
            return;
        }
        fail_load(ctx, &track, &e);
        return;
    }

    ctx.cache.position_offset.store(position, Ordering::Relaxed);
    start_resource(ctx, resource);
}
