use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::trace;

use super::super::context::{FRAME_MS, PlayerContext};
use crate::{
    common::GuildId,
    player::state::PlayerState,
    protocol::OutgoingMessage,
    server::now_ms,
    voice::VoiceSession,
};

struct MonitorCtx {
    guild_id: GuildId,
    voice: Arc<dyn VoiceSession>,
    offset: Arc<AtomicU64>,
    events: flume::Sender<OutgoingMessage>,
    period: Duration,
}

/// Starts the periodic `playerUpdate` task for the current track. The
/// first update goes out one full period after the start.
pub fn spawn_player_updates(ctx: &PlayerContext, period: Duration) -> Option<JoinHandle<()>> {
    let voice = ctx.voice.clone()?;
    let monitor = MonitorCtx {
        guild_id: ctx.guild_id.clone(),
        voice,
        offset: ctx.cache.position_offset.clone(),
        events: ctx.events.clone(),
        period,
    };
    Some(tokio::spawn(monitor_loop(monitor)))
}

async fn monitor_loop(ctx: MonitorCtx) {
    let MonitorCtx {
        guild_id,
        voice,
        offset,
        events,
        period,
    } = ctx;

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let position = if voice.player_status().has_stream() {
            offset.load(Ordering::Relaxed) + voice.packets_sent() * FRAME_MS
        } else {
            0
        };

        let update = OutgoingMessage::PlayerUpdate {
            guild_id: guild_id.clone(),
            state: PlayerState {
                time: now_ms(),
                position,
                connected: voice.status().is_connected(),
                ping: voice.ping(),
            },
        };

        if events.send(update).is_err() {
            trace!("[{}] control channel closed, stopping updates", guild_id);
            break;
        }
    }
}
