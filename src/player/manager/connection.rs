use tokio::time::Instant;
use tracing::{debug, warn};

use super::{super::context::PlayerContext, commands::update_voice};
use crate::{
    common::PlaybackError,
    player::handle::PlayerCommand,
    voice::{TransportStatus, close_codes},
};

/// Waits until the voice transport reports `Connected`.
///
/// Bounded by `player.connect_timeout_ms`. Voice updates and snapshots
/// arriving meanwhile are served right away, since the connection may be
/// waiting on exactly those credentials; other commands are deferred.
pub async fn wait_for_connection(ctx: &mut PlayerContext) -> Result<(), PlaybackError> {
    let timeout = ctx.services.config.player.connect_timeout();
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let mut status = ctx.voice.as_ref().map(|v| v.watch_status());

        if let Some(rx) = status.as_mut() {
            let current = rx.borrow_and_update().clone();
            match current {
                TransportStatus::Connected => return Ok(()),
                TransportStatus::Disconnected { code, .. } if !close_codes::is_resumable(code) => {
                    return Err(PlaybackError::ConnectionClosed);
                }
                _ => {}
            }
        }

        debug!("[{}] waiting for voice connection", ctx.guild_id);

        let cancel = ctx.cancel.clone();
        let commands = ctx.commands.clone();
        let changed = async {
            match status.as_mut() {
                Some(rx) => rx.changed().await.is_ok(),
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlaybackError::ConnectionClosed),
            _ = expired => {
                let ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                warn!("[{}] voice connection not ready after {} ms", ctx.guild_id, ms);
                return Err(PlaybackError::ConnectTimeout(ms));
            }
            alive = changed => {
                if !alive {
                    return Err(PlaybackError::ConnectionClosed);
                }
            }
            cmd = commands.recv_async() => match cmd {
                Ok(PlayerCommand::UpdateVoice { voice, reply }) => {
                    update_voice(ctx, voice);
                    let _ = reply.send(ctx.snapshot());
                }
                Ok(PlayerCommand::Snapshot { reply }) => {
                    let _ = reply.send(ctx.snapshot());
                }
                Ok(other) => ctx.deferred.push_back(other),
                Err(_) => return Err(PlaybackError::ConnectionClosed),
            },
        }
    }
}
