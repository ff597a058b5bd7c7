use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, trace};

use super::{
    context::{PlayerContext, PlayerServices},
    manager,
    state::{Filters, Player, VoiceState},
};
use crate::{
    common::{GuildId, UserId},
    protocol::{OutgoingMessage, tracks::Track},
    voice::VoiceEvent,
};

/// Players of one client session, at most one per guild.
pub type PlayerRegistry = DashMap<GuildId, PlayerHandle>;

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

pub type Reply = oneshot::Sender<Player>;

pub enum PlayerCommand {
    Play {
        track: Track,
        no_replace: bool,
        reply: Reply,
    },
    Stop {
        reply: Reply,
    },
    Pause {
        paused: bool,
        reply: Reply,
    },
    Volume {
        volume: i32,
        reply: Reply,
    },
    Filters {
        filters: Filters,
        end_time: Option<u64>,
        reply: Reply,
    },
    UpdateVoice {
        voice: VoiceState,
        reply: Reply,
    },
    Snapshot {
        reply: Reply,
    },
}

/// Cheap handle to a running player actor.
#[derive(Clone)]
pub struct PlayerHandle {
    id: u64,
    guild_id: GuildId,
    commands: flume::Sender<PlayerCommand>,
    cancel: CancellationToken,
}

impl PlayerHandle {
    /// Sets a player up and starts its actor task.
    pub fn spawn(
        guild_id: GuildId,
        user_id: UserId,
        services: PlayerServices,
        events: flume::Sender<OutgoingMessage>,
        registry: &Arc<PlayerRegistry>,
    ) -> Self {
        let id = NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = flume::unbounded();
        let cancel = CancellationToken::new();

        let mut ctx = PlayerContext::new(
            id,
            guild_id.clone(),
            user_id,
            services,
            events,
            rx,
            Arc::downgrade(registry),
            cancel.clone(),
        );
        ctx.setup();

        let span = info_span!("player", guild = %guild_id);
        tokio::spawn(run(ctx).instrument(span));

        Self {
            id,
            guild_id,
            commands: tx,
            cancel,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Queues a command. The command is ordered by this call; awaiting the
    /// returned [`Pending`] only waits for the resulting state.
    fn request(&self, build: impl FnOnce(Reply) -> PlayerCommand) -> Pending {
        let (reply, rx) = oneshot::channel();
        match self.commands.send(build(reply)) {
            Ok(()) => Pending(Some(rx)),
            Err(_) => Pending(None),
        }
    }

    pub fn play(&self, track: Track, no_replace: bool) -> Pending {
        self.request(|reply| PlayerCommand::Play {
            track,
            no_replace,
            reply,
        })
    }

    pub fn stop(&self) -> Pending {
        self.request(|reply| PlayerCommand::Stop { reply })
    }

    pub fn pause(&self, paused: bool) -> Pending {
        self.request(|reply| PlayerCommand::Pause { paused, reply })
    }

    pub fn volume(&self, volume: i32) -> Pending {
        self.request(|reply| PlayerCommand::Volume { volume, reply })
    }

    pub fn filters(&self, filters: Filters, end_time: Option<u64>) -> Pending {
        self.request(|reply| PlayerCommand::Filters {
            filters,
            end_time,
            reply,
        })
    }

    pub fn update_voice(&self, voice: VoiceState) -> Pending {
        self.request(|reply| PlayerCommand::UpdateVoice { voice, reply })
    }

    pub fn snapshot(&self) -> Pending {
        self.request(|reply| PlayerCommand::Snapshot { reply })
    }

    /// Destroys the player. Work in flight is abandoned at its next
    /// suspension point and produces no further events.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }
}

/// Player state after a queued command ran. Resolves to `None` once the
/// player is gone. Dropping it does not cancel the command.
pub struct Pending(Option<oneshot::Receiver<Player>>);

impl Future for Pending {
    type Output = Option<Player>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().0 {
            Some(rx) => Pin::new(rx).poll(cx).map(Result::ok),
            None => Poll::Ready(None),
        }
    }
}

enum Next {
    Command(PlayerCommand),
    Voice(VoiceEvent),
    VoiceClosed,
    Shutdown,
}

async fn next_voice_event(events: &mut Option<mpsc::UnboundedReceiver<VoiceEvent>>) -> Option<VoiceEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run(mut ctx: PlayerContext) {
    debug!("player actor started");

    loop {
        let next = if let Some(cmd) = ctx.deferred.pop_front() {
            Next::Command(cmd)
        } else {
            let cancel = ctx.cancel.clone();
            let commands = ctx.commands.clone();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Next::Shutdown,
                event = next_voice_event(&mut ctx.voice_events) => match event {
                    Some(event) => Next::Voice(event),
                    None => Next::VoiceClosed,
                },
                cmd = commands.recv_async() => match cmd {
                    Ok(cmd) => Next::Command(cmd),
                    Err(_) => Next::Shutdown,
                },
            }
        };

        match next {
            Next::Command(cmd) => handle_command(&mut ctx, cmd).await,
            Next::Voice(event) => manager::handle_voice_event(&mut ctx, event),
            Next::VoiceClosed => {
                trace!("voice event stream closed");
                ctx.voice_events = None;
            }
            Next::Shutdown => break,
        }

        if ctx.cancel.is_cancelled() {
            break;
        }
    }

    ctx.cancel.cancel();
    ctx.teardown();
}

async fn handle_command(ctx: &mut PlayerContext, cmd: PlayerCommand) {
    let reply = match cmd {
        PlayerCommand::Play {
            track,
            no_replace,
            reply,
        } => {
            manager::play(ctx, track, no_replace).await;
            reply
        }
        PlayerCommand::Stop { reply } => {
            manager::stop(ctx);
            reply
        }
        PlayerCommand::Pause { paused, reply } => {
            manager::pause(ctx, paused);
            reply
        }
        PlayerCommand::Volume { volume, reply } => {
            manager::volume(ctx, volume);
            reply
        }
        PlayerCommand::Filters {
            filters,
            end_time,
            reply,
        } => {
            manager::apply_filters(ctx, filters, end_time).await;
            reply
        }
        PlayerCommand::UpdateVoice { voice, reply } => {
            manager::update_voice(ctx, voice);
            reply
        }
        PlayerCommand::Snapshot { reply } => reply,
    };

    if !ctx.cancel.is_cancelled() {
        let _ = reply.send(ctx.snapshot());
    }
}
