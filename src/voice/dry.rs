//! A voice transport that never leaves the process.
//!
//! Streams are drained at real-time pace in 20 ms frames and counted, so
//! every player-side behaviour (positions, finished tracks, stream errors,
//! telemetry) runs exactly as it would against a real gateway. Encoded
//! resources go through a [`PcmDecoder`] first so a frame is always 20 ms
//! of audio.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    io::AsyncReadExt,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use super::{
    PlayerStatus, PlayerTransition, StatusReason, TransportStatus, VoiceConnector, VoiceEvent,
    VoiceLink, VoiceSession,
};
use crate::{
    audio::{AudioResource, AudioStream, PcmDecoder, VolumeHandle},
    common::{AudioFormat, GuildId, UserId},
};

pub const FRAME_DURATION: Duration = Duration::from_millis(20);
/// One 20 ms frame of 48 kHz stereo s16le.
pub const FRAME_BYTES: usize = 3840;

#[derive(Default)]
pub struct DryConnector {
    decoder: Option<Arc<dyn PcmDecoder>>,
}

impl DryConnector {
    pub fn new(decoder: Arc<dyn PcmDecoder>) -> Self {
        Self {
            decoder: Some(decoder),
        }
    }
}

impl VoiceConnector for DryConnector {
    fn join(&self, guild_id: &GuildId, user_id: UserId) -> VoiceLink {
        let (session, events) = DrySession::new(guild_id.clone(), user_id, self.decoder.clone());
        VoiceLink {
            session: Arc::new(session),
            events,
        }
    }
}

#[derive(Default)]
struct Credentials {
    session_id: Option<String>,
    token: Option<String>,
    endpoint: Option<String>,
}

impl Credentials {
    fn complete(&self) -> bool {
        self.session_id.is_some() && self.token.is_some() && self.endpoint.is_some()
    }
}

struct Playback {
    player: PlayerTransition,
    pump: Option<JoinHandle<()>>,
    volume: Option<VolumeHandle>,
}

struct Shared {
    guild_id: GuildId,
    decoder: Option<Arc<dyn PcmDecoder>>,
    credentials: Mutex<Credentials>,
    playback: Mutex<Playback>,
    status: watch::Sender<TransportStatus>,
    events: mpsc::UnboundedSender<VoiceEvent>,
    packets: AtomicU64,
    paused: AtomicBool,
    ping: AtomicI64,
}

impl Shared {
    fn emit(&self, event: VoiceEvent) {
        // the receiver is gone once the player tore the session down
        let _ = self.events.send(event);
    }

    fn set_status(&self, new: TransportStatus) {
        let old = self.status.send_replace(new.clone());
        if old != new {
            self.emit(VoiceEvent::StateChange { old, new });
        }
    }

    /// Moves the player to `new` unless `only_for` names a resource that is
    /// no longer current.
    fn transition(&self, new: PlayerTransition, only_for: Option<u64>) {
        let old = {
            let mut playback = self.playback.lock();
            if only_for.is_some() && playback.player.resource != only_for {
                return;
            }
            if new.status == PlayerStatus::Idle {
                playback.pump = None;
                playback.volume = None;
            }
            std::mem::replace(&mut playback.player, new)
        };
        self.emit(VoiceEvent::PlayerStateChange { old, new });
    }

    fn decode(&self, stream: AudioStream, format: AudioFormat) -> Result<AudioStream, String> {
        if format == AudioFormat::Pcm {
            return Ok(stream);
        }
        match &self.decoder {
            Some(decoder) => decoder.decode(stream, format).map_err(|e| e.to_string()),
            None => Err(format!("no decoder for {:?} audio", format)),
        }
    }

    fn abort_pump(&self) -> Option<PlayerTransition> {
        let mut playback = self.playback.lock();
        if let Some(pump) = playback.pump.take() {
            pump.abort();
        }
        playback.volume = None;
        playback.player.status.has_stream().then_some(playback.player)
    }
}

pub struct DrySession {
    shared: Arc<Shared>,
}

impl DrySession {
    pub fn new(
        guild_id: GuildId,
        user_id: UserId,
        decoder: Option<Arc<dyn PcmDecoder>>,
    ) -> (Self, mpsc::UnboundedReceiver<VoiceEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(TransportStatus::Idle);
        debug!("[{}] dry voice session for user {}", guild_id, user_id);

        let shared = Arc::new(Shared {
            guild_id,
            decoder,
            credentials: Mutex::new(Credentials::default()),
            playback: Mutex::new(Playback {
                player: PlayerTransition::IDLE,
                pump: None,
                volume: None,
            }),
            status,
            events,
            packets: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            ping: AtomicI64::new(-1),
        });
        (Self { shared }, rx)
    }

    /// Linear volume of the loaded stream.
    pub fn current_volume(&self) -> Option<f32> {
        self.shared.playback.lock().volume.as_ref().map(VolumeHandle::get)
    }

    /// Id of the resource the player status refers to.
    pub fn resource(&self) -> Option<u64> {
        self.shared.playback.lock().player.resource
    }

    /// Feeds `event` to the player as if the transport had reported it.
    #[cfg(test)]
    pub(crate) fn inject(&self, event: VoiceEvent) {
        self.shared.emit(event);
    }

    /// Simulates the remote side closing the voice connection.
    pub fn close(&self, code: u16, reason: &str) {
        self.shared.abort_pump();
        self.shared.ping.store(-1, Ordering::Relaxed);
        self.shared.set_status(TransportStatus::Disconnected {
            code,
            reason: reason.to_string(),
        });
    }
}

impl VoiceSession for DrySession {
    fn voice_state_update(&self, session_id: &str) {
        self.shared.credentials.lock().session_id = Some(session_id.to_string());
    }

    fn voice_server_update(&self, token: &str, endpoint: &str) {
        let mut credentials = self.shared.credentials.lock();
        credentials.token = Some(token.to_string());
        credentials.endpoint = Some(endpoint.to_string());
    }

    fn connect(&self) {
        if self.status().is_active() {
            return;
        }
        if !self.shared.credentials.lock().complete() {
            debug!(
                "[{}] connect requested without full credentials",
                self.shared.guild_id
            );
            return;
        }

        self.shared.set_status(TransportStatus::Connecting);
        self.shared.ping.store(0, Ordering::Relaxed);
        self.shared.set_status(TransportStatus::Connected);
    }

    fn status(&self) -> TransportStatus {
        self.shared.status.borrow().clone()
    }

    fn watch_status(&self) -> watch::Receiver<TransportStatus> {
        self.shared.status.subscribe()
    }

    fn player_status(&self) -> PlayerStatus {
        self.shared.playback.lock().player.status
    }

    fn has_stream(&self) -> bool {
        self.shared.playback.lock().volume.is_some()
    }

    fn play(&self, resource: AudioResource) {
        let format = resource.format();
        let (id, stream, volume) = resource.into_parts();
        self.shared.abort_pump();
        self.shared.packets.store(0, Ordering::Relaxed);
        self.shared.paused.store(false, Ordering::Relaxed);

        let stream = match self.shared.decode(stream, format) {
            Ok(stream) => stream,
            Err(message) => {
                warn!("[{}] cannot play resource {}: {}", self.shared.guild_id, id, message);
                self.shared.transition(
                    PlayerTransition::new(PlayerStatus::Idle, StatusReason::Errored, Some(id)),
                    None,
                );
                self.shared.emit(VoiceEvent::Error {
                    resource: Some(id),
                    message,
                });
                return;
            }
        };

        // The pump may reach the end before this returns; it must find the
        // player already on its resource.
        let mut playback = self.shared.playback.lock();
        let new = PlayerTransition::new(PlayerStatus::Playing, StatusReason::Requested, Some(id));
        let old = std::mem::replace(&mut playback.player, new);
        playback.volume = Some(volume);
        playback.pump = Some(tokio::spawn(pump(self.shared.clone(), id, stream)));
        self.shared.emit(VoiceEvent::PlayerStateChange { old, new });
    }

    fn pause(&self) {
        let current = self.shared.playback.lock().player;
        if current.status != PlayerStatus::Playing {
            return;
        }
        self.shared.paused.store(true, Ordering::Relaxed);
        self.shared.transition(
            PlayerTransition::new(PlayerStatus::Paused, StatusReason::Paused, current.resource),
            current.resource,
        );
    }

    fn unpause(&self) {
        let current = self.shared.playback.lock().player;
        if current.status != PlayerStatus::Paused {
            return;
        }
        self.shared.paused.store(false, Ordering::Relaxed);
        self.shared.transition(
            PlayerTransition::new(PlayerStatus::Playing, StatusReason::Unpaused, current.resource),
            current.resource,
        );
    }

    fn stop(&self) {
        if let Some(current) = self.shared.abort_pump() {
            self.shared.transition(
                PlayerTransition::new(PlayerStatus::Idle, StatusReason::Stopped, current.resource),
                current.resource,
            );
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Some(handle) = &self.shared.playback.lock().volume {
            handle.set(volume);
        }
    }

    fn packets_sent(&self) -> u64 {
        self.shared.packets.load(Ordering::Relaxed)
    }

    fn ping(&self) -> i64 {
        self.shared.ping.load(Ordering::Relaxed)
    }

    fn destroy(&self) {
        self.shared.abort_pump();
        self.shared.ping.store(-1, Ordering::Relaxed);
        self.shared.status.send_replace(TransportStatus::Disconnected {
            code: 1000,
            reason: "destroyed".to_string(),
        });
    }
}

async fn pump(shared: Arc<Shared>, resource: u64, mut stream: AudioStream) {
    let mut ticker = tokio::time::interval(FRAME_DURATION);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frame = vec![0u8; FRAME_BYTES];

    loop {
        ticker.tick().await;
        if shared.paused.load(Ordering::Relaxed) {
            continue;
        }

        match read_frame(&mut stream, &mut frame).await {
            Ok(0) => {
                shared.transition(
                    PlayerTransition::new(PlayerStatus::Idle, StatusReason::Finished, Some(resource)),
                    Some(resource),
                );
                return;
            }
            Ok(_) => {
                shared.packets.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("[{}] dry stream {} failed: {}", shared.guild_id, resource, e);
                shared.transition(
                    PlayerTransition::new(PlayerStatus::Idle, StatusReason::Errored, Some(resource)),
                    Some(resource),
                );
                shared.emit(VoiceEvent::Error {
                    resource: Some(resource),
                    message: e.to_string(),
                });
                return;
            }
        }
    }
}

/// Fills `frame` unless the stream ends first. Returns the bytes read.
async fn read_frame(stream: &mut AudioStream, frame: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < frame.len() {
        let n = stream.read(&mut frame[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
