//! In-memory collaborators for driving a player in tests.

use std::{
    collections::HashMap,
    io,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use super::{
    handle::{PlayerHandle, PlayerRegistry},
    context::PlayerServices,
    state::{Filters, Player, VoiceState},
};
use crate::{
    audio::{AudioResource, AudioStream, FilterPipeline, FilterRequest, filters::clamp},
    common::{AudioFormat, GuildId, PlaybackError, UserId},
    configs::Config,
    monitoring::PlayerMetrics,
    protocol::{NodeEvent, OutgoingMessage, Track, TrackInfo},
    sources::{ResolvedTrack, ResourceResolver},
    voice::{
        DrySession, VoiceConnector, VoiceLink, VoiceSession,
        dry::FRAME_BYTES,
    },
};

#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// A clean stream of this many 20 ms frames.
    Frames(usize),
    ResolveFails,
    OpenFails,
    /// Fails with a read error after this many frames.
    Broken(usize),
}

fn silence(frames: usize) -> AudioStream {
    Box::new(tokio::io::repeat(0).take((frames * FRAME_BYTES) as u64))
}

struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "upstream reset")))
    }
}

/// Resolves tracks by identifier from a script. Unknown tracks play for
/// ten minutes.
#[derive(Default)]
pub struct TestResolver {
    scripts: Mutex<HashMap<String, Script>>,
    delay: Mutex<Option<Duration>>,
}

impl TestResolver {
    pub fn script(&self, identifier: &str, script: Script) {
        self.scripts.lock().insert(identifier.to_string(), script);
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    fn lookup(&self, identifier: &str) -> Script {
        self.scripts
            .lock()
            .get(identifier)
            .copied()
            .unwrap_or(Script::Frames(30_000))
    }
}

#[async_trait]
impl ResourceResolver for TestResolver {
    async fn resolve(&self, info: &TrackInfo) -> Result<ResolvedTrack, PlaybackError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.lookup(&info.identifier) {
            Script::ResolveFails => Err(PlaybackError::resolution(
                format!("{} is unavailable", info.identifier),
                "NotFound",
            )),
            _ => Ok(ResolvedTrack {
                url: format!("mem://{}", info.identifier),
                protocol: "mem".into(),
                format: AudioFormat::Pcm,
                additional_data: serde_json::json!({}),
            }),
        }
    }

    async fn open(
        &self,
        info: &TrackInfo,
        _resolved: &ResolvedTrack,
    ) -> Result<AudioStream, PlaybackError> {
        match self.lookup(&info.identifier) {
            Script::OpenFails => Err(PlaybackError::build("stream refused", "OpenError")),
            Script::Broken(frames) => Ok(Box::new(
                tokio::io::repeat(0)
                    .take((frames * FRAME_BYTES) as u64)
                    .chain(BrokenReader),
            )),
            Script::Frames(frames) => Ok(silence(frames)),
            Script::ResolveFails => unreachable!("resolution already failed"),
        }
    }

    fn source_names(&self) -> Vec<String> {
        vec!["test".into()]
    }
}

/// Records every build request and serves long silent streams.
#[derive(Default)]
pub struct TestPipeline {
    pub requests: Mutex<Vec<FilterRequest>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl FilterPipeline for TestPipeline {
    fn configure(&self, filters: Filters) -> Filters {
        clamp(filters)
    }

    async fn build(&self, request: FilterRequest) -> Result<AudioResource, PlaybackError> {
        self.requests.lock().push(request);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlaybackError::build("transcoder crashed", "FilterError: exit 1"));
        }
        Ok(AudioResource::new(silence(30_000), AudioFormat::Pcm).with_transcoder(Some(4242)))
    }
}

/// Hands out dry sessions and keeps them reachable for the test.
#[derive(Default)]
pub struct RecordingConnector {
    sessions: Mutex<Vec<Arc<DrySession>>>,
}

impl RecordingConnector {
    pub fn last(&self) -> Arc<DrySession> {
        self.sessions.lock().last().cloned().expect("no voice session joined")
    }

    pub fn joined(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl VoiceConnector for RecordingConnector {
    fn join(&self, guild_id: &GuildId, user_id: UserId) -> VoiceLink {
        let (session, events) = DrySession::new(guild_id.clone(), user_id, None);
        let session = Arc::new(session);
        self.sessions.lock().push(session.clone());
        VoiceLink {
            session: session as Arc<dyn VoiceSession>,
            events,
        }
    }
}

pub struct Harness {
    pub handle: PlayerHandle,
    pub events: flume::Receiver<OutgoingMessage>,
    pub resolver: Arc<TestResolver>,
    pub pipeline: Arc<TestPipeline>,
    pub connector: Arc<RecordingConnector>,
    pub metrics: PlayerMetrics,
    pub registry: Arc<PlayerRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let resolver = Arc::new(TestResolver::default());
        let pipeline = Arc::new(TestPipeline::default());
        let connector = Arc::new(RecordingConnector::default());
        let metrics = PlayerMetrics::new().unwrap();
        let registry = Arc::new(PlayerRegistry::new());
        let (tx, events) = flume::unbounded();

        let services = PlayerServices {
            resolver: resolver.clone(),
            pipeline: pipeline.clone(),
            connector: connector.clone(),
            metrics: metrics.clone(),
            config: Arc::new(config),
        };
        let guild_id = GuildId::from("G1");
        let handle = PlayerHandle::spawn(guild_id.clone(), UserId(1), services, tx, &registry);
        registry.insert(guild_id, handle.clone());

        Self {
            handle,
            events,
            resolver,
            pipeline,
            connector,
            metrics,
            registry,
        }
    }

    pub async fn connect(&self) -> Player {
        self.handle
            .update_voice(voice_state())
            .await
            .expect("player gone")
    }

    pub fn session(&self) -> Arc<DrySession> {
        self.connector.last()
    }

    /// Lifecycle events emitted so far, one short label each.
    pub fn drain_events(&self) -> Vec<String> {
        self.events
            .try_iter()
            .filter_map(|msg| match msg {
                OutgoingMessage::Event { event } => Some(label(&event)),
                _ => None,
            })
            .collect()
    }

    pub fn drain(&self) -> Vec<OutgoingMessage> {
        self.events.try_iter().collect()
    }
}

/// Node-wide services backed by the in-memory doubles.
pub fn services() -> PlayerServices {
    PlayerServices {
        resolver: Arc::new(TestResolver::default()),
        pipeline: Arc::new(TestPipeline::default()),
        connector: Arc::new(RecordingConnector::default()),
        metrics: PlayerMetrics::new().unwrap(),
        config: Arc::new(Config::default()),
    }
}

pub fn voice_state() -> VoiceState {
    VoiceState {
        token: "token".into(),
        endpoint: "voice.example:443".into(),
        session_id: "voice-session".into(),
    }
}

pub fn track(identifier: &str) -> Track {
    Track::new(TrackInfo {
        identifier: identifier.into(),
        title: identifier.into(),
        author: "tester".into(),
        length: 180_000,
        is_seekable: true,
        source_name: "test".into(),
        ..Default::default()
    })
}

pub fn label(event: &NodeEvent) -> String {
    match event {
        NodeEvent::TrackStart { track, .. } => format!("start:{}", track.info.identifier),
        NodeEvent::TrackEnd { track, reason, .. } => {
            let reason = serde_json::to_value(reason).unwrap();
            format!("end:{}:{}", track.info.identifier, reason.as_str().unwrap())
        }
        NodeEvent::TrackException { track, .. } => format!("exception:{}", track.info.identifier),
        NodeEvent::WebSocketClosed { code, .. } => format!("closed:{code}"),
    }
}

/// Lets spawned tasks run without moving paused time noticeably.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
