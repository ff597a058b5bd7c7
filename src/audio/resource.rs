use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
};

use tokio::io::AsyncRead;

use crate::common::AudioFormat;

pub type AudioStream = Box<dyn AsyncRead + Send + Unpin>;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared linear volume of one stream, stored as `f32` bits.
#[derive(Clone)]
pub struct VolumeHandle(Arc<AtomicU32>);

impl VolumeHandle {
    pub fn new(volume: f32) -> Self {
        Self(Arc::new(AtomicU32::new(volume.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, volume: f32) {
        self.0.store(volume.max(0.0).to_bits(), Ordering::Release);
    }
}

impl Default for VolumeHandle {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// A playable stream handed to the voice transport.
///
/// Every resource gets a process-unique id so transport events can be
/// matched to the resource they describe.
pub struct AudioResource {
    id: u64,
    format: AudioFormat,
    stream: AudioStream,
    volume: VolumeHandle,
    transcoder: Option<u32>,
}

impl AudioResource {
    pub fn new(stream: AudioStream, format: AudioFormat) -> Self {
        Self {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            format,
            stream,
            volume: VolumeHandle::default(),
            transcoder: None,
        }
    }

    /// Marks the resource as produced by the transcoder process `pid`.
    pub fn with_transcoder(mut self, pid: Option<u32>) -> Self {
        self.transcoder = pid;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn transcoder(&self) -> Option<u32> {
        self.transcoder
    }

    pub fn volume(&self) -> &VolumeHandle {
        &self.volume
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.set(volume);
    }

    pub fn into_parts(self) -> (u64, AudioStream, VolumeHandle) {
        (self.id, self.stream, self.volume)
    }
}

impl fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioResource")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("volume", &self.volume.get())
            .field("transcoder", &self.transcoder)
            .finish_non_exhaustive()
    }
}
