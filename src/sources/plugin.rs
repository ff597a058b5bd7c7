use async_trait::async_trait;

use crate::{
    audio::AudioStream,
    common::{AudioFormat, PlaybackError},
    protocol::tracks::TrackInfo,
};

/// Where a track's audio can be read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub url: String,
    /// `http`, `https` or `file`.
    pub protocol: String,
    pub format: AudioFormat,
    /// Source specific hints for opening the stream (e.g. request headers).
    pub additional_data: serde_json::Value,
}

/// Trait that all source plugins must implement.
#[async_trait]
pub trait SourcePlugin: Send + Sync {
    /// Unique identifier for this source, matched against `sourceName`.
    fn name(&self) -> &str;

    /// Check if this source can handle the given identifier or URI.
    fn can_handle(&self, identifier: &str) -> bool;

    /// Locate the playable stream of a decoded track.
    async fn resolve(&self, info: &TrackInfo) -> Result<ResolvedTrack, PlaybackError>;

    /// Open the stream located by [`SourcePlugin::resolve`].
    async fn open(&self, resolved: &ResolvedTrack) -> Result<AudioStream, PlaybackError>;
}

pub type BoxedSource = Box<dyn SourcePlugin>;

/// What the player needs from track resolution.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn resolve(&self, info: &TrackInfo) -> Result<ResolvedTrack, PlaybackError>;

    async fn open(
        &self,
        info: &TrackInfo,
        resolved: &ResolvedTrack,
    ) -> Result<AudioStream, PlaybackError>;

    fn source_names(&self) -> Vec<String>;
}
