use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    audio::AudioStream,
    common::{AudioFormat, PlaybackError},
    protocol::tracks::TrackInfo,
    sources::plugin::{ResolvedTrack, SourcePlugin},
};

pub struct LocalSource;

impl LocalSource {
    pub fn new() -> Self {
        Self
    }

    fn path_of(identifier: &str) -> &str {
        identifier.strip_prefix("file://").unwrap_or(identifier)
    }
}

impl Default for LocalSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn can_handle(&self, identifier: &str) -> bool {
        identifier.starts_with("file://") || identifier.starts_with('/')
    }

    async fn resolve(&self, info: &TrackInfo) -> Result<ResolvedTrack, PlaybackError> {
        let path = Self::path_of(info.uri.as_deref().unwrap_or(&info.identifier));

        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            PlaybackError::resolution(format!("Cannot read '{path}': {e}"), "FileNotFound")
        })?;
        if !meta.is_file() {
            return Err(PlaybackError::resolution(
                format!("'{path}' is not a file"),
                "NotAFile",
            ));
        }

        let format = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(AudioFormat::from_ext)
            .unwrap_or(AudioFormat::Unknown);

        Ok(ResolvedTrack {
            url: path.to_string(),
            protocol: "file".to_string(),
            format,
            additional_data: serde_json::json!({}),
        })
    }

    async fn open(&self, resolved: &ResolvedTrack) -> Result<AudioStream, PlaybackError> {
        debug!("Opening local file {}", resolved.url);
        let file = tokio::fs::File::open(&resolved.url).await.map_err(|e| {
            PlaybackError::resolution(format!("Cannot open '{}': {e}", resolved.url), "IoError")
        })?;
        Ok(Box::new(file))
    }
}
