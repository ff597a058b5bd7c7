use async_trait::async_trait;
use tracing::{debug, info, trace};

use super::{
    http::HttpSource,
    local::LocalSource,
    plugin::{BoxedSource, ResolvedTrack, ResourceResolver},
};
use crate::{
    audio::AudioStream,
    common::{AnyResult, PlaybackError, http::HttpClient},
    configs::SourcesConfig,
    protocol::tracks::TrackInfo,
};

/// Source Manager
pub struct SourceManager {
    pub sources: Vec<BoxedSource>,
}

impl SourceManager {
    /// Create a new SourceManager with the sources enabled in `config`.
    pub fn new(config: &SourcesConfig) -> AnyResult<Self> {
        let mut sources: Vec<BoxedSource> = Vec::new();

        if config.http {
            info!("Loaded source: http");
            sources.push(Box::new(HttpSource::new(HttpClient::new(
                &config.user_agent,
            )?)));
        }

        if config.local {
            info!("Loaded source: local");
            sources.push(Box::new(LocalSource::new()));
        }

        Ok(Self::with_sources(sources))
    }

    pub fn with_sources(sources: Vec<BoxedSource>) -> Self {
        Self { sources }
    }

    /// The source named by `sourceName`, else the first that accepts the
    /// track's URI or identifier.
    fn source_for(&self, info: &TrackInfo) -> Option<&BoxedSource> {
        if let Some(source) = self.sources.iter().find(|s| s.name() == info.source_name) {
            return Some(source);
        }

        let identifier = info.uri.as_deref().unwrap_or(&info.identifier);
        self.sources.iter().find(|s| s.can_handle(identifier))
    }
}

#[async_trait]
impl ResourceResolver for SourceManager {
    async fn resolve(&self, info: &TrackInfo) -> Result<ResolvedTrack, PlaybackError> {
        let Some(source) = self.source_for(info) else {
            debug!(
                "No source could handle '{}' ({})",
                info.identifier, info.source_name
            );
            return Err(PlaybackError::resolution(
                format!("Source '{}' is not available", info.source_name),
                "UnknownSource",
            ));
        };

        trace!(
            "Resolving playable track for '{}' with source: {}",
            info.identifier,
            source.name()
        );
        source.resolve(info).await
    }

    async fn open(
        &self,
        info: &TrackInfo,
        resolved: &ResolvedTrack,
    ) -> Result<AudioStream, PlaybackError> {
        match self.source_for(info) {
            Some(source) => source.open(resolved).await,
            None => Err(PlaybackError::resolution(
                format!("Source '{}' is not available", info.source_name),
                "UnknownSource",
            )),
        }
    }

    /// Get names of all registered sources
    fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }
}
