use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, header::CONTENT_TYPE};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::{
    audio::AudioStream,
    common::{AudioFormat, PlaybackError, Severity},
    protocol::tracks::TrackInfo,
    sources::plugin::{ResolvedTrack, SourcePlugin},
};

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn scheme(url: &str) -> Option<&'static str> {
        let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
        if lower.starts_with("https://") {
            Some("https")
        } else if lower.starts_with("http://") {
            Some("http")
        } else {
            None
        }
    }
}

#[async_trait]
impl SourcePlugin for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn can_handle(&self, identifier: &str) -> bool {
        Self::scheme(identifier).is_some()
    }

    async fn resolve(&self, info: &TrackInfo) -> Result<ResolvedTrack, PlaybackError> {
        let url = info.uri.as_deref().unwrap_or(&info.identifier);
        let Some(protocol) = Self::scheme(url) else {
            return Err(PlaybackError::resolution(
                format!("'{url}' is not an http(s) URL"),
                "UnsupportedProtocol",
            ));
        };

        Ok(ResolvedTrack {
            url: url.to_string(),
            protocol: protocol.to_string(),
            format: AudioFormat::from_url(url),
            additional_data: serde_json::json!({}),
        })
    }

    async fn open(&self, resolved: &ResolvedTrack) -> Result<AudioStream, PlaybackError> {
        let response = self
            .client
            .get(&resolved.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("HTTP stream request failed for {}: {}", resolved.url, e);
                PlaybackError::Resolution {
                    message: format!("Failed to open stream: {e}"),
                    severity: Severity::Suspicious,
                    cause: format!("HttpError: {e}"),
                }
            })?;

        if let Some(mime) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            debug!(
                "Opened {} ({}, detected {:?})",
                resolved.url,
                mime,
                AudioFormat::from_mime(mime)
            );
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> HttpSource {
        HttpSource::new(Client::new())
    }

    #[test]
    fn handles_only_http_urls() {
        let source = source();
        assert!(source.can_handle("https://cdn.example/a.mp3"));
        assert!(source.can_handle("HTTP://cdn.example/a.mp3"));
        assert!(!source.can_handle("file:///srv/a.mp3"));
        assert!(!source.can_handle("ytsearch:song"));
    }

    #[tokio::test]
    async fn resolves_uri_with_format_hint() {
        let info = TrackInfo {
            identifier: "a".into(),
            uri: Some("https://cdn.example/a.ogg".into()),
            ..Default::default()
        };
        let resolved = source().resolve(&info).await.unwrap();
        assert_eq!(resolved.protocol, "https");
        assert_eq!(resolved.format, AudioFormat::Ogg);
        assert_eq!(resolved.url, "https://cdn.example/a.ogg");
    }

    #[tokio::test]
    async fn rejects_non_http_tracks() {
        let info = TrackInfo {
            identifier: "not-a-url".into(),
            ..Default::default()
        };
        let err = source().resolve(&info).await.unwrap_err();
        assert_eq!(err.cause(), "UnsupportedProtocol");
    }
}
