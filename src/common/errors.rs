use serde::{Deserialize, Serialize};

/// Exception severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Common,
    Suspicious,
    Fault,
}

/// Failures the playback state machine recovers from locally.
///
/// None of these ever reach the control client as an error value; they are
/// converted into a `TrackExceptionEvent` + `TrackEndEvent(loadFailed)` pair.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    /// The resolver could not produce a stream for the track.
    #[error("{message}")]
    Resolution {
        message: String,
        severity: Severity,
        cause: String,
    },

    /// Building the playable resource (direct or through filters) failed.
    #[error("{message}")]
    Build { message: String, cause: String },

    /// The voice transport reported a stream error.
    #[error("{0}")]
    Transport(String),

    #[error("voice connection was not ready within {0} ms")]
    ConnectTimeout(u64),

    #[error("voice connection closed before playback could start")]
    ConnectionClosed,
}

impl PlaybackError {
    pub fn resolution(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            severity: Severity::Common,
            cause: cause.into(),
        }
    }

    pub fn build(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
            cause: cause.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Resolution { severity, .. } => *severity,
            Self::ConnectTimeout(_) => Severity::Common,
            Self::Build { .. } | Self::Transport(_) | Self::ConnectionClosed => Severity::Fault,
        }
    }

    pub fn cause(&self) -> String {
        match self {
            Self::Resolution { cause, .. } | Self::Build { cause, .. } => cause.clone(),
            Self::Transport(message) => format!("TransportError: {message}"),
            Self::ConnectTimeout(_) => "TimeoutError: voice connection".to_string(),
            Self::ConnectionClosed => "ConnectionClosed: voice connection".to_string(),
        }
    }
}

/// JSON error body returned by the REST routes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeError {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// HTTP status code.
    pub status: u16,
    /// HTTP status reason phrase (e.g. "Bad Request").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// The request path that caused the error.
    pub path: String,
}

impl NodeError {
    fn new(status: u16, error: &str, message: String, path: String) -> Self {
        Self {
            timestamp: crate::server::now_ms(),
            status,
            error: error.into(),
            message,
            path,
        }
    }

    pub fn bad_request(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(400, "Bad Request", message.into(), path.into())
    }

    pub fn not_found(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(404, "Not Found", message.into(), path.into())
    }
}

impl axum::response::IntoResponse for NodeError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status)
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self)).into_response()
    }
}
