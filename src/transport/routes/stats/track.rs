use axum::{
    extract::Query,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

use crate::{common::NodeError, protocol::tracks::Track};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeTrackQuery {
    pub encoded_track: Option<String>,
    /// Older clients send `track`.
    pub track: Option<String>,
}

/// GET /v4/decodetrack?encodedTrack=...
pub async fn decode_track(Query(params): Query<DecodeTrackQuery>) -> Response {
    let Some(encoded) = params.encoded_track.or(params.track) else {
        return NodeError::bad_request("No track to decode provided", "/v4/decodetrack")
            .into_response();
    };
    tracing::info!("GET /v4/decodetrack: encodedTrack={}", encoded);

    match Track::decode(&encoded) {
        Some(track) => Json(track).into_response(),
        None => NodeError::bad_request("Invalid track encoding", "/v4/decodetrack").into_response(),
    }
}
