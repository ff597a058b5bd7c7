use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

use crate::{
    audio::filters::disabled_filters,
    common::{GuildId, NodeError, SessionId},
    player::{Player, PlayerUpdate, TrackEncoded},
    protocol::tracks::Track,
    server::AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayerQuery {
    #[serde(default)]
    pub no_replace: bool,
}

/// PATCH /v4/sessions/{sessionId}/players/{guildId}
///
/// Applied in order: voice, volume, pause, track, filters. A volume sent
/// alongside a new track is therefore staged and applied when it starts.
pub async fn update_player(
    Path((session_id, guild_id)): Path<(SessionId, GuildId)>,
    Query(query): Query<UpdatePlayerQuery>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlayerUpdate>,
) -> Response {
    tracing::info!(
        "PATCH /v4/sessions/{}/players/{} {:?}",
        session_id,
        guild_id,
        body
    );
    let path = format!("/v4/sessions/{}/players/{}", session_id, guild_id);

    let Some(session) = state.session(&session_id) else {
        return NodeError::not_found("Session not found", path).into_response();
    };

    if let Some(filters) = &body.filters {
        let config = &state.config.filters;
        let invalid = if config.enabled {
            disabled_filters(filters, config)
        } else {
            Vec::new()
        };
        if !invalid.is_empty() {
            let message = format!(
                "Following filters are disabled in the config: {}",
                invalid.join(", ")
            );
            return NodeError::bad_request(message, path).into_response();
        }
    }

    let track = match body.track_change() {
        Some((TrackEncoded::Set(encoded), user_data)) => match Track::decode(&encoded) {
            Some(track) => Some(Some(track.with_user_data(user_data))),
            None => return NodeError::bad_request("Invalid encoded track", path).into_response(),
        },
        Some((TrackEncoded::Clear, _)) => Some(None),
        None => None,
    };

    let player = session.player(&guild_id, &state.services);

    if let Some(voice) = body.voice {
        let _ = player.update_voice(voice).await;
    }
    if let Some(volume) = body.volume {
        let _ = player.volume(volume).await;
    }
    if let Some(paused) = body.paused {
        let _ = player.pause(paused).await;
    }
    match track {
        Some(Some(track)) => {
            let _ = player.play(track, query.no_replace).await;
        }
        Some(None) => {
            let _ = player.stop().await;
        }
        None => {}
    }

    let end_time = body.end_time.and_then(|e| e.as_ms());
    let filters = match body.filters {
        Some(filters) => Some(filters),
        // a new end time re-applies the current filters
        None if end_time.is_some() => player.snapshot().await.map(|p| p.filters),
        None => None,
    };
    if let Some(filters) = filters {
        let _ = player.filters(filters, end_time).await;
    }

    let snapshot = player.snapshot().await;
    Json(snapshot.unwrap_or_else(|| Player::new(guild_id))).into_response()
}
