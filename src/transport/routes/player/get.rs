use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};

use crate::{
    common::{GuildId, NodeError, SessionId},
    player::{Player, Players},
    server::AppState,
};

/// GET /v4/sessions/{sessionId}/players
pub async fn get_players(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::info!("GET /v4/sessions/{}/players", session_id);
    let Some(session) = state.session(&session_id) else {
        return NodeError::not_found(
            format!("Session not found: {}", session_id),
            format!("/v4/sessions/{}/players", session_id),
        )
        .into_response();
    };

    let handles: Vec<_> = session.players.iter().map(|kv| kv.value().clone()).collect();
    let mut players = Vec::with_capacity(handles.len());
    for handle in handles {
        // destroyed while we were collecting
        if let Some(player) = handle.snapshot().await {
            players.push(player);
        }
    }
    Json(Players { players }).into_response()
}

/// GET /v4/sessions/{sessionId}/players/{guildId}
pub async fn get_player(
    Path((session_id, guild_id)): Path<(SessionId, GuildId)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::info!("GET /v4/sessions/{}/players/{}", session_id, guild_id);
    let Some(session) = state.session(&session_id) else {
        return NodeError::not_found(
            format!("Session not found: {}", session_id),
            format!("/v4/sessions/{}/players/{}", session_id, guild_id),
        )
        .into_response();
    };

    let player = match session.get(&guild_id) {
        Some(handle) => handle.snapshot().await,
        None => None,
    };
    Json(player.unwrap_or_else(|| Player::new(guild_id))).into_response()
}
