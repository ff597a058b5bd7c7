use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    common::{GuildId, NodeError, SessionId},
    server::AppState,
};

/// DELETE /v4/sessions/{sessionId}/players/{guildId}
pub async fn destroy_player(
    Path((session_id, guild_id)): Path<(SessionId, GuildId)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::info!("DELETE /v4/sessions/{}/players/{}", session_id, guild_id);

    match state.session(&session_id) {
        Some(session) => {
            session.destroy_player(&guild_id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => NodeError::not_found(
            "Session not found",
            format!("/v4/sessions/{}/players/{}", session_id, guild_id),
        )
        .into_response(),
    }
}
