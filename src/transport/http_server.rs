use std::sync::Arc;

use axum::{Router, middleware, routing::get};

use crate::{
    server::AppState,
    transport::{
        middleware::{add_response_headers, check_auth},
        routes::{player, stats},
        websocket_server::websocket_handler,
    },
};

const API_V4: &str = "/v4";

pub fn router(state: Arc<AppState>) -> Router {
    let v4_routes = Router::new()
        .route("/info", get(stats::get_info))
        .route("/stats", get(stats::get_stats))
        .route("/decodetrack", get(stats::decode_track))
        .route("/sessions/{session_id}/players", get(player::get_players))
        .route(
            "/sessions/{session_id}/players/{guild_id}",
            get(player::get_player)
                .patch(player::update_player)
                .delete(player::destroy_player),
        );

    // the websocket checks credentials itself so it can answer with a reason
    let authed = Router::new()
        .nest(API_V4, v4_routes)
        .route("/version", get(stats::get_version))
        .layer(middleware::from_fn_with_state(state.clone(), check_auth));

    Router::new()
        .route("/v4/websocket", get(websocket_handler))
        .route("/metrics", get(stats::get_metrics))
        .merge(authed)
        .layer(middleware::from_fn(add_response_headers))
        .with_state(state)
}
