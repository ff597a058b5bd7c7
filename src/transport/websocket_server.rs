use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    common::{SessionId, UserId},
    protocol::{
        OutgoingMessage,
        opcodes::{IncomingMessage, handle_op},
    },
    server::{AppState, Session},
    transport::middleware::{AuthFailure, authorize},
};

pub async fn websocket_handler(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<Response, (StatusCode, &'static str)> {
    if let Err(failure) = authorize(&headers, &state.config.server.password) {
        match failure {
            AuthFailure::Missing => warn!("Authorization failed: Missing Authorization header"),
            AuthFailure::Invalid => warn!("Authorization failed: Invalid password provided"),
        }
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    let user_id = headers
        .get("user-id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|id| *id != 0)
        .map(UserId::from)
        .ok_or((StatusCode::BAD_REQUEST, "Missing or invalid User-Id header"))?;

    match headers.get("client-name").and_then(|h| h.to_str().ok()) {
        Some(name) => info!("Incoming connection from client: {}", name),
        None => warn!("Client connected without 'Client-Name' header"),
    }

    let mut response = ws
        .on_upgrade(move |socket| handle_socket(socket, state, user_id))
        .into_response();
    let headers = response.headers_mut();
    headers.insert("Session-Resumed", HeaderValue::from_static("false"));
    headers.insert("Lavalink-Major-Version", HeaderValue::from_static("4"));

    Ok(response)
}

fn stats_timer(seconds: u64) -> Option<Interval> {
    if seconds == 0 {
        return None;
    }
    let period = Duration::from_secs(seconds);
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(timer)
}

async fn next_stats_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn send(socket: &mut WebSocket, message: &OutgoingMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            error!("Failed to serialize outgoing message: {}", e);
            Ok(())
        }
    }
}

pub async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let (tx, rx) = flume::unbounded();
    let session_id = SessionId::generate();
    let session = Arc::new(Session::new(session_id.clone(), user_id, tx));
    state.sessions.insert(session_id.clone(), session.clone());
    info!("WebSocket connected: session={} user={}", session_id, user_id);

    let ready = OutgoingMessage::Ready {
        resumed: false,
        session_id: session_id.clone(),
    };
    if send(&mut socket, &ready).await.is_err() {
        close_session(&state, &session_id);
        return;
    }

    let mut stats = stats_timer(state.config.server.stats_interval);

    loop {
        tokio::select! {
            _ = next_stats_tick(&mut stats) => {
                let message = OutgoingMessage::Stats { stats: state.collect_stats() };
                if let Err(e) = send(&mut socket, &message).await {
                    error!("Socket send error (stats): session={} err={}", session_id, e);
                    break;
                }
            }
            Ok(message) = rx.recv_async() => {
                if let Err(e) = send(&mut socket, &message).await {
                    error!("Socket send error: session={} err={}", session_id, e);
                    break;
                }
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error: session={} err={}", session_id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<IncomingMessage>(&text) {
                        Ok(op) => {
                            if let Err(e) = handle_op(op, &state, &session) {
                                warn!("Rejected op: session={} err={}", session_id, e);
                            }
                        }
                        Err(e) => warn!("Malformed op: session={} err={}", session_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    close_session(&state, &session_id);
}

fn close_session(state: &AppState, session_id: &SessionId) {
    if let Some((_, session)) = state.sessions.remove(session_id) {
        info!("Connection closed: {}", session_id);
        session.shutdown();
    } else {
        debug!("Session {} already removed", session_id);
    }
}
