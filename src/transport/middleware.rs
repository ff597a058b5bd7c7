use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::server::AppState;

/// Why a request failed the password check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Invalid,
}

pub fn authorize(headers: &HeaderMap, password: &str) -> Result<(), AuthFailure> {
    match headers.get("authorization").and_then(|h| h.to_str().ok()) {
        Some(auth) if auth == password => Ok(()),
        Some(_) => Err(AuthFailure::Invalid),
        None => Err(AuthFailure::Missing),
    }
}

pub async fn check_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match authorize(req.headers(), &state.config.server.password) {
        Ok(()) => Ok(next.run(req).await),
        Err(failure) => {
            warn!("{} {}: authorization failed ({:?})", req.method(), req.uri().path(), failure);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn add_response_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Resonode-Api-Version", HeaderValue::from_static("4"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_must_match_exactly() {
        let mut headers = HeaderMap::new();
        assert_eq!(authorize(&headers, "secret"), Err(AuthFailure::Missing));

        headers.insert("authorization", HeaderValue::from_static("Secret"));
        assert_eq!(authorize(&headers, "secret"), Err(AuthFailure::Invalid));

        headers.insert("authorization", HeaderValue::from_static("secret"));
        assert_eq!(authorize(&headers, "secret"), Ok(()));
    }
}
