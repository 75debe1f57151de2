// src/api/auth.rs
// Optional bearer-token gate. Tokens are issued by the external identity
// provider; the server only compares against JURIS_ACCESS_TOKEN.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::error::ApiError;
use crate::state::AppState;

pub const SIGN_IN_REQUIRED: &str = "Sign in required";

pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.access_token.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if provided == Some(expected) {
        next.run(request).await
    } else {
        warn!(
            "Rejected {} {}: {}",
            request.method(),
            request.uri().path(),
            if provided.is_some() { "bad token" } else { "no token" }
        );
        ApiError::unauthorized(SIGN_IN_REQUIRED).into_response()
    }
}
