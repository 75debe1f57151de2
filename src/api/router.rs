// src/api/router.rs
// HTTP router composition

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::{
    auth::require_token, chat::chat_handler, extract::extract_handler,
    status::status_handler, summarize::summarize_handler,
};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    // Everything except status sits behind the token gate
    let gated = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/summarize", post(summarize_handler))
        .route("/api/extract", post(extract_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(body_limit);

    Router::new()
        .route("/api/status", get(status_handler))
        .merge(gated)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        match HeaderValue::from_str(origin.trim()) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                warn!("Invalid JURIS_CORS_ORIGIN '{}', allowing any origin", origin);
                AllowOrigin::any()
            }
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
