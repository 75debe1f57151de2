// src/api/chat.rs
// POST /api/chat: legal-only chat forwarder

use axum::{
    body::Bytes,
    extract::{
        Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    response::Response,
};
use serde::Deserialize;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info};

use super::error::{ApiError, ApiResult};
use super::stream::{RelayOptions, relay};
use crate::config::StreamProtocol;
use crate::llm::ChatMessage;
use crate::prompt;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Per-request override of the configured wire protocol
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub protocol: Option<StreamProtocol>,
}

impl StreamQuery {
    pub fn resolve(
        query: Result<Query<StreamQuery>, QueryRejection>,
        default: StreamProtocol,
    ) -> ApiResult<StreamProtocol> {
        let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(query.protocol.unwrap_or(default))
    }
}

pub const CHAT_UPSTREAM_FAILURE: &str = "Failed to generate a response.";

pub async fn chat_handler(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    // One budget covers waiting for upstream headers and relaying the body
    let deadline = Instant::now() + state.config.chat_max_duration();
    let protocol = StreamQuery::resolve(query, state.config.stream_protocol)?;

    // Parsed by hand so clients that omit the JSON content type still work
    let body = body.map_err(|e| ApiError::custom(e.status(), e.body_text()))?;
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid chat request: {e}")))?;

    if request.messages.is_empty() {
        return Err(ApiError::bad_request("No messages provided"));
    }

    info!(
        "Chat request: {} turns, model={}, protocol={}",
        request.messages.len(),
        state.provider.model(),
        protocol.as_str()
    );

    let messages = prompt::chat_messages(request.messages);

    let tokens = match timeout_at(deadline, state.provider.stream_chat(messages)).await {
        Ok(Ok(tokens)) => tokens,
        Ok(Err(e)) => {
            error!("Chat upstream failed via {}: {}", state.provider.name(), e);
            return Err(ApiError::bad_gateway(CHAT_UPSTREAM_FAILURE));
        }
        Err(_) => {
            error!(
                "Chat upstream via {} did not respond within {}s",
                state.provider.name(),
                state.config.chat_max_duration_secs
            );
            return Err(ApiError::bad_gateway(CHAT_UPSTREAM_FAILURE));
        }
    };

    Ok(relay(
        tokens,
        RelayOptions {
            route: "chat",
            protocol,
            deadline,
        },
    ))
}
