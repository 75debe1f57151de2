// src/api/summarize.rs
// POST /api/summarize: single-document summarization forwarder

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

use super::chat::StreamQuery;
use super::error::{ApiError, ApiResult, IntoApiError};
use super::stream::{RelayOptions, relay};
use crate::prompt;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub document: Option<String>,
}

pub const NO_DOCUMENT: &str = "No document provided";
pub const SUMMARIZE_FAILURE: &str = "Failed to process the document.";

pub async fn summarize_handler(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let deadline = Instant::now() + state.config.summarize_max_duration();
    let protocol = StreamQuery::resolve(query, state.config.stream_protocol)?;

    let body = body.map_err(|e| ApiError::custom(e.status(), e.body_text()))?;
    let request: SummarizeRequest =
        serde_json::from_slice::<SummarizeRequest>(&body).into_internal_error(SUMMARIZE_FAILURE)?;

    let document = match request.document {
        Some(doc) if !doc.is_empty() => doc,
        _ => return Err(ApiError::bad_request(NO_DOCUMENT)),
    };

    info!(
        "Summarize request: {} chars, model={}",
        document.len(),
        state.provider.model()
    );

    let messages = prompt::summary_messages(&document);

    let tokens = match timeout_at(deadline, state.provider.stream_chat(messages)).await {
        Ok(Ok(tokens)) => tokens,
        Ok(Err(e)) => {
            error!("Error in summarization via {}: {}", state.provider.name(), e);
            return Err(ApiError::internal(SUMMARIZE_FAILURE));
        }
        Err(_) => {
            error!(
                "Summarization via {} did not respond within {}s",
                state.provider.name(),
                state.config.summarize_max_duration_secs
            );
            return Err(ApiError::internal(SUMMARIZE_FAILURE));
        }
    };

    Ok(relay(
        tokens,
        RelayOptions {
            route: "summarize",
            protocol,
            deadline,
        },
    ))
}
