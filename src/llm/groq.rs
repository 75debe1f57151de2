//! Groq provider (OpenAI-compatible Chat Completions API)
//!
//! Requests a token stream and pumps the SSE response into a bounded
//! channel. The channel is what gives the relay backpressure: when the
//! client reads slowly, `send` waits and the upstream body is not polled.
//! When the client disconnects, `send` fails and the upstream response is
//! dropped, which releases the connection.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client as HttpClient, header};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::sse::{SseDecoder, SseFrame};
use super::{ChatMessage, ChatProvider, FinishReason, LlmError, StreamEvent, TokenStream};
use crate::config::JurisConfig;

/// Chunks buffered between the upstream reader and the relay
const STREAM_CHANNEL_CAPACITY: usize = 32;

pub struct GroqProvider {
    client: HttpClient,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GroqProvider {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, LlmError> {
        // No overall timeout: stream length is bounded by the relay deadline
        let client = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &JurisConfig) -> Result<Self, LlmError> {
        Self::new(
            config.groq_api_key.clone(),
            config.chat_completions_url(),
            config.model.clone(),
            config.connect_timeout(),
        )
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: &messages,
            stream: true,
        };

        debug!("Groq request: model={}, turns={}", self.model, messages.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "<no body>".into());
            return Err(LlmError::Status { status, body });
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(pump_sse(response, tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

type EventSender = mpsc::Sender<Result<StreamEvent, LlmError>>;

/// Read upstream SSE and forward events until `[DONE]`, an error, or the
/// receiver closes. Returning drops `response` and with it the connection.
async fn pump_sse(response: reqwest::Response, tx: EventSender) {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        // A silent upstream must not outlive the consumer
        let next = tokio::select! {
            next = stream.next() => next,
            _ = tx.closed() => {
                debug!("Receiver dropped while waiting on upstream, releasing connection");
                return;
            }
        };
        let Some(chunk) = next else {
            break;
        };

        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(Err(LlmError::Transport(e))).await;
                return;
            }
        };

        for frame in decoder.push(&chunk) {
            if !forward_frame(&frame, &tx).await {
                return;
            }
        }
    }

    for frame in decoder.finish() {
        if !forward_frame(&frame, &tx).await {
            return;
        }
    }
}

/// Returns false when pumping should stop.
async fn forward_frame(frame: &SseFrame, tx: &EventSender) -> bool {
    match parse_frame(frame) {
        FrameOutcome::Done => false,
        FrameOutcome::Events(events) => {
            for event in events {
                let is_error = event.is_err();
                if tx.send(event).await.is_err() {
                    debug!("Receiver dropped, releasing upstream stream");
                    return false;
                }
                if is_error {
                    return false;
                }
            }
            true
        }
    }
}

#[derive(Debug)]
enum FrameOutcome {
    Done,
    Events(Vec<Result<StreamEvent, LlmError>>),
}

fn parse_frame(frame: &SseFrame) -> FrameOutcome {
    if frame.is_done() {
        return FrameOutcome::Done;
    }

    if let Some(err) = frame.try_parse::<StreamErrorFrame>() {
        return FrameOutcome::Events(vec![Err(LlmError::Stream(err.error.message))]);
    }

    let Some(chunk) = frame.try_parse::<ChatStreamChunk>() else {
        warn!("Skipping unparseable SSE frame: {}", frame.preview());
        return FrameOutcome::Events(Vec::new());
    };

    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            events.push(Ok(StreamEvent::TextDelta(content)));
        }
        if let Some(reason) = choice.finish_reason {
            let reason = match reason.as_str() {
                "length" => FinishReason::Length,
                _ => FinishReason::Stop,
            };
            events.push(Ok(StreamEvent::Finished(reason)));
        }
    }
    FrameOutcome::Events(events)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamErrorFrame {
    error: StreamErrorBody,
}

#[derive(Deserialize)]
struct StreamErrorBody {
    message: String,
}
