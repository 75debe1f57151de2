//! Relay of model tokens to the HTTP response body
//!
//! A pull-based pipe: the body is polled by hyper, which polls the token
//! stream, which awaits the provider's bounded channel. Nothing is buffered
//! beyond that channel. Dropping the body (client disconnect) drops the
//! token stream and with it the upstream connection.

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::StreamProtocol;
use crate::llm::{FinishReason, StreamEvent, TokenStream};

const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Route name for log lines
    pub route: &'static str,
    pub protocol: StreamProtocol,
    /// Taken when the request arrived; shared with the upstream call
    pub deadline: Instant,
}

/// How the relay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Finished(FinishReason),
    Deadline,
    UpstreamError,
}

impl Outcome {
    fn finish_reason(&self) -> &'static str {
        match self {
            Outcome::Finished(reason) => reason.as_str(),
            Outcome::Deadline => "length",
            Outcome::UpstreamError => "error",
        }
    }
}

/// Streaming 200 response for a token stream.
pub fn relay(tokens: TokenStream, options: RelayOptions) -> Response {
    let mut response = Body::from_stream(relay_stream(tokens, options)).into_response();

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if options.protocol == StreamProtocol::Data {
        headers.insert(
            HeaderName::from_static(DATA_STREAM_HEADER),
            HeaderValue::from_static("v1"),
        );
    }

    response
}

enum Step {
    Next(Option<Result<StreamEvent, crate::llm::LlmError>>),
    Deadline,
}

pub fn relay_stream(
    mut tokens: TokenStream,
    options: RelayOptions,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        let encoder = FrameEncoder::new(options.protocol);
        let deadline = tokio::time::sleep_until(options.deadline);
        tokio::pin!(deadline);

        if let Some(frame) = encoder.start() {
            yield Ok(frame);
        }

        let mut chunks = 0usize;
        let mut bytes = 0usize;
        let mut outcome = Outcome::Finished(FinishReason::Stop);

        loop {
            let step = tokio::select! {
                next = tokens.next() => Step::Next(next),
                _ = &mut deadline => Step::Deadline,
            };

            match step {
                Step::Next(Some(Ok(StreamEvent::TextDelta(text)))) => {
                    chunks += 1;
                    bytes += text.len();
                    yield Ok(encoder.text(&text));
                }
                Step::Next(Some(Ok(StreamEvent::Finished(reason)))) => {
                    outcome = Outcome::Finished(reason);
                }
                Step::Next(Some(Err(e))) => {
                    error!("{}: upstream failed mid-stream after {} chunks: {}", options.route, chunks, e);
                    outcome = Outcome::UpstreamError;
                    if let Some(frame) = encoder.error("The model stream was interrupted.") {
                        yield Ok(frame);
                    }
                    break;
                }
                Step::Next(None) => break,
                Step::Deadline => {
                    warn!("{}: max duration reached after {} chunks, ending stream", options.route, chunks);
                    outcome = Outcome::Deadline;
                    break;
                }
            }
        }

        if let Some(frame) = encoder.finish(outcome) {
            yield Ok(frame);
        }

        debug!(
            "{}: relay complete ({} chunks, {} bytes, finish={})",
            options.route,
            chunks,
            bytes,
            outcome.finish_reason()
        );
    }
}

/// Encodes relay items for the selected wire protocol
#[derive(Debug, Clone, Copy)]
struct FrameEncoder {
    protocol: StreamProtocol,
}

impl FrameEncoder {
    fn new(protocol: StreamProtocol) -> Self {
        Self { protocol }
    }

    fn start(&self) -> Option<Bytes> {
        match self.protocol {
            StreamProtocol::Text => None,
            StreamProtocol::Data => {
                let id = format!("msg-{}", uuid::Uuid::new_v4().simple());
                Some(Self::line("f", &json!({ "messageId": id })))
            }
        }
    }

    fn text(&self, text: &str) -> Bytes {
        match self.protocol {
            StreamProtocol::Text => Bytes::copy_from_slice(text.as_bytes()),
            StreamProtocol::Data => Self::line("0", &Value::String(text.to_string())),
        }
    }

    fn error(&self, message: &str) -> Option<Bytes> {
        match self.protocol {
            StreamProtocol::Text => None,
            StreamProtocol::Data => Some(Self::line("3", &Value::String(message.to_string()))),
        }
    }

    fn finish(&self, outcome: Outcome) -> Option<Bytes> {
        match self.protocol {
            StreamProtocol::Text => None,
            StreamProtocol::Data => Some(Self::line(
                "d",
                &json!({ "finishReason": outcome.finish_reason() }),
            )),
        }
    }

    fn line(code: &str, value: &Value) -> Bytes {
        Bytes::from(format!("{code}:{value}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::time::Duration;

    fn tokens(items: Vec<Result<StreamEvent, LlmError>>) -> TokenStream {
        Box::pin(futures::stream::iter(items))
    }

    async fn collect(stream: impl Stream<Item = Result<Bytes, Infallible>>) -> String {
        let parts: Vec<Result<Bytes, Infallible>> = stream.collect().await;
        let mut out = String::new();
        for part in parts {
            let Ok(bytes) = part;
            out.push_str(std::str::from_utf8(&bytes).unwrap());
        }
        out
    }

    fn options(protocol: StreamProtocol) -> RelayOptions {
        RelayOptions {
            route: "test",
            protocol,
            deadline: Instant::now() + Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_text_protocol_concatenates_in_order() {
        let stream = relay_stream(
            tokens(vec![
                Ok(StreamEvent::TextDelta("A tenant ".into())),
                Ok(StreamEvent::TextDelta("may ".into())),
                Ok(StreamEvent::TextDelta("terminate.".into())),
                Ok(StreamEvent::Finished(FinishReason::Stop)),
            ]),
            options(StreamProtocol::Text),
        );

        assert_eq!(collect(stream).await, "A tenant may terminate.");
    }

    #[tokio::test]
    async fn test_data_protocol_framing() {
        let stream = relay_stream(
            tokens(vec![
                Ok(StreamEvent::TextDelta("Say \"hi\"".into())),
                Ok(StreamEvent::Finished(FinishReason::Stop)),
            ]),
            options(StreamProtocol::Data),
        );
        let out = collect(stream).await;
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("f:{\"messageId\":\"msg-"));
        assert_eq!(lines[1], r#"0:"Say \"hi\"""#);
        assert_eq!(lines[2], r#"d:{"finishReason":"stop"}"#);
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream() {
        let stream = relay_stream(
            tokens(vec![
                Ok(StreamEvent::TextDelta("partial".into())),
                Err(LlmError::Stream("overloaded".into())),
                Ok(StreamEvent::TextDelta("never sent".into())),
            ]),
            options(StreamProtocol::Data),
        );
        let out = collect(stream).await;

        assert!(out.contains(r#"0:"partial""#));
        assert!(out.contains(r#"3:"The model stream was interrupted.""#));
        assert!(out.ends_with("d:{\"finishReason\":\"error\"}\n"));
        assert!(!out.contains("never sent"));
    }

    #[tokio::test]
    async fn test_deadline_ends_stream() {
        let endless: TokenStream = Box::pin(
            futures::stream::once(async { Ok(StreamEvent::TextDelta("first".into())) })
                .chain(futures::stream::pending()),
        );
        let stream = relay_stream(
            endless,
            RelayOptions {
                route: "test",
                protocol: StreamProtocol::Text,
                deadline: Instant::now() + Duration::from_millis(50),
            },
        );

        let out = tokio::time::timeout(Duration::from_secs(5), collect(stream))
            .await
            .expect("relay should stop at its deadline");
        assert_eq!(out, "first");
    }

    #[tokio::test]
    async fn test_deadline_drops_token_stream() {
        // The sender lives inside the token stream; its receiver resolves
        // once the relay lets go of the stream.
        let (guard, released) = tokio::sync::oneshot::channel::<()>();
        let endless: TokenStream = Box::pin(
            futures::stream::once(async { Ok(StreamEvent::TextDelta("first".into())) })
                .chain(futures::stream::pending())
                .map(move |event| {
                    let _held = &guard;
                    event
                }),
        );
        let stream = relay_stream(
            endless,
            RelayOptions {
                route: "test",
                protocol: StreamProtocol::Data,
                deadline: Instant::now() + Duration::from_millis(50),
            },
        );

        let out = collect(stream).await;
        assert!(out.ends_with("d:{\"finishReason\":\"length\"}\n"));

        let dropped = tokio::time::timeout(Duration::from_secs(1), released).await;
        assert!(matches!(dropped, Ok(Err(_))), "token stream still alive after deadline");
    }

    #[tokio::test]
    async fn test_deadline_already_passed() {
        let stream = relay_stream(
            Box::pin(futures::stream::pending()),
            RelayOptions {
                route: "test",
                protocol: StreamProtocol::Text,
                deadline: Instant::now(),
            },
        );

        let out = tokio::time::timeout(Duration::from_secs(1), collect(stream))
            .await
            .expect("an expired deadline ends the body at once");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_relay_response_headers() {
        let response = relay(tokens(vec![]), options(StreamProtocol::Data));

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers()[DATA_STREAM_HEADER], "v1");
    }
}
