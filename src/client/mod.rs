//! HTTP client for the JurisAI endpoints
//!
//! Used by the `chat` and `summarize` front ends. Responses are consumed
//! as byte streams so text can be shown as it arrives.

pub mod session;
pub mod summarize;

pub use session::{ChatError, ChatSession, ChatState};
pub use summarize::{SUMMARY_FAILURE, Summarizer};

use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client as HttpClient, Response, multipart};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::document::{DocumentError, DocumentKind, ExtractedDocument};
use crate::llm::ChatMessage;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

#[derive(Debug, Clone)]
pub struct JurisClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl JurisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(self.url(path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn status(&self) -> Result<Value, ClientError> {
        let response = self.http.get(self.url("/api/status")).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Stream the assistant reply for the given transcript.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ByteStream, ClientError> {
        let response = self
            .post("/api/chat")
            .json(&json!({ "messages": messages }))
            .send()
            .await?;
        Ok(byte_stream(check_status(response).await?))
    }

    /// Stream a summary of one document.
    pub async fn summarize_stream(&self, document: &str) -> Result<ByteStream, ClientError> {
        let response = self
            .post("/api/summarize")
            .json(&json!({ "document": document }))
            .send()
            .await?;
        Ok(byte_stream(check_status(response).await?))
    }

    /// Upload a file for server-side extraction.
    pub async fn extract_remote(&self, path: &Path) -> Result<ExtractedDocument, ClientError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        DocumentKind::from_filename(&filename)?;

        let bytes = tokio::fs::read(path).await.map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(filename));
        let response = self.post("/api/extract").multipart(form).send().await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

fn byte_stream(response: Response) -> ByteStream {
    Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from)))
}

/// Incremental UTF-8 decoder: a multi-byte character split across two
/// chunks is held back until the rest arrives. Invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct TextDecoder {
    pending: Vec<u8>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
