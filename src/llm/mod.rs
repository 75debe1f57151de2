//! Model provider abstraction
//!
//! A provider turns an ordered list of conversation turns into a stream of
//! text fragments. The HTTP layer only sees [`ChatProvider`], so tests can
//! swap in a recording stub for the hosted model.

pub mod groq;
pub mod sse;

pub use groq::GroqProvider;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation turn. Extra fields sent by chat widgets are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Upstream model failures
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream stream error: {0}")]
    Stream(String),
}

/// Why the upstream stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
        }
    }
}

/// A single item of a token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text fragment, in arrival order
    TextDelta(String),
    /// Model signalled completion
    Finished(FinishReason),
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Hosted text-generation model
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Model identifier requested upstream
    fn model(&self) -> &str;

    /// Start a streaming completion. Errors returned here happen before any
    /// token was produced; errors inside the stream happen mid-response.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, LlmError>;
}
