// src/client/session.rs
// Multi-turn chat session driven by the `chat` command

use std::fmt;
use std::path::Path;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

use super::{ClientError, JurisClient, TextDecoder};
use crate::auth::AuthContext;
use crate::document::{self, DocumentError, ExtractedDocument};
use crate::llm::{ChatMessage, Role};
use crate::prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingAuth,
    AuthenticatedIdle,
    Submitting,
    Streaming,
    Error,
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChatState::Idle => "idle",
            ChatState::AwaitingAuth => "awaiting sign-in",
            ChatState::AuthenticatedIdle => "ready",
            ChatState::Submitting => "submitting",
            ChatState::Streaming => "streaming",
            ChatState::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Sign in required")]
    SignInRequired,

    #[error("session is {0}")]
    NotReady(ChatState),

    #[error("could not read document: {0}")]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub struct ChatSession {
    client: JurisClient,
    state: ChatState,
    signed_out: bool,
    messages: Vec<ChatMessage>,
    document: Option<ExtractedDocument>,
}

impl ChatSession {
    pub fn new(client: JurisClient) -> Self {
        Self {
            client,
            state: ChatState::Idle,
            signed_out: false,
            messages: Vec::new(),
            document: None,
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn document(&self) -> Option<&ExtractedDocument> {
        self.document.as_ref()
    }

    /// Start waiting on the identity gate.
    pub fn begin(&mut self) -> Result<(), ChatError> {
        self.ensure_not_terminal()?;
        if self.state == ChatState::Idle {
            self.state = ChatState::AwaitingAuth;
        }
        Ok(())
    }

    /// Settle the identity gate. A signed-out context ends the session.
    pub fn resolve_auth(&mut self, auth: &AuthContext) -> Result<(), ChatError> {
        self.ensure_not_terminal()?;
        if self.state != ChatState::AwaitingAuth {
            return Err(ChatError::NotReady(self.state));
        }

        match auth.current() {
            Some(identity) => {
                self.client.set_token(identity.token.clone());
                self.state = ChatState::AuthenticatedIdle;
                debug!("Chat session ready for {}", identity.email);
                Ok(())
            }
            None => {
                self.signed_out = true;
                Err(ChatError::SignInRequired)
            }
        }
    }

    /// Sign out and end the session.
    pub fn logout(&mut self, auth: &mut AuthContext) {
        auth.sign_out();
        self.client.set_token(None);
        self.signed_out = true;
        self.document = None;
    }

    /// Attach a local file as context for the following turns.
    pub async fn attach_file(&mut self, path: &Path) -> Result<&ExtractedDocument, ChatError> {
        self.ensure_ready()?;
        let extracted = document::extract_file(path).await?;
        debug!(
            "Attached {} ({} chars)",
            extracted.filename,
            extracted.text.len()
        );
        Ok(self.document.insert(extracted))
    }

    pub fn clear_file(&mut self) {
        self.document = None;
    }

    /// Send one user turn and stream the reply into the transcript.
    /// Blank input is ignored.
    pub async fn submit<F>(&mut self, input: &str, mut on_chunk: F) -> Result<(), ChatError>
    where
        F: FnMut(&str),
    {
        self.ensure_ready()?;
        if input.trim().is_empty() {
            return Ok(());
        }

        let content = prompt::with_document_context(
            input,
            self.document.as_ref().map(|doc| doc.text.as_str()),
        );
        self.messages.push(ChatMessage::user(content));
        self.state = ChatState::Submitting;

        match self.stream_reply(&mut on_chunk).await {
            Ok(()) => {
                self.state = ChatState::AuthenticatedIdle;
                Ok(())
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.discard_unanswered_turn();
                self.state = ChatState::Error;
                Err(e.into())
            }
        }
    }

    async fn stream_reply<F>(&mut self, on_chunk: &mut F) -> Result<(), ClientError>
    where
        F: FnMut(&str),
    {
        let mut stream = self.client.chat_stream(&self.messages).await?;
        self.state = ChatState::Streaming;
        self.messages.push(ChatMessage::assistant(String::new()));

        let mut decoder = TextDecoder::new();
        while let Some(chunk) = stream.next().await {
            let text = decoder.decode(&chunk?);
            self.append_reply(&text, on_chunk);
        }
        let rest = decoder.finish();
        self.append_reply(&rest, on_chunk);
        Ok(())
    }

    /// Drop the empty assistant placeholder and, when no reply arrived at
    /// all, the user turn too, so a retry does not send it twice.
    fn discard_unanswered_turn(&mut self) {
        if self
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && m.content.is_empty())
        {
            self.messages.pop();
        }
        if self.messages.last().is_some_and(|m| m.role == Role::User) {
            self.messages.pop();
        }
    }

    fn append_reply<F>(&mut self, text: &str, on_chunk: &mut F)
    where
        F: FnMut(&str),
    {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(text);
        }
        on_chunk(text);
    }

    fn ensure_not_terminal(&self) -> Result<(), ChatError> {
        if self.signed_out {
            Err(ChatError::SignInRequired)
        } else {
            Ok(())
        }
    }

    fn ensure_ready(&self) -> Result<(), ChatError> {
        self.ensure_not_terminal()?;
        match self.state {
            ChatState::AuthenticatedIdle | ChatState::Error => Ok(()),
            other => Err(ChatError::NotReady(other)),
        }
    }
}
