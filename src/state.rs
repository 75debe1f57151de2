// src/state.rs
// Shared, immutable per-process state handed to every handler

use std::sync::Arc;

use crate::config::JurisConfig;
use crate::llm::{ChatProvider, GroqProvider, LlmError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<JurisConfig>,
    pub provider: Arc<dyn ChatProvider>,
}

impl AppState {
    pub fn new(config: JurisConfig, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
        }
    }

    /// Production state backed by Groq
    pub fn from_config(config: JurisConfig) -> Result<Self, LlmError> {
        let provider = GroqProvider::from_config(&config)?;
        Ok(Self::new(config, Arc::new(provider)))
    }
}
