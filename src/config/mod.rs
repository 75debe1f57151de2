// src/config/mod.rs
// Service configuration, read from the environment (.env is loaded by main)

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Startup configuration errors. Any of these keeps the process from serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY is missing. Add it to your environment or .env file.")]
    MissingApiKey,

    #[error("invalid configuration for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Wire format used when relaying model tokens to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    /// Raw UTF-8 tokens.
    #[default]
    Text,
    /// `<code>:<json>\n` line framing consumed by browser chat widgets.
    Data,
}

impl StreamProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamProtocol::Text => "text",
            StreamProtocol::Data => "data",
        }
    }
}

impl FromStr for StreamProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(StreamProtocol::Text),
            "data" => Ok(StreamProtocol::Data),
            other => Err(format!("unknown stream protocol '{other}' (expected text or data)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JurisConfig {
    // ── Model provider
    pub groq_api_key: String,
    pub groq_base_url: String,
    pub model: String,
    pub connect_timeout_secs: u64,

    // ── Server
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub access_token: Option<String>,
    pub max_upload_bytes: usize,

    // ── Streaming
    pub chat_max_duration_secs: u64,
    pub summarize_max_duration_secs: u64,
    pub stream_protocol: StreamProtocol,
}

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

// Values may carry a trailing "# comment" when they come from a .env file.
fn env_var_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => {
                    debug!("Config: {} = {} (from environment)", key, clean_val);
                    parsed
                }
                Err(_) => {
                    warn!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        None => default,
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl JurisConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an in-memory map (tests, embedding).
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let groq_api_key = non_empty(&lookup, "GROQ_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let stream_protocol = match non_empty(&lookup, "JURIS_STREAM_PROTOCOL") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "JURIS_STREAM_PROTOCOL",
                reason,
            })?,
            None => StreamProtocol::default(),
        };

        let config = Self {
            groq_api_key,
            groq_base_url: env_var_or(&lookup, "GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL.to_string()),
            model: env_var_or(&lookup, "JURIS_MODEL", DEFAULT_MODEL.to_string()),
            connect_timeout_secs: env_var_or(&lookup, "JURIS_CONNECT_TIMEOUT_SECS", 10),
            host: env_var_or(&lookup, "JURIS_HOST", "0.0.0.0".to_string()),
            port: env_var_or(&lookup, "JURIS_PORT", 3000),
            cors_origin: env_var_or(&lookup, "JURIS_CORS_ORIGIN", "*".to_string()),
            access_token: non_empty(&lookup, "JURIS_ACCESS_TOKEN"),
            max_upload_bytes: env_var_or(&lookup, "JURIS_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            chat_max_duration_secs: env_var_or(&lookup, "JURIS_CHAT_MAX_DURATION_SECS", 30),
            summarize_max_duration_secs: env_var_or(&lookup, "JURIS_SUMMARIZE_MAX_DURATION_SECS", 60),
            stream_protocol,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, reason: &str| ConfigError::Invalid {
            key,
            reason: reason.to_string(),
        };

        if self.groq_base_url.trim().is_empty() {
            return Err(invalid("GROQ_BASE_URL", "must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("JURIS_MODEL", "must not be empty"));
        }
        if self.chat_max_duration_secs == 0 {
            return Err(invalid("JURIS_CHAT_MAX_DURATION_SECS", "must be greater than zero"));
        }
        if self.summarize_max_duration_secs == 0 {
            return Err(invalid("JURIS_SUMMARIZE_MAX_DURATION_SECS", "must be greater than zero"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(invalid("JURIS_CONNECT_TIMEOUT_SECS", "must be greater than zero"));
        }
        if self.max_upload_bytes == 0 {
            return Err(invalid("JURIS_MAX_UPLOAD_BYTES", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.groq_base_url.trim_end_matches('/'))
    }

    pub fn chat_max_duration(&self) -> Duration {
        Duration::from_secs(self.chat_max_duration_secs)
    }

    pub fn summarize_max_duration(&self) -> Duration {
        Duration::from_secs(self.summarize_max_duration_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
