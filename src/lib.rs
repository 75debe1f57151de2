// src/lib.rs

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod document;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod state;
