// src/api/mod.rs

pub mod auth;
pub mod chat;
pub mod error;
pub mod extract;
pub mod router;
pub mod status;
pub mod stream;
pub mod summarize;

pub use error::{ApiError, ApiResult};
pub use router::create_router;
