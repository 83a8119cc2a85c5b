#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! LLM provider abstraction for the space agent.
//!
//! Supports Anthropic Claude and any `OpenAI`-compatible chat completions
//! endpoint (`OpenAI` itself, Ollama, vLLM, `DeepSeek`, ...) selected via the
//! `AI_BASE_URL` environment variable. Providers only translate the
//! conversation history into the vendor wire format and back; tool calls are
//! returned with their raw argument string so the graph can parse them
//! strictly.

pub mod providers;

pub use providers::{
    ContentBlock, LlmProvider, LlmResponse, StopReason, create_provider_from_env,
};

use thiserror::Error;

/// Failures talking to a model.
#[derive(Debug, Error)]
pub enum AiError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Undecodable request or response body.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reported by the provider itself.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Missing or invalid provider setting.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}
