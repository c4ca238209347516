//! Model backend abstraction layer
//!
//! This module defines the trait and types for interacting with the
//! different model providers (OpenAI, Anthropic, Google, DeepSeek, Ollama).

pub use async_trait::async_trait;

pub mod anthropic;
pub mod deepseek;
pub mod factory;
pub mod gemini;
pub mod ollama;
pub mod openai;
mod retry;
mod types;

pub use self::factory::{BackendResolver, EnvResolver, KNOWN_MODELS};
pub use self::types::*;

/// Common trait for all model backends.
///
/// Implementations take one fully-assembled prompt and return the reply
/// text together with whatever usage accounting the provider reports.
/// Latency (time to first byte) is measured inside the backend, around
/// the actual network call.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send a prompt to the model and get its reply
    async fn invoke(&self, prompt: &str) -> Result<ModelReply, LlmError>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the concrete model name passed to the provider API
    fn model(&self) -> &str;
}

/// Error types for model operations
#[derive(Debug)]
pub enum LlmError {
    /// API request error
    ApiError(String),

    /// Configuration error (missing credential, unknown model id)
    ConfigError(String),

    /// Rate limit error
    RateLimitError { retry_after: Option<u64> },

    /// Generic error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiError(msg) => write!(f, "API error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded. Retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            Self::Other(err) => write!(f, "Model error: {}", err),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
