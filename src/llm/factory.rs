//! Backend factory
//!
//! Maps the logical model identifiers used by setup files and on-disk caches
//! to concrete provider backends. Key resolution fails fast so a missing
//! credential surfaces before a conversation starts, not mid-run.

use crate::llm::anthropic::AnthropicBackend;
use crate::llm::deepseek::DeepSeekBackend;
use crate::llm::gemini::GeminiBackend;
use crate::llm::ollama::OllamaBackend;
use crate::llm::openai::OpenAiBackend;
use crate::llm::{Backend, LlmError};
use rand::seq::SliceRandom;
use std::env;

/// Logical model identifiers accepted in setup files
pub const KNOWN_MODELS: [&str; 5] = ["openai-gpt", "claude", "gemini", "deepseek", "ollama"];

/// Resolves a logical model identifier to a concrete backend
pub trait BackendResolver: Send + Sync {
    fn resolve(&self, model_id: &str) -> Result<Box<dyn Backend>, LlmError>;
}

/// Resolver that reads API keys and model overrides from the environment
pub struct EnvResolver;

impl BackendResolver for EnvResolver {
    fn resolve(&self, model_id: &str) -> Result<Box<dyn Backend>, LlmError> {
        create_backend(model_id)
    }
}

/// Create a backend for a logical model identifier
pub fn create_backend(model_id: &str) -> Result<Box<dyn Backend>, LlmError> {
    match model_id {
        "openai-gpt" => {
            let api_key = resolve_openai_api_key()?;
            let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
            Ok(Box::new(OpenAiBackend::new(api_key, model)))
        }
        "claude" => {
            let api_key = resolve_anthropic_api_key()?;
            let model = env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-20241022".to_string());
            Ok(Box::new(AnthropicBackend::new(api_key, model)))
        }
        "gemini" => {
            let api_key = resolve_google_api_key()?;
            let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());
            Ok(Box::new(GeminiBackend::new(api_key, model)))
        }
        "deepseek" => {
            let api_key = resolve_deepseek_api_key()?;
            let model =
                env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string());
            Ok(Box::new(DeepSeekBackend::new(api_key, model)))
        }
        "ollama" => {
            let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama2".to_string());
            Ok(Box::new(OllamaBackend::new(model)))
        }
        other => Err(LlmError::ConfigError(format!(
            "Unknown model '{}'. Supported models: {}",
            other,
            KNOWN_MODELS.join(", ")
        ))),
    }
}

/// Pick a random logical model identifier
pub fn random_model_id() -> &'static str {
    let mut rng = rand::thread_rng();
    KNOWN_MODELS
        .choose(&mut rng)
        .copied()
        .unwrap_or(KNOWN_MODELS[0])
}

/// Resolve OpenAI API key from environment variables
fn resolve_openai_api_key() -> Result<String, LlmError> {
    env::var("OPENAI_API_KEY")
        .map_err(|_| LlmError::ConfigError("OPENAI_API_KEY environment variable not set".into()))
}

/// Resolve Anthropic API key from environment variables
fn resolve_anthropic_api_key() -> Result<String, LlmError> {
    env::var("ANTHROPIC_API_KEY")
        .map_err(|_| LlmError::ConfigError("ANTHROPIC_API_KEY environment variable not set".into()))
}

/// Resolve Google API key from environment variables
fn resolve_google_api_key() -> Result<String, LlmError> {
    env::var("GOOGLE_API_KEY")
        .map_err(|_| LlmError::ConfigError("GOOGLE_API_KEY environment variable not set".into()))
}

/// Resolve DeepSeek API key from environment variables
fn resolve_deepseek_api_key() -> Result<String, LlmError> {
    env::var("DEEPSEEK_API_KEY")
        .map_err(|_| LlmError::ConfigError("DEEPSEEK_API_KEY environment variable not set".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_is_config_error() {
        let result = create_backend("mistral");
        match result {
            Err(LlmError::ConfigError(msg)) => {
                assert!(msg.contains("mistral"));
                assert!(msg.contains("openai-gpt"));
            }
            _ => panic!("Expected ConfigError for unknown model"),
        }
    }

    #[test]
    fn test_random_model_id_is_known() {
        for _ in 0..20 {
            let id = random_model_id();
            assert!(KNOWN_MODELS.contains(&id));
        }
    }
}
