//! Ollama local model backend
//!
//! Talks to a locally running Ollama server via its /api/generate endpoint.
//! The base URL defaults to localhost and can be overridden with
//! OLLAMA_API_BASE.

use crate::llm::retry::{send_api_request_with_retry, RetryConfig};
use crate::llm::{round_ms, Backend, LlmError, ModelReply, UsageInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_API_BASE: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Local Ollama backend
pub struct OllamaBackend {
    api_base: String,
    client: reqwest::Client,
    model_name: String,
}

impl OllamaBackend {
    pub fn new(model_name: String) -> Self {
        let api_base = std::env::var("OLLAMA_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_base,
            client,
            model_name,
        }
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn invoke(&self, prompt: &str) -> Result<ModelReply, LlmError> {
        let request = GenerateRequest {
            model: self.model_name.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };
        let request_json = serde_json::to_value(request)
            .map_err(|e| LlmError::ApiError(format!("Failed to serialize request: {}", e)))?;

        let api_url = format!("{}/api/generate", self.api_base);
        let prepare_request = || {
            self.client
                .post(&api_url)
                .header("Content-Type", "application/json")
                .json(&request_json)
        };

        let start = Instant::now();
        let response: GenerateResponse =
            send_api_request_with_retry(prepare_request, RetryConfig::default(), "Ollama").await?;
        let ttfb = start.elapsed().as_secs_f64();

        let mut usage = UsageInfo::with_ttfb(round_ms(ttfb));
        usage.prompt_tokens = response.prompt_eval_count;
        usage.completion_tokens = response.eval_count;
        if let (Some(p), Some(c)) = (response.prompt_eval_count, response.eval_count) {
            usage.total_tokens = Some(p + c);
        }

        Ok(ModelReply {
            text: response.response,
            usage,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}
