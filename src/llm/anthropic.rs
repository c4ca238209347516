//! Anthropic Claude API backend
//!
//! Implementation of the model backend for Anthropic's Claude models
//! via the messages endpoint.

use crate::llm::retry::{send_api_request_with_retry, RetryConfig};
use crate::llm::{round_ms, Backend, LlmError, ModelReply, UsageInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default cap on the generated reply; conversation turns are short.
const DEFAULT_MAX_TOKENS: usize = 1024;

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

/// Anthropic Claude backend
pub struct AnthropicBackend {
    api_key: String,
    client: reqwest::Client,
    model_name: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String, model_name: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            client,
            model_name,
        }
    }

    fn build_request(&self, prompt: &str) -> MessageRequest {
        MessageRequest {
            model: self.model_name.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
    async fn invoke(&self, prompt: &str) -> Result<ModelReply, LlmError> {
        let request = self.build_request(prompt);
        let request_json = serde_json::to_value(request)
            .map_err(|e| LlmError::ApiError(format!("Failed to serialize request: {}", e)))?;

        let prepare_request = || {
            self.client
                .post(API_URL)
                .header("Content-Type", "application/json")
                .header("X-Api-Key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request_json)
        };

        let start = Instant::now();
        let response: MessageResponse =
            send_api_request_with_retry(prepare_request, RetryConfig::default(), "Anthropic")
                .await?;
        let ttfb = start.elapsed().as_secs_f64();

        // Concatenate the text blocks; Claude replies are one block in practice
        let text: String = response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::ApiError(
                "No text content returned from Anthropic API".to_string(),
            ));
        }

        let mut usage = UsageInfo::with_ttfb(round_ms(ttfb));
        if let Some(u) = &response.usage {
            usage.prompt_tokens = u.input_tokens;
            usage.completion_tokens = u.output_tokens;
            usage.total_tokens = match (u.input_tokens, u.output_tokens) {
                (Some(i), Some(o)) => Some(i + o),
                _ => None,
            };
        }

        Ok(ModelReply { text, usage })
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}
