//! DeepSeek API backend
//!
//! DeepSeek exposes an OpenAI-compatible chat completions endpoint, so the
//! wire types mirror the OpenAI backend with a different base URL.

use crate::llm::retry::{send_api_request_with_retry, RetryConfig};
use crate::llm::{round_ms, Backend, LlmError, ModelReply, UsageInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const API_URL: &str = "https://api.deepseek.com/chat/completions";
const SYSTEM_PROMPT: &str = "You are a helpful AI participant in a meeting.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

/// DeepSeek backend
pub struct DeepSeekBackend {
    api_key: String,
    client: reqwest::Client,
    model_name: String,
}

impl DeepSeekBackend {
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

    fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.7,
        }
    }
}

#[async_trait]
impl Backend for DeepSeekBackend {
    async fn invoke(&self, prompt: &str) -> Result<ModelReply, LlmError> {
        let request = self.build_request(prompt);
        let request_json = serde_json::to_value(request)
            .map_err(|e| LlmError::ApiError(format!("Failed to serialize request: {}", e)))?;

        let prepare_request = || {
            self.client
                .post(API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request_json)
        };

        let start = Instant::now();
        let response: ChatResponse =
            send_api_request_with_retry(prepare_request, RetryConfig::default(), "DeepSeek")
                .await?;
        let ttfb = start.elapsed().as_secs_f64();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ApiError("No choices returned from DeepSeek API".into()))?;

        let mut usage = UsageInfo::with_ttfb(round_ms(ttfb));
        if let Some(counts) = &response.usage {
            usage.prompt_tokens = counts.prompt_tokens;
            usage.completion_tokens = counts.completion_tokens;
            usage.total_tokens = counts.total_tokens;
        }

        Ok(ModelReply {
            text: choice.message.content,
            usage,
        })
    }

    fn name(&self) -> &str {
        "deepseek"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}
