//! OpenAI API backend
//!
//! Implementation of the model backend for OpenAI's chat models
//! (gpt-3.5-turbo, gpt-4o, etc.) via the chat completions endpoint.

use crate::llm::retry::{send_api_request_with_retry, RetryConfig};
use crate::llm::{round_ms, Backend, LlmError, ModelReply, UsageInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const API_BASE_URL: &str = "https://api.openai.com/v1";

/// System prompt layered under every participant prompt
const SYSTEM_PROMPT: &str = "You are a helpful AI participant in a meeting.";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

/// OpenAI chat backend
pub struct OpenAiBackend {
    api_key: String,
    client: reqwest::Client,
    model_name: String,
}

impl OpenAiBackend {
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

    fn build_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
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
impl Backend for OpenAiBackend {
    async fn invoke(&self, prompt: &str) -> Result<ModelReply, LlmError> {
        let request = self.build_request(prompt);
        let request_json = serde_json::to_value(request)
            .map_err(|e| LlmError::ApiError(format!("Failed to serialize request: {}", e)))?;

        let api_url = format!("{}/chat/completions", API_BASE_URL);
        let prepare_request = || {
            self.client
                .post(&api_url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request_json)
        };

        let start = Instant::now();
        let response: ChatCompletionResponse =
            send_api_request_with_retry(prepare_request, RetryConfig::default(), "OpenAI").await?;
        let ttfb = start.elapsed().as_secs_f64();

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::ApiError("No choices returned from OpenAI API".to_string()))?;
        let text = choice.message.content.clone().unwrap_or_default();

        let mut usage = UsageInfo::with_ttfb(round_ms(ttfb));
        if let Some(u) = &response.usage {
            usage.prompt_tokens = u.prompt_tokens;
            usage.completion_tokens = u.completion_tokens;
            usage.total_tokens = u.total_tokens;
        }

        Ok(ModelReply { text, usage })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_system_and_user_messages() {
        let backend = OpenAiBackend::new("test_key".to_string(), "gpt-3.5-turbo".to_string());
        let request = backend.build_request("Hello");

        assert_eq!(request.model, "gpt-3.5-turbo");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[1].content, "Hello");
        assert_eq!(request.temperature, 0.7);
    }

    #[test]
    fn test_usage_parses_with_missing_counters() {
        let body = r#"{"choices":[{"message":{"content":"hi"}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(response.usage.is_none());
        assert_eq!(response.choices[0].message.content.as_deref(), Some("hi"));
    }
}
