//! Google Gemini API backend
//!
//! Implementation of the model backend for Google's Gemini models via the
//! generateContent endpoint.

use crate::llm::retry::{send_api_request_with_retry, RetryConfig};
use crate::llm::{round_ms, Backend, LlmError, ModelReply, UsageInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Google Gemini backend
pub struct GeminiBackend {
    api_key: String,
    client: reqwest::Client,
    model_name: String,
}

impl GeminiBackend {
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

    fn build_request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
                role: Some("user".to_string()),
            }],
        }
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    async fn invoke(&self, prompt: &str) -> Result<ModelReply, LlmError> {
        let request = self.build_request(prompt);
        let request_json = serde_json::to_value(request)
            .map_err(|e| LlmError::ApiError(format!("Failed to serialize request: {}", e)))?;

        let api_url = format!(
            "{}/models/{}:generateContent?key={}",
            API_BASE_URL, self.model_name, self.api_key
        );
        let prepare_request = || {
            self.client
                .post(&api_url)
                .header("Content-Type", "application/json")
                .json(&request_json)
        };

        let start = Instant::now();
        let response: GenerateResponse =
            send_api_request_with_retry(prepare_request, RetryConfig::default(), "Gemini").await?;
        let ttfb = start.elapsed().as_secs_f64();

        // A blocked prompt returns feedback instead of candidates
        if let Some(feedback) = &response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(LlmError::ApiError(format!(
                    "Gemini blocked the prompt: {}",
                    reason
                )));
            }
        }

        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| LlmError::ApiError("No candidates returned from Gemini API".into()))?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let mut usage = UsageInfo::with_ttfb(round_ms(ttfb));
        if let Some(meta) = &response.usage_metadata {
            usage.prompt_tokens = meta.prompt_token_count;
            usage.completion_tokens = meta.candidates_token_count;
            usage.total_tokens = meta.total_token_count;
        }

        Ok(ModelReply { text, usage })
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}
