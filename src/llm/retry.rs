//! Shared retry and timeout behavior for the model backends
//!
//! Every backend sends its HTTP requests through here so they all get the
//! same treatment: linear backoff with jitter, respect for rate-limit
//! retry-after headers, retry on server errors and network failures, and a
//! long request timeout suited to slow model responses.

use crate::llm::LlmError;
use std::time::Duration;
use tokio::time::sleep;

/// Standard timeout and retry constants for model APIs
pub mod constants {
    /// Default timeout for model API calls (180 seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

    /// Maximum waiting time between retries (30 seconds)
    pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

    /// Base delay for linear backoff (1 second)
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

    /// Default maximum retry attempts
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
}

/// Retry configuration applied to a backend request
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: constants::DEFAULT_BASE_DELAY_MS,
            max_delay_ms: constants::MAX_RETRY_DELAY_MS,
            timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Calculate linear backoff delay with jitter
fn backoff_delay(attempt: u32, config: &RetryConfig) -> u64 {
    if attempt == 0 {
        return 0;
    }

    let linear_delay = config.base_delay_ms * (attempt as u64);

    // Add jitter (±10%) to prevent thundering herd problem
    let jitter_range = linear_delay / 10;
    let jitter = rand::random::<u64>() % (jitter_range * 2 + 1);
    let with_jitter = linear_delay
        .saturating_add(jitter)
        .saturating_sub(jitter_range);

    with_jitter.min(config.max_delay_ms)
}

/// Send an API request with the standardized retry behavior.
///
/// The `prepare_request` closure must build a fresh `RequestBuilder` per
/// attempt (builders are consumed on send). The successful response body is
/// deserialized into `T`.
pub async fn send_api_request_with_retry<T, F>(
    prepare_request: F,
    config: RetryConfig,
    provider_name: &str,
) -> Result<T, LlmError>
where
    T: serde::de::DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempts = 0;
    let timeout = Duration::from_secs(config.timeout_secs);

    loop {
        if attempts > 0 {
            eprintln!(
                "Retry attempt {} of {} for {} API call",
                attempts, config.max_attempts, provider_name
            );
        }

        let request = prepare_request().timeout(timeout);
        let response = request.send().await;

        match response {
            Ok(res) => {
                if res.status().is_success() {
                    // Read the body first so it can be reported on a parse failure
                    let body = res.text().await.map_err(|e| {
                        LlmError::ApiError(format!(
                            "Failed to read {} response body: {}",
                            provider_name, e
                        ))
                    })?;

                    return serde_json::from_str::<T>(&body).map_err(|e| {
                        LlmError::ApiError(format!(
                            "Failed to parse {} response: {}",
                            provider_name, e
                        ))
                    });
                } else if res.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    attempts += 1;
                    if attempts >= config.max_attempts {
                        return Err(LlmError::RateLimitError { retry_after: None });
                    }

                    // Prefer the server's retry-after header when present
                    let delay_ms = match res
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                    {
                        Some(secs) => secs * 1000,
                        None => backoff_delay(attempts, &config),
                    };

                    eprintln!(
                        "{} rate limit exceeded. Retrying in {} seconds",
                        provider_name,
                        delay_ms / 1000
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    continue;
                } else if res.status().is_server_error() {
                    attempts += 1;
                    if attempts >= config.max_attempts {
                        let status = res.status();
                        let error_text = res
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown server error".to_string());
                        return Err(LlmError::ApiError(format!(
                            "Max retries reached. {} server error {}: {}",
                            provider_name, status, error_text
                        )));
                    }

                    let delay_ms = backoff_delay(attempts, &config);
                    eprintln!(
                        "{} API server error {}. Retrying in {} seconds (attempt {}/{})",
                        provider_name,
                        res.status(),
                        delay_ms / 1000,
                        attempts,
                        config.max_attempts
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    continue;
                } else {
                    // 4xx client errors (other than 429) are not retried
                    let status = res.status();
                    let error_text = res
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(LlmError::ApiError(format!(
                        "{} HTTP error {}: {}",
                        provider_name, status, error_text
                    )));
                }
            }
            Err(err) => {
                attempts += 1;
                if attempts >= config.max_attempts {
                    if err.is_timeout() {
                        return Err(LlmError::ApiError(format!(
                            "{} request timed out after {} seconds and {} retry attempts",
                            provider_name, config.timeout_secs, config.max_attempts
                        )));
                    }
                    return Err(LlmError::ApiError(format!(
                        "Max retries reached. Network error: {}",
                        err
                    )));
                }

                let delay_ms = backoff_delay(attempts, &config);
                if err.is_timeout() {
                    eprintln!(
                        "{} API request timed out after {} seconds. Retrying in {} seconds (attempt {}/{})",
                        provider_name, config.timeout_secs, delay_ms / 1000, attempts, config.max_attempts
                    );
                } else {
                    eprintln!(
                        "Network error: {}. Retrying in {} seconds (attempt {}/{})",
                        err,
                        delay_ms / 1000,
                        attempts,
                        config.max_attempts
                    );
                }
                sleep(Duration::from_millis(delay_ms)).await;
                continue;
            }
        }
    }
}
