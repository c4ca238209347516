//! Common types for model interactions
//!
//! These types are shared across the backend implementations to
//! represent replies and usage accounting in one uniform shape.

use serde::{Deserialize, Serialize};

/// Reply from a model backend, already reduced to plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    /// The response text
    pub text: String,

    /// Usage statistics reported (or estimated) by the backend
    pub usage: UsageInfo,
}

/// Usage statistics attached to every logged model response.
///
/// Backends fill in whatever their API reports; counters that a backend
/// cannot provide stay `None` and are skipped during serialization so the
/// on-disk shape matches what each provider actually returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,

    /// Time to first byte in seconds, rounded to milliseconds. These are
    /// non-streaming calls, so this is really time-to-full-response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb_seconds: Option<f64>,

    /// Logical model id that produced this response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Set when the response was served from the response cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,

    /// Set when the response is an error sentinel; such responses are
    /// never cached and are recognized by prefix/field inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsageInfo {
    /// Usage carrying only a latency measurement
    pub fn with_ttfb(ttfb_seconds: f64) -> Self {
        Self {
            ttfb_seconds: Some(round_ms(ttfb_seconds)),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_cached(&self) -> bool {
        self.cached.unwrap_or(false)
    }
}

/// Round a seconds value to millisecond precision for display and logs.
pub fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Running totals of the integer usage counters, accumulated per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageTotals {
    pub fn accumulate(&mut self, usage: &UsageInfo) {
        self.prompt_tokens += usage.prompt_tokens.unwrap_or(0);
        self.completion_tokens += usage.completion_tokens.unwrap_or(0);
        self.total_tokens += usage.total_tokens.unwrap_or(0);
    }
}

impl std::fmt::Display for UsageTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{prompt_tokens: {}, completion_tokens: {}, total_tokens: {}}}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}
