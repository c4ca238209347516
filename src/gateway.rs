//! Model invocation gateway
//!
//! Single entry point for every model call in a run. Resolves the backend,
//! consults the response cache, routes prompts and responses through the
//! review hook, and turns backend failures into an error-sentinel reply that
//! the conversation can log without aborting.

use crate::cache::ResponseCache;
use crate::llm::{BackendResolver, LlmError, ModelReply, UsageInfo};
use crate::review::{PromptDecision, ResponseDecision, ReviewHook};
use crate::timeout::call_with_timeout;
use thiserror::Error;

/// Upper bound on review-driven retries for a single invocation
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("call to {model} timed out after {seconds}s")]
    Timeout { model: String, seconds: u64 },

    #[error("run cancelled by operator")]
    Cancelled,
}

/// Format a backend failure as the sentinel text that replaces a response
pub fn error_sentinel(model_id: &str, message: &str) -> String {
    format!("[{} ERROR]: {}", model_id, message)
}

/// Recognize an error-sentinel reply by its usage tag
pub fn is_error_response(reply: &ModelReply) -> bool {
    reply.usage.is_error()
}

pub struct Gateway {
    resolver: Box<dyn BackendResolver>,
    cache: ResponseCache,
    review: Box<dyn ReviewHook>,
    call_timeout_secs: Option<u64>,
}

impl Gateway {
    pub fn new(
        resolver: Box<dyn BackendResolver>,
        cache: ResponseCache,
        review: Box<dyn ReviewHook>,
        call_timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            resolver,
            cache,
            review,
            call_timeout_secs,
        }
    }

    /// Invoke `model_id` with `prompt`.
    ///
    /// Backend failures come back as an `Ok` reply carrying the error
    /// sentinel so the caller can log them; only configuration problems,
    /// timeouts, and operator cancellation are `Err`.
    pub async fn invoke(&self, model_id: &str, prompt: &str) -> Result<ModelReply, GatewayError> {
        let backend = self
            .resolver
            .resolve(model_id)
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        match self.review.review_prompt(model_id, prompt) {
            PromptDecision::Proceed => {}
            PromptDecision::Cancel => return Err(GatewayError::Cancelled),
        }

        let mut last_reply = None;
        for _attempt in 0..MAX_RETRIES {
            if let Some(cached) = self.cache.lookup(prompt, model_id) {
                match self.review.review_response(model_id, &cached) {
                    ResponseDecision::Accept => return Ok(cached),
                    ResponseDecision::Retry => {
                        self.cache.invalidate(prompt, model_id);
                        last_reply = Some(cached);
                        continue;
                    }
                    ResponseDecision::Cancel => return Err(GatewayError::Cancelled),
                }
            }

            let call = backend.invoke(prompt);
            let outcome = match self.call_timeout_secs {
                Some(seconds) => call_with_timeout(seconds, model_id, call)
                    .await
                    .map_err(|elapsed| GatewayError::Timeout {
                        model: model_id.to_string(),
                        seconds: elapsed.seconds,
                    })?,
                None => call.await,
            };

            let mut reply = match outcome {
                Ok(reply) => reply,
                Err(e) => error_reply(model_id, &e),
            };
            reply.usage.model = Some(model_id.to_string());

            if !is_error_response(&reply) {
                self.cache.store(prompt, model_id, &reply);
            }

            match self.review.review_response(model_id, &reply) {
                ResponseDecision::Accept => return Ok(reply),
                ResponseDecision::Retry => {
                    self.cache.invalidate(prompt, model_id);
                    last_reply = Some(reply);
                }
                ResponseDecision::Cancel => return Err(GatewayError::Cancelled),
            }
        }

        // Retry budget exhausted, go with the most recent response
        match last_reply {
            Some(reply) => Ok(reply),
            None => Err(GatewayError::Cancelled),
        }
    }
}

fn error_reply(model_id: &str, error: &LlmError) -> ModelReply {
    let message = error.to_string();
    ModelReply {
        text: error_sentinel(model_id, &message),
        usage: UsageInfo {
            error: Some(message),
            ..UsageInfo::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_CACHE_SEED;
    use crate::llm::Backend;
    use crate::review::AutoApprove;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MockBackend {
        replies: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
        calls: AtomicU32,
    }

    impl MockBackend {
        fn with_replies(replies: Vec<Result<ModelReply, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn invoke(&self, _prompt: &str) -> Result<ModelReply, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::ApiError("exhausted".into())))
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    struct MockResolver {
        replies: Mutex<Vec<Result<ModelReply, LlmError>>>,
    }

    impl MockResolver {
        fn new(replies: Vec<Result<ModelReply, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    impl BackendResolver for MockResolver {
        fn resolve(&self, _model_id: &str) -> Result<Box<dyn Backend>, LlmError> {
            let replies = std::mem::take(&mut *self.replies.lock().unwrap());
            Ok(Box::new(MockBackend::with_replies(replies)))
        }
    }

    struct FailingResolver;

    impl BackendResolver for FailingResolver {
        fn resolve(&self, _model_id: &str) -> Result<Box<dyn Backend>, LlmError> {
            Err(LlmError::ConfigError("FAKE_KEY not set".into()))
        }
    }

    fn ok_reply(text: &str) -> Result<ModelReply, LlmError> {
        Ok(ModelReply {
            text: text.to_string(),
            usage: UsageInfo::with_ttfb(0.1),
        })
    }

    fn gateway_with(resolver: Box<dyn BackendResolver>, dir: &std::path::Path) -> Gateway {
        let cache = ResponseCache::open_at(dir, DEFAULT_CACHE_SEED).unwrap();
        Gateway::new(resolver, cache, Box::new(AutoApprove), None)
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_call() {
        let dir = tempdir().unwrap();
        let gateway = gateway_with(Box::new(FailingResolver), dir.path());

        match gateway.invoke("claude", "hello").await {
            Err(GatewayError::Config(msg)) => assert!(msg.contains("FAKE_KEY")),
            other => panic!("Expected Config error, got {:?}", other.map(|r| r.text)),
        }
    }

    #[tokio::test]
    async fn test_fresh_response_is_cached_and_tagged() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new(vec![ok_reply("hello back")]);
        let gateway = gateway_with(Box::new(resolver), dir.path());

        let reply = gateway.invoke("claude", "hello").await.unwrap();
        assert_eq!(reply.text, "hello back");
        assert_eq!(reply.usage.model.as_deref(), Some("claude"));
        assert!(!reply.usage.is_cached());

        // Second gateway over the same cache dir sees the stored entry
        let resolver = MockResolver::new(vec![ok_reply("should not be called")]);
        let gateway = gateway_with(Box::new(resolver), dir.path());
        let cached = gateway.invoke("claude", "hello").await.unwrap();
        assert_eq!(cached.text, "hello back");
        assert!(cached.usage.is_cached());
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_sentinel_and_is_not_cached() {
        let dir = tempdir().unwrap();
        let resolver = MockResolver::new(vec![Err(LlmError::ApiError("boom".into()))]);
        let gateway = gateway_with(Box::new(resolver), dir.path());

        let reply = gateway.invoke("gemini", "hello").await.unwrap();
        assert!(reply.text.starts_with("[gemini ERROR]:"));
        assert!(reply.text.contains("boom"));
        assert!(is_error_response(&reply));

        // A later invocation must hit the backend again, not the cache
        let resolver = MockResolver::new(vec![ok_reply("recovered")]);
        let gateway = gateway_with(Box::new(resolver), dir.path());
        let reply = gateway.invoke("gemini", "hello").await.unwrap();
        assert_eq!(reply.text, "recovered");
        assert!(!reply.usage.is_cached());
    }

    struct StalledBackend;

    #[async_trait]
    impl Backend for StalledBackend {
        async fn invoke(&self, _prompt: &str) -> Result<ModelReply, LlmError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Err(LlmError::ApiError("unreachable".into()))
        }

        fn name(&self) -> &str {
            "stalled"
        }

        fn model(&self) -> &str {
            "stalled-model"
        }
    }

    struct StalledResolver;

    impl BackendResolver for StalledResolver {
        fn resolve(&self, _model_id: &str) -> Result<Box<dyn Backend>, LlmError> {
            Ok(Box::new(StalledBackend))
        }
    }

    #[tokio::test]
    async fn test_timed_out_call_is_an_error_and_leaves_no_cache_entry() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open_at(dir.path(), DEFAULT_CACHE_SEED).unwrap();
        let gateway = Gateway::new(
            Box::new(StalledResolver),
            cache,
            Box::new(AutoApprove),
            Some(1),
        );

        match gateway.invoke("deepseek", "hello").await {
            Err(GatewayError::Timeout { model, seconds }) => {
                assert_eq!(model, "deepseek");
                assert_eq!(seconds, 1);
            }
            other => panic!("Expected Timeout error, got {:?}", other.map(|r| r.text)),
        }

        // Nothing was stored for the prompt, not even a sentinel
        let cache = ResponseCache::open_at(dir.path(), DEFAULT_CACHE_SEED).unwrap();
        assert!(cache.lookup("hello", "deepseek").is_none());
    }

    struct ScriptedReview {
        decisions: Mutex<VecDeque<ResponseDecision>>,
    }

    impl ReviewHook for ScriptedReview {
        fn review_prompt(&self, _model_id: &str, _prompt: &str) -> PromptDecision {
            PromptDecision::Proceed
        }

        fn review_response(&self, _model_id: &str, _reply: &ModelReply) -> ResponseDecision {
            self.decisions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ResponseDecision::Accept)
        }
    }

    #[tokio::test]
    async fn test_retry_decision_invalidates_and_calls_again() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open_at(dir.path(), DEFAULT_CACHE_SEED).unwrap();
        let resolver = MockResolver::new(vec![ok_reply("first"), ok_reply("second")]);
        let review = ScriptedReview {
            decisions: Mutex::new(
                vec![ResponseDecision::Retry, ResponseDecision::Accept].into(),
            ),
        };
        let gateway = Gateway::new(Box::new(resolver), cache, Box::new(review), None);

        let reply = gateway.invoke("claude", "hello").await.unwrap();
        assert_eq!(reply.text, "second");
    }

    struct CancellingReview;

    impl ReviewHook for CancellingReview {
        fn review_prompt(&self, _model_id: &str, _prompt: &str) -> PromptDecision {
            PromptDecision::Cancel
        }

        fn review_response(&self, _model_id: &str, _reply: &ModelReply) -> ResponseDecision {
            ResponseDecision::Cancel
        }
    }

    #[tokio::test]
    async fn test_prompt_rejection_is_cancelled() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open_at(dir.path(), DEFAULT_CACHE_SEED).unwrap();
        let resolver = MockResolver::new(vec![ok_reply("unused")]);
        let gateway = Gateway::new(
            Box::new(resolver),
            cache,
            Box::new(CancellingReview),
            None,
        );

        assert!(matches!(
            gateway.invoke("claude", "hello").await,
            Err(GatewayError::Cancelled)
        ));
    }
}
