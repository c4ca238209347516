//! Run configuration

use crate::cache::DEFAULT_CACHE_SEED;
use crate::conversation::{DEFAULT_MAX_READ_MINUTES, DEFAULT_MAX_WORDS};

/// Knobs for a single conversation run, assembled from CLI arguments
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Manager model id; picked at random when `None`
    pub manager_model: Option<String>,
    pub max_words: usize,
    pub max_read_minutes: f64,
    /// Hard per-call deadline; unbounded when `None`
    pub call_timeout_secs: Option<u64>,
    pub cache_seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            manager_model: None,
            max_words: DEFAULT_MAX_WORDS,
            max_read_minutes: DEFAULT_MAX_READ_MINUTES,
            call_timeout_secs: None,
            cache_seed: DEFAULT_CACHE_SEED,
        }
    }
}
