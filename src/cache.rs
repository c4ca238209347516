//! Deterministic response cache
//!
//! Persists model responses keyed by a SHA-256 digest of the normalized
//! prompt, logical model id, and cache seed. Entries expire after a fixed
//! window and error responses are never kept.

use crate::llm::{ModelReply, UsageInfo};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_SEED: u64 = 69;
pub const DEFAULT_EXPIRY_DAYS: i64 = 3;
const CACHE_DIR: &str = "cache";
const CACHE_FILE: &str = "ai_responses_cache.json";

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    prompt: String,
    model: String,
    response: String,
    usage_info: UsageInfo,
    created_at: f64,
    expires_at: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheData {
    cache_seed: u64,
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheData {
    fn empty(cache_seed: u64) -> Self {
        Self {
            cache_seed,
            entries: BTreeMap::new(),
        }
    }
}

/// File-backed response cache
///
/// Every operation reloads the cache file so concurrent runs sharing a
/// working directory observe each other's writes.
pub struct ResponseCache {
    cache_seed: u64,
    cache_file: PathBuf,
}

impl ResponseCache {
    /// Open the cache in the default `cache/` directory
    pub fn open(cache_seed: u64) -> io::Result<Self> {
        Self::open_at(Path::new(CACHE_DIR), cache_seed)
    }

    /// Open the cache rooted at an explicit directory
    pub fn open_at(dir: &Path, cache_seed: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let cache = Self {
            cache_seed,
            cache_file: dir.join(CACHE_FILE),
        };

        let pruned = cache.prune_stale();
        if pruned > 0 {
            eprintln!("Pruned {} stale cache entries", pruned);
        }
        Ok(cache)
    }

    /// Normalize prompt text so whitespace differences hash identically
    fn normalize_prompt(prompt: &str) -> String {
        prompt
            .split('\n')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    fn generate_hash(&self, prompt: &str, model_id: &str) -> String {
        let normalized = Self::normalize_prompt(prompt);
        let content = format!("{}:{}:{}", normalized, model_id, self.cache_seed);
        let digest = Sha256::digest(content.as_bytes());
        format!("{:x}", digest)
    }

    /// Load the cache file, falling back to an empty cache on any failure
    fn load(&self) -> CacheData {
        match fs::read_to_string(&self.cache_file) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(data) => data,
                Err(e) => {
                    eprintln!("Error loading cache, starting fresh: {}", e);
                    CacheData::empty(self.cache_seed)
                }
            },
            Err(_) => CacheData::empty(self.cache_seed),
        }
    }

    /// Write the cache atomically via a temp file rename
    fn save(&self, data: &CacheData) -> io::Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp_path = self.cache_file.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.cache_file)?;
        Ok(())
    }

    /// Drop expired entries and any error responses that leaked in
    fn prune_stale(&self) -> usize {
        let mut data = self.load();
        let now = Utc::now().timestamp() as f64;
        let before = data.entries.len();
        data.entries
            .retain(|_, entry| entry.expires_at > now && !entry.usage_info.is_error());
        let pruned = before - data.entries.len();

        if pruned > 0 {
            if let Err(e) = self.save(&data) {
                eprintln!("Error saving pruned cache: {}", e);
            }
        }
        pruned
    }

    /// Look up a cached response for this prompt and model
    pub fn lookup(&self, prompt: &str, model_id: &str) -> Option<ModelReply> {
        let data = self.load();
        let hash = self.generate_hash(prompt, model_id);

        let entry = data.entries.get(&hash)?;
        if entry.expires_at <= Utc::now().timestamp() as f64 {
            return None;
        }

        let mut usage = entry.usage_info.clone();
        usage.cached = Some(true);
        Some(ModelReply {
            text: entry.response.clone(),
            usage,
        })
    }

    /// Cache a response. Error responses are refused and save failures are
    /// logged rather than propagated so a broken cache never kills a run.
    pub fn store(&self, prompt: &str, model_id: &str, reply: &ModelReply) {
        if reply.usage.is_error() {
            return;
        }

        let mut data = self.load();
        let hash = self.generate_hash(prompt, model_id);
        let now = Utc::now().timestamp() as f64;

        data.entries.insert(
            hash,
            CacheEntry {
                prompt: prompt.to_string(),
                model: model_id.to_string(),
                response: reply.text.clone(),
                usage_info: reply.usage.clone(),
                created_at: now,
                expires_at: now + (DEFAULT_EXPIRY_DAYS * 24 * 60 * 60) as f64,
            },
        );

        if let Err(e) = self.save(&data) {
            eprintln!("Error caching response: {}", e);
        }
    }

    /// Remove a single cached entry, used when the user requests a retry
    pub fn invalidate(&self, prompt: &str, model_id: &str) {
        let mut data = self.load();
        let hash = self.generate_hash(prompt, model_id);

        if data.entries.remove(&hash).is_some() {
            if let Err(e) = self.save(&data) {
                eprintln!("Error saving cache after invalidation: {}", e);
            }
        }
    }

    /// Delete the cache file entirely
    pub fn clear_all(&self) -> io::Result<()> {
        match fs::remove_file(&self.cache_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
