//! Conversation log persistence
//!
//! Every message is appended to a JSON array on disk as soon as it is
//! logged, so a crashed run still leaves a readable transcript behind.

use crate::llm::UsageInfo;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Senders whose entries are bookkeeping, not dialogue
pub const SYSTEM_SENDERS: [&str; 2] = ["System", "SystemCheck"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub sender: String,
    pub message: String,
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_info: Option<UsageInfo>,
    /// Milliseconds on the synthesized conversation clock. Absent on
    /// system entries, which do not advance it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_time: Option<u64>,
}

impl LogEntry {
    pub fn is_system(&self) -> bool {
        SYSTEM_SENDERS.contains(&self.sender.as_str())
    }
}

/// Current wall-clock timestamp in log format
pub fn log_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// In-memory transcript plus its on-disk JSON array
pub struct ConversationLog {
    path: PathBuf,
    entries: Vec<LogEntry>,
}

impl ConversationLog {
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last_message(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Append an entry and immediately rewrite the on-disk array
    pub fn append(&mut self, entry: LogEntry) -> io::Result<()> {
        self.entries.push(entry);

        // Re-read the file so parallel writers are not clobbered silently
        let mut on_disk: Vec<LogEntry> = match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        if let Some(latest) = self.entries.last() {
            on_disk.push(latest.clone());
        }

        let json = serde_json::to_string_pretty(&on_disk)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Transcript of dialogue entries only, one "Sender: message" per line
    pub fn filtered_transcript(&self) -> String {
        self.entries
            .iter()
            .filter(|entry| !entry.is_system())
            .map(|entry| format!("{}: {}", entry.sender, entry.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Word count across dialogue entries only
    pub fn dialogue_word_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.is_system())
            .map(|entry| entry.message.split_whitespace().count())
            .sum()
    }
}
