//! Turn-taking coordinator
//!
//! Drives a meeting from its scripted opening line through model-selected
//! turns until the termination policy fires, then optionally closes it out
//! with a final statement. Every exchange lands in the durable log.

pub mod log;
pub mod timing;

use anyhow::Result;
use crate::constants::{FORMAT_BOLD, FORMAT_CYAN, FORMAT_RESET};
use crate::gateway::{is_error_response, Gateway};
use crate::llm::UsageTotals;
use crate::setup::{Character, ScenarioSetup};
use self::log::{log_timestamp, ConversationLog, LogEntry};
use self::timing::ConversationClock;
use std::path::Path;

pub const DEFAULT_MAX_WORDS: usize = 1500;
pub const DEFAULT_MAX_READ_MINUTES: f64 = 7.0;
const READING_WPM: usize = 200;

/// Match a manager-chosen name against the roster, falling back to the
/// first character when the model returned something unusable.
pub fn resolve_speaker(raw: &str, roster: &[String]) -> String {
    let chosen = raw.trim();
    if roster.iter().any(|name| name == chosen) {
        chosen.to_string()
    } else {
        roster[0].clone()
    }
}

/// Interpret the closing-check verdict. Anything that is not an exact
/// roster name means no closing message.
pub fn resolve_closing_speaker(raw: &str, roster: &[String]) -> Option<String> {
    if raw.to_uppercase().contains("NO") {
        return None;
    }
    let chosen = raw.trim();
    roster
        .iter()
        .find(|name| name.as_str() == chosen)
        .cloned()
}

/// Remove one layer of matching quotes wrapping the whole reply
pub fn strip_outer_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

/// True when the quantitative limits alone end the conversation
pub fn quantitative_end_reached(word_count: usize, max_words: usize, max_read_minutes: f64) -> bool {
    let read_minutes = word_count as f64 / READING_WPM as f64;
    word_count >= max_words || read_minutes >= max_read_minutes
}

pub struct Conversation {
    setup: ScenarioSetup,
    manager_model: String,
    gateway: Gateway,
    log: ConversationLog,
    clock: ConversationClock,
    totals: UsageTotals,
    max_words: usize,
    max_read_minutes: f64,
}

impl Conversation {
    pub fn new(
        setup: ScenarioSetup,
        manager_model: String,
        gateway: Gateway,
        log_path: &Path,
        max_words: usize,
        max_read_minutes: f64,
    ) -> Self {
        Self {
            setup,
            manager_model,
            gateway,
            log: ConversationLog::create(log_path),
            clock: ConversationClock::new(),
            totals: UsageTotals::default(),
            max_words,
            max_read_minutes,
        }
    }

    /// Run the conversation to completion
    pub async fn run(&mut self) -> Result<()> {
        let opening = self.setup.meeting_setup.opening_message.clone();
        println!(
            "\n{}{}{}: {}",
            FORMAT_BOLD, opening.speaker, FORMAT_RESET, opening.message
        );
        self.log_message(&opening.speaker, &opening.message, "None", None)?;

        loop {
            let speaker = self.pick_next_speaker().await?;
            let character = match self.setup.find_character(&speaker) {
                Some(character) => character.clone(),
                None => self.setup.characters[0].clone(),
            };

            let prompt = self.character_prompt(&character);
            let reply = self
                .gateway
                .invoke(&character.assigned_model, &prompt)
                .await?;
            let text = strip_outer_quotes(&reply.text).to_string();

            println!(
                "\n{}{}{}: {}",
                FORMAT_BOLD, character.name, FORMAT_RESET, text
            );
            self.log_message(
                &character.name,
                &text,
                &character.assigned_model,
                Some(reply.usage),
            )?;

            if self.check_end_conditions().await? {
                break;
            }
        }

        if let Some(closer) = self.determine_closing_speaker().await? {
            let character = match self.setup.find_character(&closer) {
                Some(character) => character.clone(),
                None => self.setup.characters[0].clone(),
            };
            let prompt = format!(
                "You are {}. Please provide a final closing message for this meeting.",
                character.name
            );
            let reply = self
                .gateway
                .invoke(&character.assigned_model, &prompt)
                .await?;
            let text = strip_outer_quotes(&reply.text).to_string();

            println!(
                "\n{}{}{}: {}",
                FORMAT_BOLD, character.name, FORMAT_RESET, text
            );
            self.log_message(
                &character.name,
                &text,
                &character.assigned_model,
                Some(reply.usage),
            )?;
        }

        let summary = format!("Token usage summary: {}", self.totals);
        println!("\n{}{}{}", FORMAT_CYAN, summary, FORMAT_RESET);
        self.log_message("System", &summary, "None", None)?;
        Ok(())
    }

    /// Ask the manager model who speaks next
    async fn pick_next_speaker(&self) -> Result<String> {
        let roster = self.setup.character_names();
        let setup_json = serde_json::to_string_pretty(&self.setup)?;
        let prompt = format!(
            "You are the 'group chat manager' AI.\n\
             Here is the conversation so far:\n\
             ----------------------\n\
             {}\n\
             ----------------------\n\
             Full meeting setup:\n{}\n\
             Available characters: {:?}\n\
             Which single character should speak next? Return just the name (no explanation).",
            self.log.filtered_transcript(),
            setup_json,
            roster
        );

        let reply = self.gateway.invoke(&self.manager_model, &prompt).await?;
        Ok(resolve_speaker(&reply.text, &roster))
    }

    fn character_prompt(&self, character: &Character) -> String {
        let recent_events = self
            .setup
            .meeting_setup
            .recent_events
            .iter()
            .map(|event| event.event_description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let last_message = self
            .log
            .last_message()
            .map(|entry| entry.message.clone())
            .unwrap_or_default();

        format!(
            "You are {}, a {}.\n\
             Role: {}.\n\n\
             Meeting context: {}.\n\
             Recent events: {}.\n\
             Conversation so far:\n{}\n\
             Last message: {}\n\n\
             Please respond in-character and keep it brief. Do not prefix \
             your reply with your name and do not add stage directions.",
            character.name,
            character.position,
            character.role,
            self.setup.meeting_setup.purpose_and_context.purpose,
            recent_events,
            self.log.filtered_transcript(),
            last_message
        )
    }

    /// Decide whether the meeting is over.
    ///
    /// The word/reading-time limits are checked first so a long transcript
    /// never triggers another model call just to learn it should stop.
    async fn check_end_conditions(&mut self) -> Result<bool> {
        let word_count = self.log.dialogue_word_count();
        if quantitative_end_reached(word_count, self.max_words, self.max_read_minutes) {
            return Ok(true);
        }

        let objectives = self.setup.meeting_setup.goal.objectives.join("; ");
        let prompt = format!(
            "Conversation so far:\n{}\n\n\
             Meeting goal: {}\n\n\
             Have we met the goal or purpose? Reply YES or NO.",
            self.log.filtered_transcript(),
            objectives
        );

        let reply = self.gateway.invoke(&self.manager_model, &prompt).await?;
        self.log_message(
            "SystemCheck",
            &format!("[Goal Check] {}", reply.text),
            &self.manager_model.clone(),
            Some(reply.usage.clone()),
        )?;

        // A failed manager call is no verdict; keep the meeting going
        if is_error_response(&reply) {
            return Ok(false);
        }
        Ok(reply.text.to_uppercase().contains("YES"))
    }

    /// Ask the manager whether a closing statement is needed, and from whom
    async fn determine_closing_speaker(&mut self) -> Result<Option<String>> {
        let prompt = format!(
            "Based on the conversation, do we need a final closing message to wrap up?\n\
             If yes, provide the EXACT name of who should speak. If no, just say 'NO'.\n\n\
             Conversation so far:\n{}\n",
            self.log.filtered_transcript()
        );

        let reply = self.gateway.invoke(&self.manager_model, &prompt).await?;
        self.log_message(
            "SystemCheck",
            &format!("[Closing Check] {}", reply.text),
            &self.manager_model.clone(),
            Some(reply.usage.clone()),
        )?;

        if is_error_response(&reply) {
            return Ok(None);
        }
        Ok(resolve_closing_speaker(
            &reply.text,
            &self.setup.character_names(),
        ))
    }

    fn log_message(
        &mut self,
        sender: &str,
        message: &str,
        model_used: &str,
        usage: Option<crate::llm::UsageInfo>,
    ) -> Result<()> {
        if let Some(usage) = &usage {
            self.totals.accumulate(usage);
        }

        let mut entry = LogEntry {
            timestamp: log_timestamp(),
            sender: sender.to_string(),
            message: message.to_string(),
            model_used: model_used.to_string(),
            usage_info: usage,
            conversation_time: None,
        };
        // Only spoken dialogue advances the synthesized clock
        if !entry.is_system() {
            let mut rng = rand::thread_rng();
            entry.conversation_time = Some(self.clock.advance(message, &mut rng));
        }

        self.log.append(entry)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ResponseCache, DEFAULT_CACHE_SEED};
    use crate::llm::{Backend, BackendResolver, LlmError, ModelReply, UsageInfo};
    use crate::review::AutoApprove;
    use crate::setup::test_fixtures::minimal_setup;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[test]
    fn test_unknown_speaker_falls_back_to_first() {
        let roster = vec!["Alice".to_string(), "Carol".to_string()];
        assert_eq!(resolve_speaker("Bob Smith", &roster), "Alice");
        assert_eq!(resolve_speaker("  Carol  ", &roster), "Carol");
    }

    #[test]
    fn test_closing_speaker_fails_closed() {
        let roster = vec!["Alice".to_string(), "Carol".to_string()];
        assert_eq!(resolve_closing_speaker("NO", &roster), None);
        assert_eq!(resolve_closing_speaker("No, we're done here", &roster), None);
        assert_eq!(resolve_closing_speaker("Dave", &roster), None);
        assert_eq!(
            resolve_closing_speaker(" Alice \n", &roster),
            Some("Alice".to_string())
        );
    }

    #[test]
    fn test_strip_outer_quotes_once() {
        assert_eq!(strip_outer_quotes("\"hello there\""), "hello there");
        assert_eq!(strip_outer_quotes("'hello'"), "hello");
        assert_eq!(strip_outer_quotes("\"\"nested\"\""), "\"nested\"");
        assert_eq!(strip_outer_quotes("plain text"), "plain text");
        assert_eq!(strip_outer_quotes("\"mismatched'"), "\"mismatched'");
    }

    #[test]
    fn test_quantitative_check_is_monotonic_and_cheap() {
        // 12 words against a 10-word limit ends the meeting
        assert!(quantitative_end_reached(12, 10, 7.0));
        assert!(!quantitative_end_reached(9, 10, 7.0));
        // 1400 words at 200wpm is exactly 7 minutes
        assert!(quantitative_end_reached(1400, 1500, 7.0));
    }

    struct QueueBackend {
        queue: Arc<Mutex<VecDeque<String>>>,
    }

    #[async_trait]
    impl Backend for QueueBackend {
        async fn invoke(&self, _prompt: &str) -> Result<ModelReply, LlmError> {
            let text = self
                .queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::ApiError("script exhausted".into()))?;
            Ok(ModelReply {
                text,
                usage: UsageInfo {
                    prompt_tokens: Some(10),
                    completion_tokens: Some(20),
                    total_tokens: Some(30),
                    ..UsageInfo::with_ttfb(0.1)
                },
            })
        }

        fn name(&self) -> &str {
            "queue"
        }

        fn model(&self) -> &str {
            "queue-model"
        }
    }

    struct QueueResolver {
        queue: Arc<Mutex<VecDeque<String>>>,
    }

    impl BackendResolver for QueueResolver {
        fn resolve(&self, _model_id: &str) -> Result<Box<dyn Backend>, LlmError> {
            Ok(Box::new(QueueBackend {
                queue: Arc::clone(&self.queue),
            }))
        }
    }

    #[tokio::test]
    async fn test_full_run_logs_and_terminates_on_word_limit() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("meeting_log.json");
        let queue: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(
            vec![
                // Turn 1: manager picks a speaker, then Alice replies
                "Alice".to_string(),
                "\"I believe we should lock the roadmap today and revisit hiring next month.\""
                    .to_string(),
                // Closing check after the word limit trips
                "NO".to_string(),
            ]
            .into(),
        ));

        let cache = ResponseCache::open_at(dir.path(), DEFAULT_CACHE_SEED).unwrap();
        let gateway = Gateway::new(
            Box::new(QueueResolver {
                queue: Arc::clone(&queue),
            }),
            cache,
            Box::new(AutoApprove),
            None,
        );

        let setup = minimal_setup(&[("Alice", "claude"), ("Carol", "gemini")]);
        let mut conversation = Conversation::new(
            setup,
            "openai-gpt".to_string(),
            gateway,
            &log_path,
            10,
            7.0,
        );
        conversation.run().await.unwrap();

        // Every scripted reply was consumed, no goal check was needed
        assert!(queue.lock().unwrap().is_empty());

        let on_disk: Vec<LogEntry> =
            serde_json::from_str(&std::fs::read_to_string(&log_path).unwrap()).unwrap();
        // Opening, Alice's turn, closing check, usage summary
        assert_eq!(on_disk.len(), 4);
        assert_eq!(on_disk[1].sender, "Alice");
        assert!(on_disk[1].message.starts_with("I believe"));
        assert!(on_disk[1].conversation_time.is_some());
        assert_eq!(on_disk[2].sender, "SystemCheck");
        assert!(on_disk[2].message.starts_with("[Closing Check]"));
        assert!(on_disk[2].conversation_time.is_none());
        assert_eq!(on_disk[3].sender, "System");
        // Alice's reply plus the closing check carry usage; the speaker
        // pick does not get logged
        assert!(on_disk[3].message.contains("total_tokens: 60"));
    }

    struct FailingBackend;

    #[async_trait]
    impl Backend for FailingBackend {
        async fn invoke(&self, _prompt: &str) -> Result<ModelReply, LlmError> {
            Err(LlmError::ApiError(
                "YESTERDAY maintenance window hit".to_string(),
            ))
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn model(&self) -> &str {
            "failing-model"
        }
    }

    struct FailingResolver;

    impl BackendResolver for FailingResolver {
        fn resolve(&self, _model_id: &str) -> Result<Box<dyn Backend>, LlmError> {
            Ok(Box::new(FailingBackend))
        }
    }

    #[tokio::test]
    async fn test_manager_failure_never_ends_meeting() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("meeting_log.json");
        let cache = ResponseCache::open_at(dir.path(), DEFAULT_CACHE_SEED).unwrap();
        let gateway = Gateway::new(
            Box::new(FailingResolver),
            cache,
            Box::new(AutoApprove),
            None,
        );

        let setup = minimal_setup(&[("Alice", "claude"), ("Carol", "gemini")]);
        let mut conversation = Conversation::new(
            setup,
            "openai-gpt".to_string(),
            gateway,
            &log_path,
            DEFAULT_MAX_WORDS,
            DEFAULT_MAX_READ_MINUTES,
        );

        // The failure text upper-cases to contain "YES"; the sentinel must
        // not be read as a goal verdict
        assert!(!conversation.check_end_conditions().await.unwrap());
        // Nor as a closing-speaker pick
        assert_eq!(conversation.determine_closing_speaker().await.unwrap(), None);

        // Both checks still leave their system entries in the log
        let on_disk: Vec<LogEntry> =
            serde_json::from_str(&std::fs::read_to_string(&log_path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk[0].message.starts_with("[Goal Check] [openai-gpt ERROR]:"));
        assert!(on_disk[1].message.starts_with("[Closing Check] [openai-gpt ERROR]:"));
    }
}
