//! Interactive review of prompts and responses
//!
//! When enabled via the environment, every outgoing prompt and incoming
//! response is shown to the operator, who can approve it, reject it (which
//! cancels the run), ask for a retry, or silence review for the rest of the
//! session.

use crate::constants::{FORMAT_GREEN, FORMAT_RESET, FORMAT_YELLOW};
use crate::llm::ModelReply;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Operator decision on an outgoing prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    Proceed,
    Cancel,
}

/// Operator decision on a received response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDecision {
    Accept,
    Retry,
    Cancel,
}

/// Hook invoked around every model call
pub trait ReviewHook: Send + Sync {
    fn review_prompt(&self, model_id: &str, prompt: &str) -> PromptDecision;
    fn review_response(&self, model_id: &str, reply: &ModelReply) -> ResponseDecision;
}

/// Hook that approves everything, used when review is disabled
pub struct AutoApprove;

impl ReviewHook for AutoApprove {
    fn review_prompt(&self, _model_id: &str, _prompt: &str) -> PromptDecision {
        PromptDecision::Proceed
    }

    fn review_response(&self, _model_id: &str, _reply: &ModelReply) -> ResponseDecision {
        ResponseDecision::Accept
    }
}

/// Console-based review hook
///
/// `interactive` asks for a verdict on each item; `show_only` prints the
/// panels but approves automatically. Choosing `s` flips `skip` for the rest
/// of the session.
pub struct ConsoleReview {
    interactive: bool,
    show_only: bool,
    skip: AtomicBool,
}

fn env_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        Err(_) => false,
    }
}

impl ConsoleReview {
    /// Build the hook selected by PROMPT_DEBUG and
    /// DEBUG_SHOW_PROMPTS_AND_RESPONSES
    pub fn from_env() -> Box<dyn ReviewHook> {
        let interactive = env_truthy("PROMPT_DEBUG");
        let show_only = env_truthy("DEBUG_SHOW_PROMPTS_AND_RESPONSES");

        if interactive || show_only {
            Box::new(ConsoleReview {
                interactive,
                show_only,
                skip: AtomicBool::new(false),
            })
        } else {
            Box::new(AutoApprove)
        }
    }

    fn should_show(&self) -> bool {
        !self.skip.load(Ordering::Relaxed)
    }

    fn should_ask(&self) -> bool {
        self.interactive && !self.show_only && self.should_show()
    }

    fn read_choice(&self, question: &str) -> String {
        print!("\n{}", question);
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return "y".to_string();
        }
        line.trim().to_lowercase()
    }
}

impl ReviewHook for ConsoleReview {
    fn review_prompt(&self, model_id: &str, prompt: &str) -> PromptDecision {
        if !self.should_show() {
            return PromptDecision::Proceed;
        }

        println!("\n=== Review: outgoing prompt ===");
        println!("{}Prompt Content (Sending to: {}):", FORMAT_YELLOW, model_id);
        println!("---------------");
        println!("{}", prompt);
        println!("---------------{}", FORMAT_RESET);

        if !self.should_ask() {
            return PromptDecision::Proceed;
        }

        match self
            .read_choice("Send this prompt? [y]es/[n]o/[s]kip review for session: ")
            .as_str()
        {
            "n" => PromptDecision::Cancel,
            "s" => {
                self.skip.store(true, Ordering::Relaxed);
                PromptDecision::Proceed
            }
            _ => PromptDecision::Proceed,
        }
    }

    fn review_response(&self, model_id: &str, reply: &ModelReply) -> ResponseDecision {
        if !self.should_show() {
            return ResponseDecision::Accept;
        }

        let source = if reply.usage.is_cached() {
            "cache"
        } else {
            model_id
        };

        println!("\n=== Review: model response ===");
        println!("{}Response Content (From: {}):", FORMAT_GREEN, source);
        println!("---------------");
        println!("{}", reply.text);
        println!("---------------{}", FORMAT_RESET);
        match &reply.usage.ttfb_seconds {
            Some(ttfb) => println!("Time to first byte: {}s", ttfb),
            None => println!("Time to first byte: n/a"),
        }

        if !self.should_ask() {
            return ResponseDecision::Accept;
        }

        match self
            .read_choice(
                "Proceed with this response? [y]es/[n]o/[r]etry/[s]kip review for session: ",
            )
            .as_str()
        {
            "n" => ResponseDecision::Cancel,
            "r" => ResponseDecision::Retry,
            "s" => {
                self.skip.store(true, Ordering::Relaxed);
                ResponseDecision::Accept
            }
            _ => ResponseDecision::Accept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::UsageInfo;

    #[test]
    fn test_auto_approve_accepts_everything() {
        let hook = AutoApprove;
        assert_eq!(
            hook.review_prompt("claude", "hello"),
            PromptDecision::Proceed
        );

        let reply = ModelReply {
            text: "hi".to_string(),
            usage: UsageInfo::default(),
        };
        assert_eq!(
            hook.review_response("claude", &reply),
            ResponseDecision::Accept
        );
    }

    #[test]
    fn test_show_only_mode_never_asks() {
        let hook = ConsoleReview {
            interactive: false,
            show_only: true,
            skip: AtomicBool::new(false),
        };
        assert!(hook.should_show());
        assert!(!hook.should_ask());
    }

    #[test]
    fn test_skip_flag_silences_review() {
        let hook = ConsoleReview {
            interactive: true,
            show_only: false,
            skip: AtomicBool::new(true),
        };
        assert!(!hook.should_show());
        assert_eq!(
            hook.review_prompt("claude", "hello"),
            PromptDecision::Proceed
        );
    }
}
