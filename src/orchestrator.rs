//! C6 — Request Orchestrator: per-request lifecycle wiring the parser,
//! statistics engine, sampler, and AI worker pool into one composed result.
//! See SPEC_FULL.md §4.6.

use crate::config::AppConfig;
use crate::error::AnalysisError;
use crate::llm::LlmError;
use crate::models::AnalysisResult;
use crate::parser;
use crate::pool::AiWorkerPool;
use crate::sampler;
use crate::stats;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PHONE_LIKE_RE_CHARS: &str = "+0123456789 -()";

pub struct Orchestrator {
    pool: Arc<AiWorkerPool>,
    config: AppConfig,
}

impl Orchestrator {
    pub fn new(pool: Arc<AiWorkerPool>, config: AppConfig) -> Self {
        Self { pool, config }
    }

    pub async fn analyze(&self, filename: &str, bytes: Vec<u8>) -> Result<AnalysisResult, AnalysisError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.analysis_timeout_secs);

        let outcome = parser::parse_transcript(std::io::Cursor::new(bytes))?;
        let chat_name = derive_chat_name(&outcome.messages, filename);

        if outcome.messages.is_empty() {
            return Ok(AnalysisResult::empty(chat_name, "No messages found in the provided transcript"));
        }

        let senders: BTreeSet<&str> = outcome.messages.iter().map(|m| m.sender.as_str()).collect();
        let sender_count = senders.len();
        let convo_break_minutes = stats::dynamic_conversation_break_minutes(&outcome.messages);

        let stats_future = {
            let messages = outcome.messages.clone();
            let raw_count = outcome.raw_count;
            tokio::task::spawn_blocking(move || stats::compute(&messages, convo_break_minutes, raw_count))
        };

        let ai_future = self.dispatch_ai(&outcome, sender_count, convo_break_minutes, deadline);

        let (stats_outcome, ai_outcome) = tokio::join!(stats_future, ai_future);

        let mut result = AnalysisResult {
            chat_name,
            total_messages: outcome.raw_count,
            stats: None,
            ai_analysis: None,
            error: None,
        };

        match stats_outcome {
            Ok(Ok(computed)) => result.stats = Some(computed),
            Ok(Err(e)) => result.push_error(format!("statistics failed: {e}")),
            Err(e) => result.push_error(format!("statistics task panicked: {e}")),
        }

        match ai_outcome {
            AiOutcome::Skipped => {}
            AiOutcome::Success(json) => {
                result.ai_analysis = serde_json::from_str(&json).ok();
            }
            AiOutcome::Cancelled => {}
            AiOutcome::QueueTimeout => return Err(AnalysisError::AiQueueTimeout),
            AiOutcome::Failed(reason) => result.push_error(format!("AI analysis failed: {reason}")),
        }

        if Instant::now() >= deadline {
            return Err(AnalysisError::AnalysisDeadline);
        }

        Ok(result)
    }

    async fn dispatch_ai(
        &self,
        outcome: &parser::ParseOutcome,
        sender_count: usize,
        convo_break_minutes: f64,
        deadline: Instant,
    ) -> AiOutcome {
        const MAX_USERS_FOR_PEOPLE_BLOCK: usize = 15;
        if sender_count <= 1 || sender_count > MAX_USERS_FOR_PEOPLE_BLOCK {
            return AiOutcome::Skipped;
        }

        let gap_hours = convo_break_minutes / 60.0;
        let seed = outcome.messages.first().map(|m| m.timestamp.timestamp() as u64).unwrap_or(0);
        let sample = sampler::sample(&outcome.messages, gap_hours, seed);
        if sample.is_empty() {
            return AiOutcome::Skipped;
        }

        let queue_timeout = Duration::from_secs(self.config.ai_queue_timeout_secs);
        let Some(rx) = self.pool.try_submit(sample, sender_count, deadline, queue_timeout).await else {
            return AiOutcome::QueueTimeout;
        };

        match rx.await {
            Ok(Ok(json)) => AiOutcome::Success(json),
            Ok(Err(LlmError::Cancelled)) => AiOutcome::Cancelled,
            Ok(Err(e)) => AiOutcome::Failed(e.to_string()),
            Err(_) => AiOutcome::Cancelled,
        }
    }
}

enum AiOutcome {
    Skipped,
    Success(String),
    Cancelled,
    QueueTimeout,
    Failed(String),
}

/// First whitespace-separated token containing at least one letter, applied to
/// each sorted sender; phone-number-like senders (digits/symbols only) are
/// filtered from the display-name derivation only, not from statistics (§9).
fn derive_chat_name(messages: &[crate::models::ParsedMessage], filename: &str) -> String {
    let senders: BTreeSet<&str> = messages.iter().map(|m| m.sender.as_str()).collect();
    let display_names: Vec<String> = senders
        .iter()
        .filter_map(|s| first_name_token(s))
        .collect();

    match display_names.len() {
        0 => {
            let stem = filename.strip_suffix(".txt").unwrap_or(filename);
            if stem.is_empty() { "Bloop Analysis".to_string() } else { stem.to_string() }
        }
        1 => format!("Chat with {}", display_names[0]),
        2 => format!("{} & {}", display_names[0], display_names[1]),
        n => format!("{}, {} & {} others", display_names[0], display_names[1], n - 2),
    }
}

fn first_name_token(sender: &str) -> Option<String> {
    sender
        .split_whitespace()
        .find(|token| token.chars().any(|c| c.is_alphabetic()) && !is_phone_like(token))
        .map(str::to_string)
}

fn is_phone_like(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| PHONE_LIKE_RE_CHARS.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_transcript;
    use std::io::Cursor;

    fn messages_from(text: &str) -> Vec<crate::models::ParsedMessage> {
        parse_transcript(Cursor::new(text.as_bytes())).unwrap().messages
    }

    #[test]
    fn single_sender_chat_name() {
        let msgs = messages_from("2/3/24, 09:00 - Alice: hi\n");
        assert_eq!(derive_chat_name(&msgs, "export.txt"), "Chat with Alice");
    }

    #[test]
    fn two_sender_chat_name() {
        let msgs = messages_from("2/3/24, 09:00 - Alice: hi\n2/3/24, 09:05 - Bob: hey\n");
        assert_eq!(derive_chat_name(&msgs, "export.txt"), "Alice & Bob");
    }

    #[test]
    fn three_plus_sender_chat_name() {
        let msgs = messages_from(
            "2/3/24, 09:00 - Alice: hi\n2/3/24, 09:05 - Bob: hey\n2/3/24, 09:10 - Carol: yo\n2/3/24, 09:15 - Dave: sup\n",
        );
        assert_eq!(derive_chat_name(&msgs, "export.txt"), "Alice, Bob & 2 others");
    }

    #[test]
    fn no_letter_senders_fall_back_to_filename() {
        let msgs = messages_from("2/3/24, 09:00 - +1 555 0100: hi\n");
        assert_eq!(derive_chat_name(&msgs, "weekend_trip.txt"), "weekend_trip");
    }

    #[test]
    fn phone_like_sender_filtered_from_name_but_not_stats() {
        let msgs = messages_from(
            "2/3/24, 09:00 - Alice: hi\n2/3/24, 09:05 - +1 555 0100: hey\n",
        );
        // Only one letter-bearing sender survives for naming purposes.
        assert_eq!(derive_chat_name(&msgs, "export.txt"), "Chat with Alice");
    }
}
