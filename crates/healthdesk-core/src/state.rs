//! UI-agnostic session state
//!
//! These types are shared by the terminal UI and the one-shot CLI commands and
//! don't depend on any specific UI framework.

use chrono::{DateTime, Local};

/// How many exchanges the consultation panel shows.
pub const VISIBLE_HISTORY: usize = 6;

/// The logged-in user. Every per-user query is scoped to `username`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
}

/// One question and the AI answer to it
#[derive(Debug, Clone)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Local>,
}

/// Conversation transcript held for the duration of a session
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    exchanges: Vec<Exchange>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.exchanges.push(Exchange {
            question: question.into(),
            answer: answer.into(),
            asked_at: Local::now(),
        });
    }

    /// The last `n` exchanges, oldest first.
    pub fn recent(&self, n: usize) -> &[Exchange] {
        let start = self.exchanges.len().saturating_sub(n);
        &self.exchanges[start..]
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_keeps_order_and_limit() {
        let mut history = ChatHistory::new();
        for i in 0..8 {
            history.push(format!("q{}", i), format!("a{}", i));
        }
        let recent = history.recent(VISIBLE_HISTORY);
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[0].question, "q2");
        assert_eq!(recent[5].answer, "a7");
    }

    #[test]
    fn test_recent_with_fewer_entries() {
        let mut history = ChatHistory::new();
        history.push("only", "one");
        assert_eq!(history.recent(6).len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = ChatHistory::new();
        history.push("q", "a");
        history.clear();
        assert!(history.is_empty());
        assert!(history.recent(6).is_empty());
    }
}
