//! Per-session conversation history.
//!
//! Sessions are created on first use and live until explicitly ended; the
//! pipeline never asks callers to open one. History is stored in full, and
//! prompt-building callers take the recent slice they want.

use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::message::{ConversationTurn, Message};

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<FxHashMap<String, Vec<ConversationTurn>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages for a session, oldest first. Unknown sessions are empty,
    /// not errors.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        let sessions = self.sessions.lock().expect("session store poisoned");
        sessions
            .get(session_id)
            .map(|turns| turns.iter().map(|turn| turn.message.clone()).collect())
            .unwrap_or_default()
    }

    /// The last `max_turns` exchanges (user plus assistant pairs), oldest
    /// first.
    pub fn recent_history(&self, session_id: &str, max_turns: usize) -> Vec<Message> {
        let mut messages = self.history(session_id);
        let cap = max_turns.saturating_mul(2);
        if messages.len() > cap {
            messages.drain(..messages.len() - cap);
        }
        messages
    }

    /// Record one completed exchange, creating the session on first use.
    pub fn record_exchange(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(ConversationTurn::now(Message::user(user_text)));
        turns.push(ConversationTurn::now(Message::assistant(assistant_text)));
    }

    /// Drop a session and its history. Returns whether it existed.
    pub fn end(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .expect("session store poisoned")
            .remove(session_id)
            .is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session store poisoned").len()
    }

    /// Completed exchanges recorded for a session.
    pub fn exchange_count(&self, session_id: &str) -> usize {
        let sessions = self.sessions.lock().expect("session store poisoned");
        sessions.get(session_id).map_or(0, |turns| turns.len() / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Sessions come into being on the first recorded exchange.
    fn test_create_on_first_use() {
        let store = SessionStore::new();
        assert!(store.history("s1").is_empty());
        assert_eq!(store.session_count(), 0);

        store.record_exchange("s1", "hello", "hi there");
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.exchange_count("s1"), 1);

        let history = store.history("s1");
        assert_eq!(history.len(), 2);
        assert!(history[0].has_role(Message::USER));
        assert_eq!(history[0].content, "hello");
        assert!(history[1].has_role(Message::ASSISTANT));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        store.record_exchange("s1", "a", "b");
        store.record_exchange("s2", "c", "d");
        assert_eq!(store.history("s1")[0].content, "a");
        assert_eq!(store.history("s2")[0].content, "c");
    }

    #[test]
    /// The recent slice keeps the newest exchanges and preserves order.
    fn test_recent_history_caps_exchanges() {
        let store = SessionStore::new();
        for i in 0..5 {
            store.record_exchange("s1", &format!("q{i}"), &format!("a{i}"));
        }

        let recent = store.recent_history("s1", 2);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "q3");
        assert_eq!(recent[3].content, "a4");

        // Zero turns means no history at all.
        assert!(store.recent_history("s1", 0).is_empty());
    }

    #[test]
    fn test_end_session_forgets_history() {
        let store = SessionStore::new();
        store.record_exchange("s1", "q", "a");
        assert!(store.end("s1"));
        assert!(store.history("s1").is_empty());
        assert!(!store.end("s1"));
        assert!(!store.end("never-existed"));
    }
}
