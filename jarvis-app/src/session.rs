//! Session manager for (channel_id, sender_id) isolation.
//!
//! A session is the conversation context of one user on one channel. It is
//! handed to each turn explicitly; nothing about a conversation is global.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jarvis_channels::{ChannelId, SenderId};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// Exchanges kept per session; older ones are dropped.
pub const HISTORY_CAPACITY: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    pub user: String,
    /// The text the user was shown, never raw tool-call markup.
    pub assistant: String,
    pub tools: Vec<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    history: VecDeque<Exchange>,
    style_counter: usize,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            style_counter: 0,
            created_at: now,
            last_active: now,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.style_counter = 0;
        self.last_active = Utc::now();
    }

    pub fn record(&mut self, user: &str, assistant: &str, tools: Vec<String>) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        let now = Utc::now();
        self.history.push_back(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
            tools,
            at: now,
        });
        self.last_active = now;
    }

    /// The last `n` exchanges, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Exchange> {
        self.history.iter().skip(self.history.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Advance the phrase rotation and return the new position.
    pub fn next_style(&mut self) -> usize {
        self.style_counter = self.style_counter.wrapping_add(1);
        self.style_counter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SessionScope {
    channel_id: ChannelId,
    sender_id: SenderId,
}

impl SessionScope {
    fn new(channel_id: &str, sender_id: &str) -> Self {
        Self {
            channel_id: ChannelId::new(channel_id),
            sender_id: SenderId::new(sender_id),
        }
    }
}

#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<SessionScope, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the session out for the duration of a turn, creating it if needed.
    /// Hand it back with [`SessionManager::check_in`].
    pub fn check_out(&self, channel_id: &str, sender_id: &str) -> Session {
        self.sessions
            .remove(&SessionScope::new(channel_id, sender_id))
            .map(|(_, s)| s)
            .unwrap_or_default()
    }

    pub fn check_in(&self, channel_id: &str, sender_id: &str, session: Session) {
        self.sessions
            .insert(SessionScope::new(channel_id, sender_id), session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_and_recent_is_ordered() {
        let mut s = Session::new();
        for i in 0..10 {
            s.record(&format!("u{i}"), &format!("a{i}"), Vec::new());
        }
        assert_eq!(s.len(), HISTORY_CAPACITY);
        let recent: Vec<&str> = s.recent(3).map(|e| e.user.as_str()).collect();
        assert_eq!(recent, vec!["u7", "u8", "u9"]);
        assert_eq!(s.recent(50).count(), HISTORY_CAPACITY);
    }

    #[test]
    fn reset_clears_history_and_rotation() {
        let mut s = Session::new();
        s.record("hi", "hello", Vec::new());
        s.next_style();
        s.reset();
        assert_eq!(s.len(), 0);
        assert_eq!(s.next_style(), 1);
    }

    #[test]
    fn sessions_are_isolated_per_sender() {
        let mgr = SessionManager::new();
        let mut a = mgr.check_out("console", "alice");
        a.record("open notes", "Opened Notes", vec!["open_app".to_string()]);
        mgr.check_in("console", "alice", a);

        assert_eq!(mgr.check_out("console", "bob").len(), 0);
        assert_eq!(mgr.check_out("console", "alice").len(), 1);
    }
}
