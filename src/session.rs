//! Per-user session bookkeeping.
//!
//! The [`SessionStore`] is the only shared mutable state in the process.
//! It is explicitly constructed and owned by the dispatcher, never a
//! global, so tests can build isolated instances.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::config::HISTORY_WINDOW;
use crate::llm::ChatMessage;

/// Fixed per-user settings, applied at session creation.
#[derive(Debug, Clone)]
pub struct Preferences {
    pub response_style: String,
    pub language: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            response_style: "detailed".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Mutable conversation record for one user, held only in memory.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub history: Vec<ChatMessage>,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub preferences: Preferences,
}

impl Session {
    fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            display_name: None,
            username: None,
            history: Vec::new(),
            message_count: 0,
            created_at: now,
            last_activity_at: now,
            preferences: Preferences::default(),
        }
    }

    /// Record platform-reported identity. The display name is captured on
    /// first contact; the username follows whatever the platform reports.
    pub fn capture_identity(&mut self, display_name: &str, username: Option<&str>) {
        if self.display_name.is_none() {
            self.display_name = Some(display_name.to_string());
        }
        if let Some(username) = username {
            self.username = Some(username.to_string());
        }
    }

    /// Update the last-activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// The bounded history slice forwarded to the completion API.
    ///
    /// Older entries remain stored but are never sent.
    #[must_use]
    pub fn history_window(&self) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(HISTORY_WINDOW);
        &self.history[start..]
    }

    /// Content of the most recent assistant entry, if any.
    #[must_use]
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == "assistant")
            .map(|m| m.content.as_str())
    }

    /// Append one completed user/assistant exchange.
    fn record_exchange(&mut self, user_text: &str, assistant_text: &str) {
        self.history.push(ChatMessage::user(user_text));
        self.history.push(ChatMessage::assistant(assistant_text));
        self.message_count += 1;
        self.touch();
    }

    /// Age of the session since creation.
    #[must_use]
    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }
}

/// Mapping from user identifier to session, plus process-wide counters.
///
/// Nothing here survives a restart; durability is an explicit non-goal.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<i64, Session>,
    active_users: HashSet<i64>,
    total_messages: u64,
    started_at: DateTime<Utc>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            active_users: HashSet::new(),
            total_messages: 0,
            started_at: Utc::now(),
        }
    }

    /// Returns the existing session or creates one with defaults.
    ///
    /// First creation registers the user in the active-user set.
    pub fn get_or_create(&mut self, user_id: i64) -> &mut Session {
        self.active_users.insert(user_id);
        self.sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(user_id))
    }

    #[must_use]
    pub fn get(&self, user_id: i64) -> Option<&Session> {
        self.sessions.get(&user_id)
    }

    /// Removes the session and its active-user registration.
    ///
    /// A missing session is a no-op, not an error; the next message from
    /// this user starts from a fresh session.
    pub fn clear(&mut self, user_id: i64) {
        self.sessions.remove(&user_id);
        self.active_users.remove(&user_id);
    }

    /// Record a completed completion exchange for `user_id` and bump the
    /// process-wide message counter.
    pub fn complete_exchange(&mut self, user_id: i64, user_text: &str, assistant_text: &str) {
        self.get_or_create(user_id)
            .record_exchange(user_text, assistant_text);
        self.total_messages += 1;
    }

    #[must_use]
    pub fn active_user_count(&self) -> usize {
        self.active_users.len()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub const fn total_messages(&self) -> u64 {
        self.total_messages
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        Utc::now() - self.started_at
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
