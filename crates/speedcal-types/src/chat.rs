//! Chat session and message types.
//!
//! A session is an owner-scoped conversation; a message is one immutable,
//! sequenced turn half (user prompt or assistant reply) inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::llm::MessageRole;

/// Title shown for sessions that were never named.
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

/// Maximum characters of the last message shown in a session listing.
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Lifecycle status of a chat session.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'closed'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Closed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// Author of a persisted message.
///
/// Narrower than [`MessageRole`]: tool results live only inside a model turn
/// and are never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Role name used by the chat history API (`assistant` is rendered as `ai`).
    pub fn history_label(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "ai",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
            Role::System => MessageRole::System,
        }
    }
}

/// A chat session owned by a single caller.
///
/// `message_count` always equals the number of persisted messages; a
/// soft-deleted session keeps its rows but is invisible to owner lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub owner_id: String,
    pub title: Option<String>,
    pub status: SessionStatus,
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub deleted: bool,
}

impl ChatSession {
    /// Timestamp used to order session listings.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// A single persisted message.
///
/// `sequence_num` starts at 1 and is gapless within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub owner_id: String,
    pub role: Role,
    pub content: String,
    pub sequence_num: u32,
    pub tokens_used: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Row of a session listing, with a preview of the latest message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionSummary {
    pub fn new(session: &ChatSession, last_message: Option<&ChatMessage>) -> Self {
        let title = if session.has_title() {
            session.title.clone().unwrap_or_default()
        } else {
            DEFAULT_SESSION_TITLE.to_string()
        };

        Self {
            id: session.id,
            title,
            last_message: last_message
                .map(|m| truncate_preview(&m.content, PREVIEW_MAX_CHARS))
                .unwrap_or_default(),
            timestamp: session.activity_at(),
        }
    }
}

/// Truncate on a character boundary, appending `...` when shortened.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Key for per-conversation ephemeral state (memory cache, context registry,
/// disambiguation state).
///
/// Persisted sessions are keyed by their id. The quick-schedule flow has no
/// persisted session and uses one fixed key per caller instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SessionKey {
    Session(Uuid),
    QuickSchedule(String),
}

impl SessionKey {
    pub fn quick_schedule(owner_id: &str) -> Self {
        SessionKey::QuickSchedule(owner_id.to_string())
    }

    /// The persisted session id, if this key refers to one.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            SessionKey::Session(id) => Some(*id),
            SessionKey::QuickSchedule(_) => None,
        }
    }
}

impl From<Uuid> for SessionKey {
    fn from(id: Uuid) -> Self {
        SessionKey::Session(id)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Session(id) => write!(f, "{id}"),
            SessionKey::QuickSchedule(owner) => write!(f, "quick-schedule-{owner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(title: Option<&str>) -> ChatSession {
        let now = Utc::now();
        ChatSession {
            id: Uuid::now_v7(),
            owner_id: "u1".to_string(),
            title: title.map(str::to_string),
            status: SessionStatus::Active,
            message_count: 0,
            created_at: now,
            updated_at: now,
            last_message_at: None,
            deleted: false,
        }
    }

    #[test]
    fn test_session_status_roundtrip() {
        for status in [SessionStatus::Active, SessionStatus::Closed] {
            let parsed: SessionStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_role_serde_and_history_label() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(Role::Assistant.history_label(), "ai");
        assert_eq!(Role::User.history_label(), "user");
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_summary_defaults_title_and_truncates_preview() {
        let s = session(None);
        let long = "x".repeat(80);
        let msg = ChatMessage {
            id: Uuid::now_v7(),
            session_id: s.id,
            owner_id: "u1".to_string(),
            role: Role::User,
            content: long,
            sequence_num: 1,
            tokens_used: None,
            created_at: Utc::now(),
        };

        let summary = SessionSummary::new(&s, Some(&msg));
        assert_eq!(summary.title, DEFAULT_SESSION_TITLE);
        assert_eq!(summary.last_message.chars().count(), PREVIEW_MAX_CHARS + 3);
        assert!(summary.last_message.ends_with("..."));
        assert_eq!(summary.timestamp, s.created_at);
    }

    #[test]
    fn test_blank_title_counts_as_untitled() {
        assert!(!session(Some("  ")).has_title());
        assert!(session(Some("Plans")).has_title());
    }

    #[test]
    fn test_truncate_preview_respects_char_boundaries() {
        assert_eq!(truncate_preview("日程安排", 2), "日程...");
        assert_eq!(truncate_preview("short", 50), "short");
    }

    #[test]
    fn test_session_key_display() {
        let id = Uuid::now_v7();
        assert_eq!(SessionKey::from(id).to_string(), id.to_string());
        assert_eq!(
            SessionKey::quick_schedule("42").to_string(),
            "quick-schedule-42"
        );
        assert_eq!(SessionKey::quick_schedule("42").session_id(), None);
    }
}
