//! Events pushed to the client while a turn streams.
//!
//! A turn produces zero or more [`PushEvent::Partial`] events followed by
//! exactly one terminal event, [`PushEvent::Completed`] or
//! [`PushEvent::Failed`]. The JSON shapes are fixed by the client protocol:
//!
//! ```json
//! {"content": "tok", "done": false}
//! {"content": "", "done": true, "sessionId": "...", "messageId": "...", "tokensUsed": 12}
//! {"error": "...", "done": true}
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// One streamed chunk of assistant text.
    Partial { content: String },

    /// The turn finished and (for persisted sessions) was stored.
    ///
    /// Stateless turns carry no session or message id.
    Completed {
        session_id: Option<Uuid>,
        message_id: Option<Uuid>,
        tokens_used: u32,
    },

    /// The turn failed; nothing was stored for the assistant.
    Failed { error: String },
}

impl PushEvent {
    pub fn partial(content: impl Into<String>) -> Self {
        PushEvent::Partial {
            content: content.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        PushEvent::Failed {
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PushEvent::Partial { .. })
    }

    /// Serialize to the JSON string sent as an SSE `data:` frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"error":"serialization failed","done":true}"#.to_string())
    }
}

impl Serialize for PushEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PushEvent::Partial { content } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("content", content)?;
                map.serialize_entry("done", &false)?;
                map.end()
            }
            PushEvent::Completed {
                session_id,
                message_id,
                tokens_used,
            } => {
                let len = 3 + usize::from(session_id.is_some()) + usize::from(message_id.is_some());
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("content", "")?;
                map.serialize_entry("done", &true)?;
                if let Some(id) = session_id {
                    map.serialize_entry("sessionId", id)?;
                }
                if let Some(id) = message_id {
                    map.serialize_entry("messageId", id)?;
                }
                map.serialize_entry("tokensUsed", tokens_used)?;
                map.end()
            }
            PushEvent::Failed { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("error", error)?;
                map.serialize_entry("done", &true)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_shape_escapes_content() {
        let ev = PushEvent::partial("say \"hi\"\n");
        let value: serde_json::Value = serde_json::from_str(&ev.to_json()).unwrap();
        assert_eq!(value, json!({"content": "say \"hi\"\n", "done": false}));
        assert!(!ev.is_terminal());
    }

    #[test]
    fn test_completed_shape() {
        let sid = Uuid::now_v7();
        let mid = Uuid::now_v7();
        let ev = PushEvent::Completed {
            session_id: Some(sid),
            message_id: Some(mid),
            tokens_used: 7,
        };
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            value,
            json!({
                "content": "",
                "done": true,
                "sessionId": sid.to_string(),
                "messageId": mid.to_string(),
                "tokensUsed": 7
            })
        );
        assert!(ev.is_terminal());
    }

    #[test]
    fn test_stateless_completed_omits_ids() {
        let ev = PushEvent::Completed {
            session_id: None,
            message_id: None,
            tokens_used: 3,
        };
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value, json!({"content": "", "done": true, "tokensUsed": 3}));
    }

    #[test]
    fn test_failed_shape() {
        let value = serde_json::to_value(PushEvent::failed("model down")).unwrap();
        assert_eq!(value, json!({"error": "model down", "done": true}));
    }
}
