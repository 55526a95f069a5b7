use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in speedcal-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by the chat service to its callers.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Rejected input (blank message, malformed identifier). Raised before any model call.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The session does not exist, is not owned by the caller, or is soft-deleted.
    #[error("session not found or not accessible")]
    NotFound,

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("model error: {0}")]
    Model(#[from] LlmError),

    #[error("model did not finish within {0}s")]
    Timeout(u64),

    #[error("turn cancelled by client")]
    Cancelled,

    #[error("model kept requesting tools after {0} rounds")]
    ToolLoopExceeded(usize),
}

impl ChatError {
    /// Map a repository `NotFound` onto the owner-scoped access error.
    pub fn from_lookup(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ChatError::NotFound,
            other => ChatError::Repository(other),
        }
    }

    /// Text safe to show the end user. Provider and storage details stay in
    /// the logs.
    pub fn client_message(&self) -> String {
        match self {
            ChatError::Model(_) => {
                "The AI service is temporarily unavailable, please try again later".to_string()
            }
            ChatError::Repository(_) => {
                "Storage is temporarily unavailable, please try again later".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Tool execution outcomes that are reported back to the model as text.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),

    #[error("index {index} is out of range, choose a number between 1 and {count}")]
    OutOfRange { index: i64, count: usize },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("could not determine the current user, please sign in again")]
    MissingCaller,

    #[error("schedule storage failed: {0}")]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_out_of_range_display() {
        let err = ToolError::OutOfRange { index: 4, count: 3 };
        assert_eq!(
            err.to_string(),
            "index 4 is out of range, choose a number between 1 and 3"
        );
    }

    #[test]
    fn test_from_lookup_maps_not_found() {
        assert!(matches!(
            ChatError::from_lookup(RepositoryError::NotFound),
            ChatError::NotFound
        ));
        assert!(matches!(
            ChatError::from_lookup(RepositoryError::Connection),
            ChatError::Repository(RepositoryError::Connection)
        ));
    }

    #[test]
    fn test_chat_error_from_llm() {
        let err: ChatError = LlmError::AuthenticationFailed.into();
        assert_eq!(err.to_string(), "model error: authentication failed");
    }

    #[test]
    fn test_client_message_hides_internal_details() {
        let model: ChatError = LlmError::AuthenticationFailed.into();
        assert!(!model.client_message().contains("authentication"));

        let storage = ChatError::Repository(RepositoryError::Query("no such table: chat_message".into()));
        assert!(!storage.client_message().contains("chat_message"));

        assert_eq!(
            ChatError::Timeout(30).client_message(),
            "model did not finish within 30s"
        );
    }
}
