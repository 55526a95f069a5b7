//! ChatRepository trait definition.
//!
//! Sessions and messages are owner-scoped: every operation that takes an
//! `owner_id` treats a session owned by someone else exactly like a missing
//! or soft-deleted one and fails with [`RepositoryError::NotFound`].

use speedcal_types::chat::{ChatMessage, ChatSession, Role};
use speedcal_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chat session and message persistence.
///
/// Implementations live in speedcal-infra (e.g., `SqliteChatRepository`).
pub trait ChatRepository: Send + Sync {
    /// Create a new active session for `owner_id`.
    fn create_session(
        &self,
        owner_id: &str,
        title: Option<&str>,
    ) -> impl std::future::Future<Output = Result<ChatSession, RepositoryError>> + Send;

    /// Fetch a live session owned by `owner_id`.
    fn get_session(
        &self,
        session_id: &Uuid,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<ChatSession, RepositoryError>> + Send;

    /// Live sessions of `owner_id`, most recent activity first.
    fn list_sessions(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// Set the title only if the session has none yet. Returns whether it was set.
    fn set_title_if_empty(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Soft-delete a session. Its messages stay but become unreachable.
    fn soft_delete(
        &self,
        session_id: &Uuid,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append one message, assigning the next sequence number.
    fn append_message(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        role: Role,
        content: &str,
        tokens_used: Option<u32>,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Append a user message and the assistant reply atomically.
    ///
    /// Either both rows are written with consecutive sequence numbers or
    /// neither is.
    fn append_turn(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        user_content: &str,
        assistant_content: &str,
        tokens_used: u32,
    ) -> impl std::future::Future<Output = Result<(ChatMessage, ChatMessage), RepositoryError>> + Send;

    /// Messages of a live session owned by `owner_id`, by sequence number.
    fn list_messages(
        &self,
        session_id: &Uuid,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// All stored messages of a session regardless of owner or deletion.
    ///
    /// Used only to hydrate the memory cache for a session whose access has
    /// already been checked.
    fn list_messages_unscoped(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// The highest-sequence message of a session, if any.
    fn last_message(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;
}
