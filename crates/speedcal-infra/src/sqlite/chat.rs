//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `speedcal-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, owner checks in SQL.
//! Appends run in a writer transaction that assigns `MAX(sequence_num) + 1`
//! and bumps the session counters in the same unit of work.

use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use speedcal_core::chat::repository::ChatRepository;
use speedcal_types::chat::{ChatMessage, ChatSession, Role, SessionStatus};
use speedcal_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatSessionRow {
    id: String,
    owner_id: String,
    title: Option<String>,
    status: String,
    message_count: i64,
    created_at: String,
    updated_at: String,
    last_message_at: Option<String>,
    deleted: i64,
}

impl ChatSessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            title: row.try_get("title")?,
            status: row.try_get("status")?,
            message_count: row.try_get("message_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            last_message_at: row.try_get("last_message_at")?,
            deleted: row.try_get("deleted")?,
        })
    }

    fn into_session(self) -> Result<ChatSession, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid session id: {e}")))?;
        let status: SessionStatus = self.status.parse().map_err(RepositoryError::Query)?;

        Ok(ChatSession {
            id,
            owner_id: self.owner_id,
            title: self.title,
            status,
            message_count: u32::try_from(self.message_count).unwrap_or(0),
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            last_message_at: self
                .last_message_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            deleted: self.deleted != 0,
        })
    }
}

struct ChatMessageRow {
    id: String,
    session_id: String,
    owner_id: String,
    role: String,
    content: String,
    sequence_num: i64,
    tokens_used: Option<i64>,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            owner_id: row.try_get("owner_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            sequence_num: row.try_get("sequence_num")?,
            tokens_used: row.try_get("tokens_used")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let session_id = Uuid::parse_str(&self.session_id)
            .map_err(|e| RepositoryError::Query(format!("invalid session_id: {e}")))?;
        let role: Role = self.role.parse().map_err(RepositoryError::Query)?;

        Ok(ChatMessage {
            id,
            session_id,
            owner_id: self.owner_id,
            role,
            content: self.content,
            sequence_num: u32::try_from(self.sequence_num)
                .map_err(|e| RepositoryError::Query(format!("invalid sequence_num: {e}")))?,
            tokens_used: self.tokens_used.and_then(|v| u32::try_from(v).ok()),
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn rows_to_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ChatMessage>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let msg_row = ChatMessageRow::from_row(row).map_err(query_error)?;
        messages.push(msg_row.into_message()?);
    }
    Ok(messages)
}

// ---------------------------------------------------------------------------
// Transaction helpers
// ---------------------------------------------------------------------------

/// Fail with `NotFound` unless the session is live and owned by `owner_id`.
async fn ensure_owned(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: &Uuid,
    owner_id: &str,
) -> Result<(), RepositoryError> {
    let row = sqlx::query("SELECT 1 FROM chat_sessions WHERE id = ? AND owner_id = ? AND deleted = 0")
        .bind(session_id.to_string())
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(query_error)?;

    match row {
        Some(_) => Ok(()),
        None => Err(RepositoryError::NotFound),
    }
}

/// Insert one message with the next sequence number and update the
/// session's counters. Must run inside the caller's transaction.
async fn insert_message(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: &Uuid,
    owner_id: &str,
    role: Role,
    content: &str,
    tokens_used: Option<u32>,
) -> Result<ChatMessage, RepositoryError> {
    let next: i64 = sqlx::query(
        "SELECT COALESCE(MAX(sequence_num), 0) + 1 AS next FROM chat_messages WHERE session_id = ?",
    )
    .bind(session_id.to_string())
    .fetch_one(&mut **tx)
    .await
    .and_then(|row| row.try_get("next"))
    .map_err(query_error)?;

    let message = ChatMessage {
        id: Uuid::now_v7(),
        session_id: *session_id,
        owner_id: owner_id.to_string(),
        role,
        content: content.to_string(),
        sequence_num: u32::try_from(next)
            .map_err(|e| RepositoryError::Query(format!("sequence overflow: {e}")))?,
        tokens_used,
        created_at: Utc::now(),
    };
    let created_at = format_datetime(&message.created_at);

    sqlx::query(
        r#"INSERT INTO chat_messages (id, session_id, owner_id, role, content, sequence_num, tokens_used, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(message.id.to_string())
    .bind(session_id.to_string())
    .bind(owner_id)
    .bind(role.to_string())
    .bind(content)
    .bind(next)
    .bind(tokens_used.map(i64::from))
    .bind(&created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.message().contains("UNIQUE") {
                return RepositoryError::Conflict(format!(
                    "sequence {next} already taken in session {session_id}"
                ));
            }
        }
        query_error(e)
    })?;

    sqlx::query(
        r#"UPDATE chat_sessions
           SET message_count = message_count + 1, last_message_at = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&created_at)
    .bind(&created_at)
    .bind(session_id.to_string())
    .execute(&mut **tx)
    .await
    .map_err(query_error)?;

    Ok(message)
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_session(
        &self,
        owner_id: &str,
        title: Option<&str>,
    ) -> Result<ChatSession, RepositoryError> {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            title: title.map(str::to_string),
            status: SessionStatus::Active,
            message_count: 0,
            created_at: now,
            updated_at: now,
            last_message_at: None,
            deleted: false,
        };

        sqlx::query(
            r#"INSERT INTO chat_sessions (id, owner_id, title, status, message_count, created_at, updated_at, last_message_at, deleted)
               VALUES (?, ?, ?, ?, 0, ?, ?, NULL, 0)"#,
        )
        .bind(session.id.to_string())
        .bind(owner_id)
        .bind(&session.title)
        .bind(session.status.to_string())
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(session)
    }

    async fn get_session(
        &self,
        session_id: &Uuid,
        owner_id: &str,
    ) -> Result<ChatSession, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ? AND owner_id = ? AND deleted = 0")
            .bind(session_id.to_string())
            .bind(owner_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?
            .ok_or(RepositoryError::NotFound)?;

        ChatSessionRow::from_row(&row)
            .map_err(query_error)?
            .into_session()
    }

    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM chat_sessions
               WHERE owner_id = ? AND deleted = 0
               ORDER BY COALESCE(last_message_at, created_at) DESC"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = ChatSessionRow::from_row(row).map_err(query_error)?;
            sessions.push(session_row.into_session()?);
        }
        Ok(sessions)
    }

    async fn set_title_if_empty(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        title: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE chat_sessions SET title = ?, updated_at = ?
               WHERE id = ? AND owner_id = ? AND deleted = 0 AND (title IS NULL OR TRIM(title) = '')"#,
        )
        .bind(title)
        .bind(format_datetime(&Utc::now()))
        .bind(session_id.to_string())
        .bind(owner_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, session_id: &Uuid, owner_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE chat_sessions SET deleted = 1, updated_at = ? WHERE id = ? AND owner_id = ? AND deleted = 0",
        )
        .bind(format_datetime(&Utc::now()))
        .bind(session_id.to_string())
        .bind(owner_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        role: Role,
        content: &str,
        tokens_used: Option<u32>,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        ensure_owned(&mut tx, session_id, owner_id).await?;
        let message = insert_message(&mut tx, session_id, owner_id, role, content, tokens_used).await?;
        tx.commit().await.map_err(query_error)?;
        Ok(message)
    }

    async fn append_turn(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        user_content: &str,
        assistant_content: &str,
        tokens_used: u32,
    ) -> Result<(ChatMessage, ChatMessage), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        ensure_owned(&mut tx, session_id, owner_id).await?;
        let user = insert_message(&mut tx, session_id, owner_id, Role::User, user_content, None).await?;
        let assistant = insert_message(
            &mut tx,
            session_id,
            owner_id,
            Role::Assistant,
            assistant_content,
            Some(tokens_used),
        )
        .await?;
        tx.commit().await.map_err(query_error)?;

        tracing::debug!(
            session_id = %session_id,
            user_seq = user.sequence_num,
            assistant_seq = assistant.sequence_num,
            "turn persisted"
        );
        Ok((user, assistant))
    }

    async fn list_messages(
        &self,
        session_id: &Uuid,
        owner_id: &str,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let session = sqlx::query("SELECT 1 FROM chat_sessions WHERE id = ? AND owner_id = ? AND deleted = 0")
            .bind(session_id.to_string())
            .bind(owner_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        if session.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.list_messages_unscoped(session_id).await
    }

    async fn list_messages_unscoped(
        &self,
        session_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM chat_messages WHERE session_id = ? ORDER BY sequence_num ASC")
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows_to_messages(&rows)
    }

    async fn last_message(&self, session_id: &Uuid) -> Result<Option<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY sequence_num DESC LIMIT 1",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;
        Ok(rows_to_messages(&rows)?.pop())
    }
}
