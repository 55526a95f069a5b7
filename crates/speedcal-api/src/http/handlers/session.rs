//! Chat session HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/v1/ai/chat/sessions       - List the caller's sessions
//! - POST   /api/v1/ai/chat/sessions       - Create a session
//! - DELETE /api/v1/ai/chat/sessions/{id}  - Soft-delete a session
//! - GET    /api/v1/ai/chat/history/{id}   - Messages of a session

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use speedcal_types::chat::{ChatMessage, SessionSummary};

use super::parse_session_id;
use crate::http::error::AppError;
use crate::http::extractors::auth::Caller;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Optional body of `POST /sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: Option<String>,
}

/// One row of the session list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub id: String,
    pub title: String,
    pub last_message: String,
    /// Last activity, epoch milliseconds.
    pub timestamp: i64,
}

impl From<SessionSummary> for SessionDto {
    fn from(s: SessionSummary) -> Self {
        Self {
            id: s.id.to_string(),
            title: s.title,
            last_message: s.last_message,
            timestamp: s.timestamp.timestamp_millis(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessageDto {
    pub id: String,
    pub session_id: String,
    pub content: String,
    /// `user` or `ai`.
    pub role: &'static str,
    pub sequence_num: u32,
    pub tokens_used: Option<u32>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl From<ChatMessage> for HistoryMessageDto {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id.to_string(),
            session_id: m.session_id.to_string(),
            role: m.role.history_label(),
            content: m.content,
            sequence_num: m.sequence_num,
            tokens_used: m.tokens_used,
            timestamp: m.created_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryMessageDto>,
}

/// GET /api/v1/ai/chat/sessions - List sessions, most recently active first.
pub async fn list_sessions(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ApiResponse<Vec<SessionDto>>>, AppError> {
    let timer = RequestTimer::start();

    let sessions = state.chat_service.list_sessions(caller.id()).await?;
    let data: Vec<SessionDto> = sessions.into_iter().map(SessionDto::from).collect();

    Ok(timer.finish_with_link(data, "/api/v1/ai/chat/sessions"))
}

/// POST /api/v1/ai/chat/sessions - Create an empty session.
pub async fn create_session(
    State(state): State<AppState>,
    caller: Caller,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<Json<ApiResponse<SessionDto>>, AppError> {
    let timer = RequestTimer::start();
    let title = body.and_then(|Json(b)| b.title);

    let session = state
        .chat_service
        .create_session(caller.id(), title.as_deref())
        .await?;
    let data = SessionDto::from(SessionSummary::new(&session, None));
    let href = format!("/api/v1/ai/chat/history/{}", session.id);

    Ok(timer.finish_with_link(data, &href))
}

/// DELETE /api/v1/ai/chat/sessions/{id} - Soft-delete a session.
pub async fn delete_session(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    let session_id = parse_session_id(&id)?;

    state
        .chat_service
        .delete_session(caller.id(), &session_id)
        .await?;

    Ok(timer.finish(serde_json::json!({
        "deleted": true,
        "id": session_id.to_string(),
    })))
}

/// GET /api/v1/ai/chat/history/{id} - Messages of a session in order.
pub async fn get_history(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<HistoryResponse>>, AppError> {
    let timer = RequestTimer::start();
    let session_id = parse_session_id(&id)?;

    let messages = state
        .chat_service
        .get_history(caller.id(), &session_id)
        .await?;
    let data = HistoryResponse {
        messages: messages.into_iter().map(HistoryMessageDto::from).collect(),
    };

    Ok(timer.finish(data))
}
