//! Chat turn endpoints.
//!
//! - POST /api/v1/ai/chat/message         - Run a turn, reply when done
//! - POST /api/v1/ai/chat/stream          - Run a turn, stream it as SSE
//! - POST /api/v1/ai/chat/quick-schedule  - Stateless scheduling turn as SSE
//!
//! SSE frames carry one JSON object each, unnamed:
//! - `{"content": "...", "done": false}` for every text chunk
//! - `{"content": "", "done": true, "sessionId", "messageId", "tokensUsed"}` on success
//! - `{"error": "...", "done": true}` on failure
//!
//! Closing the connection cancels the turn; nothing is stored for it.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use speedcal_core::chat::service::StreamingTurn;

use super::parse_session_id;
use crate::http::error::AppError;
use crate::http::extractors::auth::Caller;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Header carrying the session a streamed turn runs in.
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("x-session-id");

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Body of `/message` and `/stream`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub message: String,
    /// Existing session to continue; a new one is created when absent.
    pub session_id: Option<String>,
    /// Title for a newly created session.
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuickScheduleRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub session_id: String,
    pub message_id: String,
    pub message: String,
    pub tokens_used: Option<u32>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// POST /api/v1/ai/chat/message - Non-streaming turn.
pub async fn send_message(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<MessageRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    let timer = RequestTimer::start();
    let session_id = body.session_id.as_deref().map(parse_session_id).transpose()?;

    let reply = state
        .chat_service
        .send_message(caller.id(), session_id, &body.message, body.title.as_deref())
        .await?;

    let data = MessageResponse {
        session_id: reply.session_id.to_string(),
        message_id: reply.message.id.to_string(),
        message: reply.message.content,
        tokens_used: reply.message.tokens_used,
        timestamp: reply.message.created_at.timestamp_millis(),
    };
    let href = format!("/api/v1/ai/chat/history/{}", reply.session_id);

    Ok(timer.finish_with_link(data, &href))
}

/// POST /api/v1/ai/chat/stream - Streaming turn as SSE.
pub async fn stream_message(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<MessageRequest>,
) -> Result<Response, AppError> {
    let session_id = body.session_id.as_deref().map(parse_session_id).transpose()?;

    let turn = state
        .chat_service
        .send_message_stream(caller.id(), session_id, &body.message, body.title.as_deref())
        .await?;

    Ok(sse_response(turn))
}

/// POST /api/v1/ai/chat/quick-schedule - Stateless quick-schedule turn as SSE.
pub async fn quick_schedule(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<QuickScheduleRequest>,
) -> Result<Response, AppError> {
    let turn = state
        .chat_service
        .quick_schedule_stream(caller.id(), &body.text)
        .await?;

    Ok(sse_response(turn))
}

/// Forward a turn's push events as SSE frames.
///
/// The turn is cancelled when the response body is dropped, which is how a
/// client disconnect reaches the background task.
fn sse_response(turn: StreamingTurn) -> Response {
    let StreamingTurn {
        session_id,
        mut events,
        cancellation,
    } = turn;

    let sse_stream = async_stream::stream! {
        let _guard = cancellation.drop_guard();
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(Event::default().data(event.to_json()));
            if terminal {
                break;
            }
        }
        debug!(session_id = ?session_id, "sse stream closed");
    };

    let mut response = Sse::new(sse_stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response();

    if let Some(id) = session_id
        && let Ok(value) = HeaderValue::from_str(&id.to_string())
    {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }

    response
}
