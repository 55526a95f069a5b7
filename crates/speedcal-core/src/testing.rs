//! In-memory repositories and a scripted model provider shared by the
//! crate's unit tests.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use futures_util::Stream;
use uuid::Uuid;

use speedcal_types::chat::{ChatMessage, ChatSession, Role, SessionStatus};
use speedcal_types::error::RepositoryError;
use speedcal_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, ToolUse, Usage,
};
use speedcal_types::schedule::{NewSchedule, Schedule};

use crate::chat::repository::ChatRepository;
use crate::llm::provider::LlmProvider;
use crate::schedule::repository::ScheduleRepository;

#[derive(Default)]
pub struct InMemoryChatRepository {
    sessions: Mutex<Vec<ChatSession>>,
    messages: Mutex<Vec<ChatMessage>>,
    fail_writes: AtomicBool,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent message write fail with a query error.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn live_session(&self, session_id: &Uuid, owner_id: &str) -> Result<ChatSession, RepositoryError> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == *session_id && s.owner_id == owner_id && !s.deleted)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    fn push_message(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        role: Role,
        content: &str,
        tokens_used: Option<u32>,
    ) -> ChatMessage {
        let mut messages = self.messages.lock().unwrap();
        let next = messages
            .iter()
            .filter(|m| m.session_id == *session_id)
            .map(|m| m.sequence_num)
            .max()
            .map_or(1, |n| n + 1);
        let message = ChatMessage {
            id: Uuid::now_v7(),
            session_id: *session_id,
            owner_id: owner_id.to_string(),
            role,
            content: content.to_string(),
            sequence_num: next,
            tokens_used,
            created_at: Utc::now(),
        };
        messages.push(message.clone());

        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.iter_mut().find(|s| s.id == *session_id) {
            session.message_count += 1;
            session.last_message_at = Some(message.created_at);
            session.updated_at = message.created_at;
        }
        message
    }
}

impl ChatRepository for InMemoryChatRepository {
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
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn get_session(
        &self,
        session_id: &Uuid,
        owner_id: &str,
    ) -> Result<ChatSession, RepositoryError> {
        self.live_session(session_id, owner_id)
    }

    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<ChatSession>, RepositoryError> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.owner_id == owner_id && !s.deleted)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
        Ok(sessions)
    }

    async fn set_title_if_empty(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        title: &str,
    ) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == *session_id && s.owner_id == owner_id && !s.deleted)
            .ok_or(RepositoryError::NotFound)?;
        if session.has_title() {
            return Ok(false);
        }
        session.title = Some(title.to_string());
        Ok(true)
    }

    async fn soft_delete(&self, session_id: &Uuid, owner_id: &str) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == *session_id && s.owner_id == owner_id && !s.deleted)
            .ok_or(RepositoryError::NotFound)?;
        session.deleted = true;
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
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk full".to_string()));
        }
        self.live_session(session_id, owner_id)?;
        Ok(self.push_message(session_id, owner_id, role, content, tokens_used))
    }

    async fn append_turn(
        &self,
        session_id: &Uuid,
        owner_id: &str,
        user_content: &str,
        assistant_content: &str,
        tokens_used: u32,
    ) -> Result<(ChatMessage, ChatMessage), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk full".to_string()));
        }
        self.live_session(session_id, owner_id)?;
        let user = self.push_message(session_id, owner_id, Role::User, user_content, None);
        let assistant = self.push_message(
            session_id,
            owner_id,
            Role::Assistant,
            assistant_content,
            Some(tokens_used),
        );
        Ok((user, assistant))
    }

    async fn list_messages(
        &self,
        session_id: &Uuid,
        owner_id: &str,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.live_session(session_id, owner_id)?;
        self.list_messages_unscoped(session_id).await
    }

    async fn list_messages_unscoped(
        &self,
        session_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == *session_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.sequence_num);
        Ok(messages)
    }

    async fn last_message(&self, session_id: &Uuid) -> Result<Option<ChatMessage>, RepositoryError> {
        Ok(self.list_messages_unscoped(session_id).await?.pop())
    }
}

#[derive(Default)]
pub struct InMemoryScheduleRepository {
    schedules: Mutex<Vec<Schedule>>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Schedule> {
        self.schedules.lock().unwrap().clone()
    }

    pub fn live_titles(&self, owner_id: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|s| s.owner_id == owner_id && !s.deleted)
            .map(|s| s.title)
            .collect()
    }
}

impl ScheduleRepository for InMemoryScheduleRepository {
    async fn create(&self, owner_id: &str, new: &NewSchedule) -> Result<Schedule, RepositoryError> {
        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            group_id: None,
            title: new.title.clone(),
            schedule_date: new.schedule_date,
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location.clone(),
            is_all_day: new.is_all_day,
            is_important: new.is_important,
            color: new.color.clone(),
            category: new.category.clone(),
            is_ai_generated: new.is_ai_generated,
            notes: new.notes.clone(),
            reminder_minutes: new.reminder_minutes,
            repeat_type: new.repeat_type,
            repeat_end_date: new.repeat_end_date,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.schedules.lock().unwrap().push(schedule.clone());
        Ok(schedule)
    }

    async fn list_by_range(
        &self,
        owner_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Schedule>, RepositoryError> {
        let mut found: Vec<Schedule> = self
            .all()
            .into_iter()
            .filter(|s| {
                s.owner_id == owner_id
                    && !s.deleted
                    && s.schedule_date >= from
                    && s.schedule_date <= to
            })
            .collect();
        found.sort_by_key(|s| (s.schedule_date, s.start_time));
        Ok(found)
    }

    async fn get(&self, owner_id: &str, id: &Uuid) -> Result<Option<Schedule>, RepositoryError> {
        Ok(self
            .all()
            .into_iter()
            .find(|s| s.id == *id && s.owner_id == owner_id && !s.deleted))
    }

    async fn soft_delete(&self, owner_id: &str, id: &Uuid) -> Result<(), RepositoryError> {
        let mut schedules = self.schedules.lock().unwrap();
        let schedule = schedules
            .iter_mut()
            .find(|s| s.id == *id && s.owner_id == owner_id && !s.deleted)
            .ok_or(RepositoryError::NotFound)?;
        schedule.deleted = true;
        Ok(())
    }
}

/// One step of a scripted model round.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Tool {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    Usage(u32),
    Fail(String),
    /// Never produce another event.
    Hang,
}

pub fn text(s: &str) -> Step {
    Step::Text(s.to_string())
}

pub fn tool(id: &str, name: &str, input: serde_json::Value) -> Step {
    Step::Tool {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

/// Model provider that replays one scripted round per request and records
/// every request it receives. Clones share the script.
#[derive(Clone)]
pub struct ScriptedProvider {
    rounds: Arc<Mutex<VecDeque<Vec<Step>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    capabilities: ProviderCapabilities,
}

impl ScriptedProvider {
    pub fn new(rounds: Vec<Vec<Step>>) -> Self {
        Self {
            rounds: Arc::new(Mutex::new(rounds.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calling: true,
                max_context_tokens: 32_768,
                max_output_tokens: 2048,
            },
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_round(&self, request: &CompletionRequest) -> Vec<Step> {
        self.requests.lock().unwrap().push(request.clone());
        self.rounds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![text("ok")])
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let steps = self.next_round(request);
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = Usage::default();
        for step in steps {
            match step {
                Step::Text(t) => content.push_str(&t),
                Step::Tool { id, name, input } => tool_calls.push(ToolUse { id, name, input }),
                Step::Usage(n) => usage.output_tokens = n,
                Step::Fail(message) => return Err(LlmError::Provider { message }),
                Step::Hang => futures_util::future::pending::<()>().await,
            }
        }
        let stop_reason = if tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        };
        Ok(CompletionResponse {
            id: "scripted".to_string(),
            content,
            model: request.model.clone(),
            stop_reason,
            usage,
            tool_calls,
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let steps = self.next_round(&request);
        Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Connected);
            for step in steps {
                match step {
                    Step::Text(text) => {
                        yield Ok(StreamEvent::TextDelta { index: 0, text });
                    }
                    Step::Tool { id, name, input } => {
                        yield Ok(StreamEvent::ToolUseComplete { id, name, input });
                    }
                    Step::Usage(n) => {
                        yield Ok(StreamEvent::Usage(Usage {
                            input_tokens: 0,
                            output_tokens: n,
                        }));
                    }
                    Step::Fail(message) => {
                        yield Err(LlmError::Stream(message));
                        return;
                    }
                    Step::Hang => futures_util::future::pending::<()>().await,
                }
            }
            yield Ok(StreamEvent::Done);
        })
    }
}
