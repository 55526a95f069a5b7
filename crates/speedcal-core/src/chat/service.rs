//! Chat service orchestrating sessions and turns.
//!
//! ChatService coordinates the ChatRepository, the memory cache, the context
//! registry and the tool dispatcher to run a turn end to end: resolve and
//! authorize the session, hydrate history, drive the model/tool loop, and
//! persist the user message together with the assistant reply once the
//! turn has fully resolved.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use speedcal_types::chat::{ChatMessage, ChatSession, SessionKey, SessionSummary};
use speedcal_types::config::AppConfig;
use speedcal_types::error::ChatError;
use speedcal_types::llm::{CompletionRequest, Message, StreamEvent, ToolDefinition, ToolUse};
use speedcal_types::push::PushEvent;
use speedcal_types::tool::ToolSet;

use super::prompt::{calendar_system_prompt, quick_schedule_system_prompt};
use super::repository::ChatRepository;
use super::stream::{StreamingCoordinator, tokens_used};
use crate::context::registry::{ContextRegistry, TurnContext};
use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::cache::{MemoryCache, window};
use crate::schedule::repository::ScheduleRepository;
use crate::tools::dispatcher::ToolDispatcher;
use crate::tools::schema::definitions;

/// Model and turn limits used by the service.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub memory_window: usize,
    pub max_tool_rounds: usize,
    /// Upper bound on a whole turn, streaming or not.
    pub turn_timeout: Duration,
}

impl From<&AppConfig> for ChatSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            memory_window: config.chat.memory_window,
            max_tool_rounds: config.chat.max_tool_rounds,
            turn_timeout: Duration::from_secs(config.chat.stream_timeout_secs),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Result of a non-streaming turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub session_id: Uuid,
    pub message: ChatMessage,
}

/// Handle to a turn running in the background.
#[derive(Debug)]
pub struct StreamingTurn {
    /// `None` for stateless quick-schedule turns.
    pub session_id: Option<Uuid>,
    pub events: mpsc::Receiver<PushEvent>,
    /// Cancelling this aborts the turn without persisting anything.
    pub cancellation: CancellationToken,
}

/// Where a finished turn is written.
#[derive(Debug, Clone)]
enum TurnTarget {
    Session { id: Uuid, user_content: String },
    Stateless,
}

/// What the model produced for a turn.
#[derive(Debug)]
struct ModelReply {
    content: String,
    output_tokens: u32,
}

/// Payload of the completion event.
struct Completion {
    session_id: Option<Uuid>,
    message_id: Option<Uuid>,
    tokens_used: u32,
}

/// Invalidates a stateless session's memory when the turn ends.
struct StatelessScope {
    memory: MemoryCache,
    key: SessionKey,
}

impl Drop for StatelessScope {
    fn drop(&mut self) {
        self.memory.invalidate(&self.key);
    }
}

/// Orchestrates chat sessions and model turns.
///
/// Generic over `ChatRepository` and `ScheduleRepository` so speedcal-core
/// never depends on speedcal-infra.
pub struct ChatService<C, S> {
    chats: Arc<C>,
    provider: Arc<BoxLlmProvider>,
    dispatcher: Arc<ToolDispatcher<S>>,
    registry: ContextRegistry,
    memory: MemoryCache,
    settings: ChatSettings,
}

impl<C, S> ChatService<C, S>
where
    C: ChatRepository + 'static,
    S: ScheduleRepository + 'static,
{
    pub fn new(
        chats: Arc<C>,
        schedules: Arc<S>,
        provider: BoxLlmProvider,
        settings: ChatSettings,
    ) -> Self {
        let registry = ContextRegistry::new();
        let dispatcher = Arc::new(ToolDispatcher::new(schedules, registry.clone()));
        Self {
            chats,
            provider: Arc::new(provider),
            dispatcher,
            registry,
            memory: MemoryCache::new(),
            settings,
        }
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    // --- Session lifecycle ---

    pub async fn create_session(
        &self,
        caller_id: &str,
        title: Option<&str>,
    ) -> Result<ChatSession, ChatError> {
        let session = self
            .chats
            .create_session(caller_id, clean_title(title).as_deref())
            .await?;
        info!(session_id = %session.id, caller_id, "chat session created");
        Ok(session)
    }

    /// The caller's sessions with a preview of each last message, most
    /// recently active first.
    pub async fn list_sessions(&self, caller_id: &str) -> Result<Vec<SessionSummary>, ChatError> {
        let sessions = self.chats.list_sessions(caller_id).await?;
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in &sessions {
            let last = self.chats.last_message(&session.id).await?;
            summaries.push(SessionSummary::new(session, last.as_ref()));
        }
        Ok(summaries)
    }

    pub async fn get_history(
        &self,
        caller_id: &str,
        session_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        self.chats
            .list_messages(session_id, caller_id)
            .await
            .map_err(ChatError::from_lookup)
    }

    pub async fn delete_session(&self, caller_id: &str, session_id: &Uuid) -> Result<(), ChatError> {
        self.chats
            .soft_delete(session_id, caller_id)
            .await
            .map_err(ChatError::from_lookup)?;
        let key = SessionKey::from(*session_id);
        self.memory.invalidate(&key);
        self.dispatcher.pending().clear_session(&key);
        info!(session_id = %session_id, caller_id, "chat session deleted");
        Ok(())
    }

    // --- Turns ---

    /// Run a turn to completion and return the persisted assistant message.
    pub async fn send_message(
        &self,
        caller_id: &str,
        session_id: Option<Uuid>,
        content: &str,
        title: Option<&str>,
    ) -> Result<TurnReply, ChatError> {
        let content = validate_content(content)?;
        let session = self.resolve_session(caller_id, session_id, title).await?;
        let ctx = TurnContext::new(caller_id, SessionKey::from(session.id), ToolSet::Calendar);
        let _binding = self.registry.enter(&ctx);

        let messages = self.compose(&ctx.session_key, &content).await?;
        let system = calendar_system_prompt(&Local::now());

        let limit = self.settings.turn_timeout;
        let deadline = Instant::now() + limit;
        let reply = tokio::time::timeout_at(deadline, self.run_complete(&ctx, system, messages))
            .await
            .map_err(|_| ChatError::Timeout(limit.as_secs()))??;

        let tokens = tokens_used(&reply.content, reply.output_tokens);
        let (user, assistant) = tokio::time::timeout_at(
            deadline,
            self.chats
                .append_turn(&session.id, caller_id, &content, &reply.content, tokens),
        )
        .await
        .map_err(|_| ChatError::Timeout(limit.as_secs()))??;
        self.memory
            .record_turn(&ctx.session_key, user, assistant.clone());

        info!(turn_id = %ctx.turn_id, session_id = %session.id, tokens, "turn completed");
        Ok(TurnReply {
            session_id: session.id,
            message: assistant,
        })
    }

    /// Start a streamed turn in a session. Validation and authorization
    /// happen before this returns; the model runs in a background task.
    pub async fn send_message_stream(
        self: &Arc<Self>,
        caller_id: &str,
        session_id: Option<Uuid>,
        content: &str,
        title: Option<&str>,
    ) -> Result<StreamingTurn, ChatError> {
        let content = validate_content(content)?;
        let session = self.resolve_session(caller_id, session_id, title).await?;
        let ctx = TurnContext::new(caller_id, SessionKey::from(session.id), ToolSet::Calendar);

        let messages = self.compose(&ctx.session_key, &content).await?;
        let system = calendar_system_prompt(&Local::now());
        let target = TurnTarget::Session {
            id: session.id,
            user_content: content,
        };

        Ok(self.spawn_turn(ctx, target, system, messages, Some(session.id)))
    }

    /// Start a stateless quick-schedule turn: create-only tools, no stored
    /// history, nothing persisted.
    pub async fn quick_schedule_stream(
        self: &Arc<Self>,
        caller_id: &str,
        content: &str,
    ) -> Result<StreamingTurn, ChatError> {
        let content = validate_content(content)?;
        let key = SessionKey::quick_schedule(caller_id);
        self.memory.invalidate(&key);

        let ctx = TurnContext::new(caller_id, key, ToolSet::QuickSchedule);
        let system = quick_schedule_system_prompt(&Local::now());
        let messages = vec![Message::user(content)];

        Ok(self.spawn_turn(ctx, TurnTarget::Stateless, system, messages, None))
    }

    fn spawn_turn(
        self: &Arc<Self>,
        ctx: TurnContext,
        target: TurnTarget,
        system: String,
        messages: Vec<Message>,
        session_id: Option<Uuid>,
    ) -> StreamingTurn {
        let (coordinator, events) = StreamingCoordinator::channel();
        let cancellation = ctx.cancellation.clone();
        tokio::spawn(Arc::clone(self).drive_stream(ctx, target, system, messages, coordinator));
        StreamingTurn {
            session_id,
            events,
            cancellation,
        }
    }

    async fn drive_stream(
        self: Arc<Self>,
        ctx: TurnContext,
        target: TurnTarget,
        system: String,
        messages: Vec<Message>,
        mut coordinator: StreamingCoordinator,
    ) {
        let _binding = self.registry.enter(&ctx);
        let _scope = matches!(target, TurnTarget::Stateless).then(|| StatelessScope {
            memory: self.memory.clone(),
            key: ctx.session_key.clone(),
        });

        // One deadline covers the model run and persistence.
        let limit = self.settings.turn_timeout;
        let deadline = Instant::now() + limit;
        let timed_out = || ChatError::Timeout(limit.as_secs());

        let disconnected = coordinator.disconnected();
        let outcome = {
            let run = self.run_streaming(&ctx, system, messages, &mut coordinator);
            tokio::select! {
                result = tokio::time::timeout_at(deadline, run) => {
                    result.unwrap_or_else(|_| Err(timed_out()))
                }
                _ = disconnected => {
                    ctx.cancel();
                    Err(ChatError::Cancelled)
                }
                _ = ctx.cancellation.cancelled() => Err(ChatError::Cancelled),
            }
        };
        let outcome = match outcome {
            Ok(reply) => tokio::time::timeout_at(deadline, self.persist(&ctx, target, reply))
                .await
                .unwrap_or_else(|_| Err(timed_out())),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(done) => {
                coordinator
                    .complete(done.session_id, done.message_id, done.tokens_used)
                    .await;
            }
            Err(ChatError::Cancelled) => {
                coordinator.cancel();
                info!(turn_id = %ctx.turn_id, session = %ctx.session_key, "turn cancelled");
            }
            Err(e) => {
                warn!(turn_id = %ctx.turn_id, session = %ctx.session_key, error = %e, "turn failed");
                coordinator.fail(e.client_message()).await;
            }
        }
    }

    /// Persist a finished streamed turn and return what the completion event
    /// carries.
    async fn persist(
        &self,
        ctx: &TurnContext,
        target: TurnTarget,
        reply: ModelReply,
    ) -> Result<Completion, ChatError> {
        let tokens = tokens_used(&reply.content, reply.output_tokens);
        match target {
            TurnTarget::Session { id, user_content } => {
                let (user, assistant) = self
                    .chats
                    .append_turn(&id, &ctx.caller_id, &user_content, &reply.content, tokens)
                    .await?;
                let message_id = assistant.id;
                self.memory.record_turn(&ctx.session_key, user, assistant);
                info!(turn_id = %ctx.turn_id, session_id = %id, tokens, "turn completed");
                Ok(Completion {
                    session_id: Some(id),
                    message_id: Some(message_id),
                    tokens_used: tokens,
                })
            }
            TurnTarget::Stateless => {
                info!(turn_id = %ctx.turn_id, session = %ctx.session_key, tokens, "quick schedule turn completed");
                Ok(Completion {
                    session_id: None,
                    message_id: None,
                    tokens_used: tokens,
                })
            }
        }
    }

    async fn run_complete(
        &self,
        ctx: &TurnContext,
        system: String,
        mut messages: Vec<Message>,
    ) -> Result<ModelReply, ChatError> {
        let tools = definitions(ctx.tool_set);
        let mut output_tokens = 0;
        let mut rounds = 0;

        loop {
            let request = self.request(&system, &messages, &tools, false);
            let response = self.provider.complete(&request).await?;
            output_tokens += response.usage.output_tokens;

            if response.tool_calls.is_empty() {
                return Ok(ModelReply {
                    content: response.content,
                    output_tokens,
                });
            }
            if rounds == self.settings.max_tool_rounds {
                return Err(ChatError::ToolLoopExceeded(rounds));
            }
            rounds += 1;
            self.run_tools(ctx, &mut messages, response.content, response.tool_calls)
                .await?;
        }
    }

    /// The streamed counterpart of `run_complete`. Text from every round is
    /// forwarded and becomes part of the stored reply.
    async fn run_streaming(
        &self,
        ctx: &TurnContext,
        system: String,
        mut messages: Vec<Message>,
        coordinator: &mut StreamingCoordinator,
    ) -> Result<ModelReply, ChatError> {
        let tools = definitions(ctx.tool_set);
        let mut output_tokens = 0;
        let mut rounds = 0;

        loop {
            let mut stream = self
                .provider
                .stream(self.request(&system, &messages, &tools, true));
            let mut round_text = String::new();
            let mut calls = Vec::new();

            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::TextDelta { text, .. } => {
                        coordinator.partial(&text).await?;
                        round_text.push_str(&text);
                    }
                    StreamEvent::ToolUseComplete { id, name, input } => {
                        calls.push(ToolUse { id, name, input });
                    }
                    StreamEvent::Usage(usage) => output_tokens += usage.output_tokens,
                    StreamEvent::Done => break,
                    StreamEvent::Connected | StreamEvent::MessageDelta { .. } => {}
                }
            }

            if calls.is_empty() {
                return Ok(ModelReply {
                    content: coordinator.content().to_string(),
                    output_tokens,
                });
            }
            if rounds == self.settings.max_tool_rounds {
                return Err(ChatError::ToolLoopExceeded(rounds));
            }
            rounds += 1;
            self.run_tools(ctx, &mut messages, round_text, calls).await?;
        }
    }

    /// Execute one round of tool calls and append their results.
    async fn run_tools(
        &self,
        ctx: &TurnContext,
        messages: &mut Vec<Message>,
        text: String,
        calls: Vec<ToolUse>,
    ) -> Result<(), ChatError> {
        messages.push(Message::assistant_tool_calls(text, calls.clone()));
        for call in calls {
            if ctx.is_cancelled() {
                return Err(ChatError::Cancelled);
            }
            let result = self.dispatcher.dispatch(ctx, &call.name, call.input).await;
            messages.push(Message::tool_result(call.id, result));
        }
        Ok(())
    }

    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        stream: bool,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: messages.to_vec(),
            system: Some(system.to_string()),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            stream,
            tools: tools.to_vec(),
        }
    }

    /// History window plus the new user message.
    async fn compose(&self, key: &SessionKey, content: &str) -> Result<Vec<Message>, ChatError> {
        let history = self.memory.load(key, self.chats.as_ref()).await?;
        let mut messages: Vec<Message> = window(&history, self.settings.memory_window)
            .iter()
            .map(|m| Message::new(m.role.into(), m.content.clone()))
            .collect();
        messages.push(Message::user(content));
        Ok(messages)
    }

    async fn resolve_session(
        &self,
        caller_id: &str,
        session_id: Option<Uuid>,
        title: Option<&str>,
    ) -> Result<ChatSession, ChatError> {
        let title = clean_title(title);
        let Some(id) = session_id else {
            return self.create_session(caller_id, title.as_deref()).await;
        };

        let mut session = self
            .chats
            .get_session(&id, caller_id)
            .await
            .map_err(ChatError::from_lookup)?;
        if let Some(title) = title {
            if !session.has_title() && self.chats.set_title_if_empty(&id, caller_id, &title).await? {
                session.title = Some(title);
            }
        }
        Ok(session)
    }
}

fn validate_content(content: &str) -> Result<String, ChatError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation("message must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn clean_title(title: Option<&str>) -> Option<String> {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
