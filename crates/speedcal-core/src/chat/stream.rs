//! Streaming coordination for a single turn.
//!
//! The [`StreamingCoordinator`] owns the sending half of the client push
//! channel. It forwards model text as [`PushEvent::Partial`] in emission
//! order, accumulates the full reply, and guarantees that at most one
//! terminal event is ever sent. A dropped receiver (client disconnect)
//! surfaces as [`ChatError::Cancelled`] on the next send.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use speedcal_types::error::ChatError;
use speedcal_types::push::PushEvent;

/// Push channel depth. Partials are small; a slow client applies
/// backpressure to the model stream rather than growing memory.
pub const PUSH_CHANNEL_CAPACITY: usize = 64;

/// How long a terminal event may wait for room in a full channel before it
/// is given up on.
pub const TERMINAL_SEND_GRACE: Duration = Duration::from_millis(200);

/// Lifecycle of a streamed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Started,
    Streaming,
    Completed,
    Failed,
    /// The client went away; no terminal event can be delivered.
    Cancelled,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Completed | TurnState::Failed | TurnState::Cancelled
        )
    }

    /// The state after moving to `next`, or `None` if the move is illegal.
    pub fn advance(self, next: TurnState) -> Option<TurnState> {
        use TurnState::*;
        match (self, next) {
            (Started | Streaming, Streaming) => Some(Streaming),
            (Started | Streaming, Completed | Failed | Cancelled) => Some(next),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct StreamingCoordinator {
    tx: mpsc::Sender<PushEvent>,
    state: TurnState,
    content: String,
}

impl StreamingCoordinator {
    /// A coordinator and the receiver to hand to the client transport.
    pub fn channel() -> (Self, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        (
            Self {
                tx,
                state: TurnState::Started,
                content: String::new(),
            },
            rx,
        )
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Everything streamed so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Resolves once the client side of the channel is gone.
    pub fn disconnected(&self) -> impl Future<Output = ()> + Send + 'static {
        let tx = self.tx.clone();
        async move { tx.closed().await }
    }

    /// Forward one chunk of model text.
    pub async fn partial(&mut self, text: &str) -> Result<(), ChatError> {
        if text.is_empty() {
            return Ok(());
        }
        let Some(state) = self.state.advance(TurnState::Streaming) else {
            tracing::debug!(state = ?self.state, "turn already terminated, dropping partial");
            return Ok(());
        };
        self.state = state;
        self.content.push_str(text);
        if self.tx.send(PushEvent::partial(text)).await.is_err() {
            self.state = TurnState::Cancelled;
            return Err(ChatError::Cancelled);
        }
        Ok(())
    }

    /// Send the completion event. Returns whether it reached the client.
    pub async fn complete(
        &mut self,
        session_id: Option<Uuid>,
        message_id: Option<Uuid>,
        tokens_used: u32,
    ) -> bool {
        self.terminate(
            TurnState::Completed,
            PushEvent::Completed {
                session_id,
                message_id,
                tokens_used,
            },
        )
        .await
    }

    /// Send the error event. Returns whether it reached the client.
    pub async fn fail(&mut self, error: impl Into<String>) -> bool {
        self.terminate(TurnState::Failed, PushEvent::failed(error)).await
    }

    /// Mark the turn abandoned without sending anything.
    pub fn cancel(&mut self) {
        if let Some(next) = self.state.advance(TurnState::Cancelled) {
            self.state = next;
        }
    }

    async fn terminate(&mut self, next: TurnState, event: PushEvent) -> bool {
        let Some(state) = self.state.advance(next) else {
            tracing::debug!(state = ?self.state, "turn already terminated, dropping event");
            return false;
        };
        self.state = state;
        match tokio::time::timeout(TERMINAL_SEND_GRACE, self.tx.send(event)).await {
            Ok(sent) => sent.is_ok(),
            Err(_) => {
                tracing::debug!(state = ?self.state, "client not reading, terminal event dropped");
                false
            }
        }
    }
}

/// Characters of the reply, unless the provider reported output tokens.
pub fn tokens_used(content: &str, reported_output_tokens: u32) -> u32 {
    if reported_output_tokens > 0 {
        reported_output_tokens
    } else {
        u32::try_from(content.chars().count()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut rx: mpsc::Receiver<PushEvent>) -> Vec<PushEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[test]
    fn advance_rejects_leaving_terminal_states() {
        assert_eq!(
            TurnState::Started.advance(TurnState::Streaming),
            Some(TurnState::Streaming)
        );
        assert_eq!(
            TurnState::Started.advance(TurnState::Failed),
            Some(TurnState::Failed)
        );
        assert_eq!(TurnState::Completed.advance(TurnState::Failed), None);
        assert_eq!(TurnState::Failed.advance(TurnState::Streaming), None);
        assert_eq!(TurnState::Streaming.advance(TurnState::Started), None);
        assert!(TurnState::Cancelled.is_terminal());
    }

    #[tokio::test]
    async fn partials_then_single_completion() {
        let (mut coord, rx) = StreamingCoordinator::channel();
        coord.partial("Hel").await.unwrap();
        coord.partial("").await.unwrap();
        coord.partial("lo").await.unwrap();
        let sid = Uuid::now_v7();
        assert!(coord.complete(Some(sid), None, 5).await);
        assert!(!coord.fail("late error").await);
        assert_eq!(coord.content(), "Hello");
        drop(coord);

        let events = drain(rx).await;
        assert_eq!(
            events,
            vec![
                PushEvent::partial("Hel"),
                PushEvent::partial("lo"),
                PushEvent::Completed {
                    session_id: Some(sid),
                    message_id: None,
                    tokens_used: 5
                },
            ]
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn fail_without_partials() {
        let (mut coord, rx) = StreamingCoordinator::channel();
        assert!(coord.fail("model down").await);
        assert_eq!(coord.state(), TurnState::Failed);
        coord.partial("x").await.unwrap();
        assert_eq!(coord.content(), "");
        drop(coord);
        assert_eq!(drain(rx).await, vec![PushEvent::failed("model down")]);
    }

    #[tokio::test]
    async fn dropped_receiver_cancels() {
        let (mut coord, rx) = StreamingCoordinator::channel();
        let disconnected = coord.disconnected();
        drop(rx);
        disconnected.await;

        let err = coord.partial("tok").await.unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));
        assert_eq!(coord.state(), TurnState::Cancelled);
        assert!(!coord.complete(None, None, 0).await);
    }

    #[tokio::test]
    async fn terminal_event_gives_up_on_stalled_reader() {
        let (mut coord, rx) = StreamingCoordinator::channel();
        for _ in 0..PUSH_CHANNEL_CAPACITY {
            coord.partial("x").await.unwrap();
        }

        let delivered = tokio::time::timeout(Duration::from_secs(2), coord.fail("timed out"))
            .await
            .expect("fail should not wait on a full channel");
        assert!(!delivered);
        assert_eq!(coord.state(), TurnState::Failed);

        drop(coord);
        let events = drain(rx).await;
        assert_eq!(events.len(), PUSH_CHANNEL_CAPACITY);
        assert!(events.iter().all(|e| !e.is_terminal()));
    }

    #[test]
    fn tokens_prefer_provider_count() {
        assert_eq!(tokens_used("héllo", 0), 5);
        assert_eq!(tokens_used("héllo", 2), 2);
    }
}
