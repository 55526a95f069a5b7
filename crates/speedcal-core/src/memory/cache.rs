//! Per-session message cache.
//!
//! `MemoryCache` is a concurrent map from session key to an immutable
//! snapshot of that session's messages. Snapshots are `Arc`-shared and
//! replaced wholesale, so readers never hold a `DashMap` guard across an
//! `.await`. The store stays the source of truth: a cold cache hydrates
//! from it, and turns are recorded here only after they were persisted.

use std::sync::Arc;

use dashmap::DashMap;

use speedcal_types::chat::{ChatMessage, SessionKey};
use speedcal_types::error::RepositoryError;

use crate::chat::repository::ChatRepository;

#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<SessionKey, Arc<Vec<ChatMessage>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of `key`, loading them from `store` on a miss.
    ///
    /// Stateless keys have no stored history and start empty. Access to the
    /// session must already have been checked by the caller.
    pub async fn load<C: ChatRepository>(
        &self,
        key: &SessionKey,
        store: &C,
    ) -> Result<Arc<Vec<ChatMessage>>, RepositoryError> {
        if let Some(hit) = self.inner.get(key).map(|r| Arc::clone(r.value())) {
            return Ok(hit);
        }

        let loaded = match key.session_id() {
            Some(id) => store.list_messages_unscoped(&id).await?,
            None => Vec::new(),
        };
        tracing::debug!(session = %key, messages = loaded.len(), "hydrated memory");

        // A concurrent hydration may have won the race; keep whichever landed first.
        let entry = self
            .inner
            .entry(key.clone())
            .or_insert_with(|| Arc::new(loaded));
        Ok(Arc::clone(entry.value()))
    }

    /// Append a persisted turn to a cached session.
    ///
    /// A session that is not cached is left alone; its next `load` reads the
    /// turn back from the store.
    pub fn record_turn(&self, key: &SessionKey, user: ChatMessage, assistant: ChatMessage) {
        self.inner.entry(key.clone()).and_modify(|messages| {
            let mut next = Vec::with_capacity(messages.len() + 2);
            next.extend(messages.iter().cloned());
            next.push(user);
            next.push(assistant);
            *messages = Arc::new(next);
        });
    }

    pub fn invalidate(&self, key: &SessionKey) {
        self.inner.remove(key);
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The trailing `size` messages of a history.
pub fn window(messages: &[ChatMessage], size: usize) -> &[ChatMessage] {
    let start = messages.len().saturating_sub(size);
    &messages[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryChatRepository;
    use speedcal_types::chat::Role;

    #[tokio::test]
    async fn load_hydrates_once_from_store() {
        let store = InMemoryChatRepository::new();
        let session = store.create_session("alice", None).await.unwrap();
        store
            .append_turn(&session.id, "alice", "hi", "hello", 3)
            .await
            .unwrap();
        let cache = MemoryCache::new();
        let key = SessionKey::from(session.id);

        let first = cache.load(&key, &store).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].role, Role::User);

        // Writes that bypass the cache are not visible until invalidation.
        store
            .append_message(&session.id, "alice", Role::User, "direct", None)
            .await
            .unwrap();
        assert_eq!(cache.load(&key, &store).await.unwrap().len(), 2);

        cache.invalidate(&key);
        assert_eq!(cache.load(&key, &store).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn record_turn_appends_to_cached_session() {
        let store = InMemoryChatRepository::new();
        let session = store.create_session("alice", None).await.unwrap();
        let key = SessionKey::from(session.id);
        let cache = MemoryCache::new();
        let before = cache.load(&key, &store).await.unwrap();

        let (user, assistant) = store
            .append_turn(&session.id, "alice", "q", "a", 1)
            .await
            .unwrap();
        cache.record_turn(&key, user, assistant);

        let after = cache.load(&key, &store).await.unwrap();
        assert!(before.is_empty());
        assert_eq!(after.len(), 2);
        assert_eq!(after[1].content, "a");
    }

    #[tokio::test]
    async fn record_turn_skips_uncached_session() {
        let store = InMemoryChatRepository::new();
        let session = store.create_session("alice", None).await.unwrap();
        let key = SessionKey::from(session.id);
        let cache = MemoryCache::new();

        let (user, assistant) = store
            .append_turn(&session.id, "alice", "q", "a", 1)
            .await
            .unwrap();
        cache.record_turn(&key, user, assistant);

        assert!(!cache.contains(&key));
        assert_eq!(cache.load(&key, &store).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stateless_key_starts_empty() {
        let store = InMemoryChatRepository::new();
        let cache = MemoryCache::new();
        let key = SessionKey::quick_schedule("alice");
        assert!(cache.load(&key, &store).await.unwrap().is_empty());
        cache.invalidate(&key);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_snapshot() {
        let store = Arc::new(InMemoryChatRepository::new());
        let session = store.create_session("alice", None).await.unwrap();
        store
            .append_turn(&session.id, "alice", "hi", "hello", 3)
            .await
            .unwrap();
        let cache = MemoryCache::new();
        let key = SessionKey::from(session.id);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache.load(&key, store.as_ref()).await.unwrap().len()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 2);
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn window_keeps_trailing_messages() {
        let msg = |n: u32| ChatMessage {
            id: uuid::Uuid::now_v7(),
            session_id: uuid::Uuid::nil(),
            owner_id: "alice".to_string(),
            role: Role::User,
            content: n.to_string(),
            sequence_num: n,
            tokens_used: None,
            created_at: chrono::Utc::now(),
        };
        let messages: Vec<ChatMessage> = (0..25).map(msg).collect();
        let tail = window(&messages, 20);
        assert_eq!(tail.len(), 20);
        assert_eq!(tail[0].sequence_num, 5);
        assert_eq!(window(&messages[..3], 20).len(), 3);
    }
}
