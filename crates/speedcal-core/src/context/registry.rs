//! Turn context and the session-to-caller registry.
//!
//! `TurnContext` carries the authenticated caller through a turn explicitly.
//! The `ContextRegistry` additionally binds the turn's session key to the
//! caller for the lifetime of the turn, so tool execution can resolve who
//! it acts for from the session key alone. A [`ContextBinding`] guard removes
//! the binding when dropped, on every exit path of the turn.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use speedcal_types::chat::SessionKey;
use speedcal_types::tool::ToolSet;

/// Everything a turn needs to know about its caller and scope.
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Correlates log lines of one turn.
    pub turn_id: Uuid,
    pub caller_id: String,
    pub session_key: SessionKey,
    pub tool_set: ToolSet,
    /// Cancelled when the client disconnects or the turn is abandoned.
    pub cancellation: CancellationToken,
}

impl TurnContext {
    pub fn new(caller_id: impl Into<String>, session_key: SessionKey, tool_set: ToolSet) -> Self {
        Self {
            turn_id: Uuid::now_v7(),
            caller_id: caller_id.into(),
            session_key,
            tool_set,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

/// Concurrent map from session key to the caller currently driving it.
///
/// Cloning produces a shared view of the same map.
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    inner: Arc<DashMap<SessionKey, String>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the context's session key to its caller until the returned
    /// guard is dropped.
    #[must_use = "the binding is released as soon as the guard is dropped"]
    pub fn enter(&self, ctx: &TurnContext) -> ContextBinding {
        self.inner
            .insert(ctx.session_key.clone(), ctx.caller_id.clone());
        ContextBinding {
            registry: self.clone(),
            key: ctx.session_key.clone(),
        }
    }

    /// The caller bound to `key`, cloned out of the map.
    pub fn resolve(&self, key: &SessionKey) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    pub fn unbind(&self, key: &SessionKey) {
        self.inner.remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// RAII guard for a registry binding.
#[derive(Debug)]
pub struct ContextBinding {
    registry: ContextRegistry,
    key: SessionKey,
}

impl Drop for ContextBinding {
    fn drop(&mut self) {
        self.registry.unbind(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(caller: &str, key: SessionKey) -> TurnContext {
        TurnContext::new(caller, key, ToolSet::Calendar)
    }

    #[test]
    fn enter_binds_and_drop_releases() {
        let registry = ContextRegistry::new();
        let key = SessionKey::from(Uuid::now_v7());
        let turn = ctx("alice", key.clone());

        {
            let _binding = registry.enter(&turn);
            assert_eq!(registry.resolve(&key).as_deref(), Some("alice"));
        }

        assert_eq!(registry.resolve(&key), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn binding_released_on_panic_unwind() {
        let registry = ContextRegistry::new();
        let key = SessionKey::quick_schedule("bob");
        let turn = ctx("bob", key.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _binding = registry.enter(&turn);
            panic!("tool blew up");
        }));

        assert!(result.is_err());
        assert_eq!(registry.resolve(&key), None);
    }

    #[test]
    fn distinct_sessions_do_not_interfere() {
        let registry = ContextRegistry::new();
        let a = SessionKey::from(Uuid::now_v7());
        let b = SessionKey::from(Uuid::now_v7());

        let guard_a = registry.enter(&ctx("alice", a.clone()));
        let _guard_b = registry.enter(&ctx("bob", b.clone()));
        drop(guard_a);

        assert_eq!(registry.resolve(&a), None);
        assert_eq!(registry.resolve(&b).as_deref(), Some("bob"));
    }

    #[test]
    fn cancel_is_shared_with_clones() {
        let turn = ctx("alice", SessionKey::from(Uuid::now_v7()));
        let token = turn.cancellation.clone();
        assert!(!turn.is_cancelled());
        turn.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn concurrent_bindings_resolve_to_their_own_caller() {
        let registry = ContextRegistry::new();
        let mut handles = Vec::new();

        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let caller = format!("user-{i}");
                let turn = TurnContext::new(
                    caller.clone(),
                    SessionKey::from(Uuid::now_v7()),
                    ToolSet::Calendar,
                );
                let _binding = registry.enter(&turn);
                tokio::task::yield_now().await;
                registry.resolve(&turn.session_key) == Some(caller)
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert!(registry.is_empty());
    }
}
