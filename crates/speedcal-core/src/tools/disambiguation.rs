//! Candidate lists awaiting a "delete number N" follow-up.
//!
//! When a keyword delete matches several schedules, the numbered list shown
//! to the user is remembered here, keyed by session and trimmed keyword,
//! so the follow-up index refers to exactly what the user saw. Entries are
//! replaced wholesale and cloned out on read.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use speedcal_types::chat::SessionKey;

/// One numbered entry of a disambiguation list.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub schedule_id: Uuid,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct DisambiguationStore {
    inner: Arc<DashMap<(SessionKey, String), Arc<Vec<Candidate>>>>,
}

impl DisambiguationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session: &SessionKey, keyword: &str, candidates: Vec<Candidate>) {
        self.inner
            .insert((session.clone(), normalize(keyword)), Arc::new(candidates));
    }

    pub fn get(&self, session: &SessionKey, keyword: &str) -> Option<Arc<Vec<Candidate>>> {
        self.inner
            .get(&(session.clone(), normalize(keyword)))
            .map(|r| Arc::clone(r.value()))
    }

    pub fn clear(&self, session: &SessionKey, keyword: &str) {
        self.inner.remove(&(session.clone(), normalize(keyword)));
    }

    /// Drop every pending list of a session.
    pub fn clear_session(&self, session: &SessionKey) {
        self.inner.retain(|(key, _), _| key != session);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn normalize(keyword: &str) -> String {
    keyword.trim().to_string()
}
