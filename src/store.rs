// src/store.rs
//! Guarded in-memory collection of merged messages.
//!
//! Readers clone an `Arc` under the shared lock; the refresh cycle computes the
//! next sequence outside the lock and holds the write lock only to swap it in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::message::Message;

/// Scalar settings persisted alongside the messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub initial_target_count: usize,
    pub page_size: usize,
}

#[derive(Debug)]
pub struct CollectorState {
    msgs: RwLock<Arc<Vec<Message>>>,
    settings: StoreSettings,
    revision: AtomicU64,
}

impl CollectorState {
    pub fn new(settings: StoreSettings) -> Self {
        Self::with_messages(settings, Vec::new())
    }

    /// `msgs` must already be newest first with unique ids.
    pub fn with_messages(settings: StoreSettings, msgs: Vec<Message>) -> Self {
        Self {
            msgs: RwLock::new(Arc::new(msgs)),
            settings,
            revision: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    /// Current sequence, newest first.
    pub fn snapshot(&self) -> Arc<Vec<Message>> {
        let guard = self.msgs.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install `next` as the current sequence.
    pub fn replace(&self, next: impl Into<Arc<Vec<Message>>>) {
        let next = next.into();
        let mut guard = self.msgs.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `replace` calls since construction.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StoreSettings {
        StoreSettings {
            initial_target_count: 100,
            page_size: 10,
        }
    }

    #[test]
    fn snapshot_survives_replace() {
        let st = CollectorState::with_messages(settings(), vec![Message::new(1, "t", "a")]);
        let old = st.snapshot();
        st.replace(vec![Message::new(2, "t", "b"), Message::new(1, "t", "a")]);

        assert_eq!(old.len(), 1);
        assert_eq!(st.len(), 2);
        assert_eq!(st.revision(), 1);
    }

    #[test]
    fn starts_empty() {
        let st = CollectorState::new(settings());
        assert!(st.is_empty());
        assert_eq!(st.revision(), 0);
        assert_eq!(st.settings().page_size, 10);
    }
}
