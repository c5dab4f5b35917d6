//! Duplicate suppression keyed by `event_id`.
//!
//! The store tracks per-event processing state so re-ingesting an event that
//! is in flight or already processed collapses to a silent no-op. The trait
//! boundary exists so a durable backend (KV store, Redis) can be swapped in
//! without touching the ingest pipeline.
//!
//! The reference implementation is in-memory with no TTL or eviction — a
//! known gap if adopted unmodified at scale; a TTL-aware store plugs in at
//! this trait.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Processing state for one `event_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Claimed by an in-flight ingest pass.
    Processing,
    /// Pipeline committed; future ingests of this id are no-ops.
    Processed,
}

/// Per-event dedupe state store.
#[async_trait]
pub trait DedupeStore: Send + Sync {
    /// Current state, or `None` if the id has never been seen.
    async fn get(&self, event_id: &str) -> Option<IngestState>;

    /// Atomically claim an unseen id as [`IngestState::Processing`].
    ///
    /// Returns `false` when the id is already processing or processed —
    /// the caller must treat that as a duplicate and do nothing.
    async fn try_begin(&self, event_id: &str) -> bool;

    /// Commit the id as [`IngestState::Processed`].
    async fn mark_processed(&self, event_id: &str);

    /// Forget the id entirely.
    ///
    /// Called only when the pipeline fails mid-flight, so the same
    /// `event_id` can be safely re-ingested.
    async fn clear(&self, event_id: &str);
}

/// In-memory [`DedupeStore`] on a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryDedupeStore {
    states: DashMap<String, IngestState>,
}

impl InMemoryDedupeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked ids (both states).
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

#[async_trait]
impl DedupeStore for InMemoryDedupeStore {
    async fn get(&self, event_id: &str) -> Option<IngestState> {
        self.states.get(event_id).map(|entry| *entry.value())
    }

    async fn try_begin(&self, event_id: &str) -> bool {
        match self.states.entry(event_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(IngestState::Processing);
                true
            }
        }
    }

    async fn mark_processed(&self, event_id: &str) {
        self.states
            .insert(event_id.to_string(), IngestState::Processed);
    }

    async fn clear(&self, event_id: &str) {
        self.states.remove(event_id);
    }
}
