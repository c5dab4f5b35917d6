//! Queue of pending deliveries with retry bookkeeping.
//!
//! The outbox holds one item per (event, link) pair until a bridge confirms
//! delivery or the item is dead-lettered. Items carry attempt counts, the
//! last error, and a per-item eligibility time so retries back off
//! exponentially instead of spinning between flush passes.
//!
//! # Guarantees
//!
//! - **At-least-once**: items survive failed dispatch attempts until they
//!   succeed or exhaust their retry budget.
//! - **Oldest first**: [`DeliveryQueue::pending`] returns items in insertion
//!   order; no other ordering is guaranteed.
//! - An item is either pending (`terminal == false`) or has been removed.
//!   `terminal == true` is a transient marker set immediately before removal
//!   to block re-queuing races within the same flush pass.
//!
//! The reference implementation is in-memory; a durable queue plugs in at
//! the [`DeliveryQueue`] trait without touching the ingest pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::envelope::Envelope;

/// One pending delivery: an envelope bound for a named link.
#[derive(Debug, Clone)]
pub struct OutboxItem {
    pub outbox_id: Uuid,
    pub event_id: String,
    /// Registered name of the bridge this item dispatches through.
    pub link: String,
    pub env: Envelope,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Earliest time this item is eligible for dispatch again.
    pub next_attempt_at: DateTime<Utc>,
    pub terminal: bool,
}

/// Partial update merged into an [`OutboxItem`]; `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct OutboxPatch {
    pub attempts: Option<u32>,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub terminal: Option<bool>,
}

impl OutboxPatch {
    /// Bookkeeping for a failed dispatch attempt.
    pub fn failure(attempts: u32, error: impl Into<String>, next_attempt_at: DateTime<Utc>) -> Self {
        Self {
            attempts: Some(attempts),
            last_error: Some(error.into()),
            next_attempt_at: Some(next_attempt_at),
            terminal: None,
        }
    }

    /// Marker applied immediately before removal.
    pub fn terminal(attempts: u32, error: impl Into<String>) -> Self {
        Self {
            attempts: Some(attempts),
            last_error: Some(error.into()),
            next_attempt_at: None,
            terminal: Some(true),
        }
    }
}

/// Store of pending deliveries.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Append a pending item; returns its `outbox_id`.
    async fn add(&self, event_id: &str, link: &str, env: Envelope) -> Uuid;

    /// Non-terminal items whose `next_attempt_at` has passed, oldest first,
    /// optionally capped at `limit`.
    async fn pending(&self, limit: Option<usize>) -> Vec<OutboxItem>;

    /// Merge `patch` into the item, if it still exists.
    async fn update(&self, outbox_id: Uuid, patch: OutboxPatch);

    /// Delete the item, if it still exists.
    async fn remove(&self, outbox_id: Uuid);

    /// Total items held, including not-yet-eligible ones.
    async fn depth(&self) -> usize;
}

/// In-memory [`DeliveryQueue`] preserving insertion order.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    items: Mutex<Vec<OutboxItem>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryOutbox {
    async fn add(&self, event_id: &str, link: &str, env: Envelope) -> Uuid {
        let outbox_id = Uuid::new_v4();
        let now = Utc::now();
        self.items.lock().await.push(OutboxItem {
            outbox_id,
            event_id: event_id.to_string(),
            link: link.to_string(),
            env,
            attempts: 0,
            last_error: None,
            created_at: now,
            next_attempt_at: now,
            terminal: false,
        });
        outbox_id
    }

    async fn pending(&self, limit: Option<usize>) -> Vec<OutboxItem> {
        let now = Utc::now();
        let items = self.items.lock().await;
        let eligible = items
            .iter()
            .filter(|item| !item.terminal && item.next_attempt_at <= now)
            .cloned();
        match limit {
            Some(n) => eligible.take(n).collect(),
            None => eligible.collect(),
        }
    }

    async fn update(&self, outbox_id: Uuid, patch: OutboxPatch) {
        let mut items = self.items.lock().await;
        if let Some(item) = items.iter_mut().find(|item| item.outbox_id == outbox_id) {
            if let Some(attempts) = patch.attempts {
                item.attempts = attempts;
            }
            if let Some(error) = patch.last_error {
                item.last_error = Some(error);
            }
            if let Some(at) = patch.next_attempt_at {
                item.next_attempt_at = at;
            }
            if let Some(terminal) = patch.terminal {
                item.terminal = terminal;
            }
        }
    }

    async fn remove(&self, outbox_id: Uuid) {
        self.items
            .lock()
            .await
            .retain(|item| item.outbox_id != outbox_id);
    }

    async fn depth(&self) -> usize {
        self.items.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::IngestInput;
    use chrono::Duration;
    use serde_json::json;

    fn env(id: &str) -> Envelope {
        IngestInput::new("w1", "k", json!({}))
            .with_event_id(id)
            .normalize()
    }

    #[tokio::test]
    async fn test_add_and_pending_oldest_first() {
        let outbox = InMemoryOutbox::new();
        outbox.add("e1", "console", env("e1")).await;
        outbox.add("e2", "console", env("e2")).await;
        outbox.add("e3", "ws", env("e3")).await;

        let pending = outbox.pending(None).await;
        let ids: Vec<_> = pending.iter().map(|i| i.event_id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
        assert_eq!(outbox.depth().await, 3);
    }

    #[tokio::test]
    async fn test_pending_respects_limit() {
        let outbox = InMemoryOutbox::new();
        for i in 0..5 {
            let id = format!("e{i}");
            outbox.add(&id, "console", env(&id)).await;
        }
        let pending = outbox.pending(Some(2)).await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event_id, "e0");
        assert_eq!(pending[1].event_id, "e1");
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let outbox = InMemoryOutbox::new();
        let id = outbox.add("e1", "console", env("e1")).await;

        let next = Utc::now() + Duration::seconds(30);
        outbox
            .update(id, OutboxPatch::failure(1, "timeout", next))
            .await;

        // Not eligible until next_attempt_at passes, but still held.
        assert!(outbox.pending(None).await.is_empty());
        assert_eq!(outbox.depth().await, 1);
    }

    #[tokio::test]
    async fn test_backoff_eligibility() {
        let outbox = InMemoryOutbox::new();
        let id = outbox.add("e1", "console", env("e1")).await;

        let past = Utc::now() - Duration::seconds(1);
        outbox
            .update(id, OutboxPatch::failure(2, "timeout", past))
            .await;

        let pending = outbox.pending(None).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[0].last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_terminal_items_are_not_pending() {
        let outbox = InMemoryOutbox::new();
        let id = outbox.add("e1", "console", env("e1")).await;
        outbox.update(id, OutboxPatch::terminal(3, "gone")).await;

        assert!(outbox.pending(None).await.is_empty());
        assert_eq!(outbox.depth().await, 1);

        outbox.remove(id).await;
        assert_eq!(outbox.depth().await, 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_noop() {
        let outbox = InMemoryOutbox::new();
        outbox.add("e1", "console", env("e1")).await;
        outbox.remove(Uuid::new_v4()).await;
        assert_eq!(outbox.depth().await, 1);
    }
}
