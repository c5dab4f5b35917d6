//! Embedded-DB sink bridge.
//!
//! Persists envelopes into a `world_events` table keyed by `event_id`, so
//! redelivery of the same event is an idempotent upsert. With the `sqlite`
//! feature the table lives in a rusqlite database; without it (or when the
//! database cannot be opened) the bridge degrades to an in-process table
//! with the same upsert semantics.
//!
//! This table is a separate persistence surface from the delivery queue:
//! the queue tracks in-flight work, this sink is a terminal record of
//! delivered events.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::LinkError;
use crate::link::{Bridge, Delivery};

/// Where the rows live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreTarget {
    /// In-process table, lost on drop.
    #[default]
    Memory,
    /// Database file at the given path (`sqlite` feature).
    #[cfg(feature = "sqlite")]
    File(std::path::PathBuf),
}

enum Backend {
    #[cfg(feature = "sqlite")]
    Db(rusqlite::Connection),
    Memory(Vec<(String, serde_json::Value)>),
}

/// Writes envelopes into an embedded event table, upserting on `event_id`.
pub struct StoreBridge {
    target: StoreTarget,
    backend: Mutex<Option<Backend>>,
}

impl StoreBridge {
    /// In-process table backend.
    pub fn in_memory() -> Self {
        Self {
            target: StoreTarget::Memory,
            backend: Mutex::new(None),
        }
    }

    /// File-backed database at `path`.
    #[cfg(feature = "sqlite")]
    pub fn at_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            target: StoreTarget::File(path.into()),
            backend: Mutex::new(None),
        }
    }

    /// Number of stored events. Test and introspection helper.
    pub async fn stored_count(&self) -> usize {
        let guard = self.backend.lock().await;
        match guard.as_ref() {
            None => 0,
            Some(Backend::Memory(rows)) => rows.len(),
            #[cfg(feature = "sqlite")]
            Some(Backend::Db(conn)) => conn
                .query_row("SELECT COUNT(*) FROM world_events", [], |row| {
                    row.get::<_, i64>(0)
                })
                .unwrap_or(0) as usize,
        }
    }

    /// Whether an event with this id has been stored.
    pub async fn contains(&self, event_id: &str) -> bool {
        let guard = self.backend.lock().await;
        match guard.as_ref() {
            None => false,
            Some(Backend::Memory(rows)) => rows.iter().any(|(id, _)| id == event_id),
            #[cfg(feature = "sqlite")]
            Some(Backend::Db(conn)) => conn
                .query_row(
                    "SELECT COUNT(*) FROM world_events WHERE event_id = ?1",
                    [event_id],
                    |row| row.get::<_, i64>(0),
                )
                .map(|n| n > 0)
                .unwrap_or(false),
        }
    }

    fn open_backend(&self) -> Backend {
        match &self.target {
            StoreTarget::Memory => Backend::Memory(Vec::new()),
            #[cfg(feature = "sqlite")]
            StoreTarget::File(path) => match Self::open_db(path) {
                Ok(conn) => Backend::Db(conn),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "store open failed; falling back to in-process table");
                    Backend::Memory(Vec::new())
                }
            },
        }
    }

    #[cfg(feature = "sqlite")]
    fn open_db(path: &std::path::Path) -> rusqlite::Result<rusqlite::Connection> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS world_events (
                event_id TEXT PRIMARY KEY,
                topic    TEXT NOT NULL,
                kind     TEXT NOT NULL,
                envelope TEXT NOT NULL
            )",
        )?;
        Ok(conn)
    }
}

impl std::fmt::Debug for StoreBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBridge")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bridge for StoreBridge {
    async fn send(&self, env: &Envelope) -> Result<Delivery, LinkError> {
        let mut guard = self.backend.lock().await;
        let backend = guard.get_or_insert_with(|| self.open_backend());

        match backend {
            Backend::Memory(rows) => {
                let value = serde_json::to_value(env)
                    .map_err(|e| LinkError::permanent(format!("envelope encode failed: {e}")))?;
                match rows.iter_mut().find(|(id, _)| *id == env.event_id) {
                    Some((_, existing)) => *existing = value,
                    None => rows.push((env.event_id.clone(), value)),
                }
            }
            #[cfg(feature = "sqlite")]
            Backend::Db(conn) => {
                let text = serde_json::to_string(env)
                    .map_err(|e| LinkError::permanent(format!("envelope encode failed: {e}")))?;
                conn.execute(
                    "INSERT OR REPLACE INTO world_events (event_id, topic, kind, envelope)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![env.event_id, env.routing.topic, env.kind, text],
                )
                .map_err(|e| LinkError::retryable(format!("store write failed: {e}")))?;
            }
        }

        debug!(event_id = %env.event_id, topic = %env.routing.topic, "event stored");
        Ok(Delivery::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::IngestInput;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_upsert_is_idempotent() {
        let bridge = StoreBridge::in_memory();
        let env = IngestInput::new("w1", "k", json!({"n": 1})).normalize();

        bridge.send(&env).await.unwrap();
        bridge.send(&env).await.unwrap();

        assert_eq!(bridge.stored_count().await, 1);
        assert!(bridge.contains(&env.event_id).await);
        assert!(!bridge.contains("other").await);
    }

    #[tokio::test]
    async fn test_distinct_events_accumulate() {
        let bridge = StoreBridge::in_memory();
        let a = IngestInput::new("w1", "k", json!({})).normalize();
        let b = IngestInput::new("w1", "k", json!({})).normalize();

        bridge.send(&a).await.unwrap();
        bridge.send(&b).await.unwrap();

        assert_eq!(bridge.stored_count().await, 2);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_upsert_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("relay-store-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let bridge = StoreBridge::at_path(dir.join("events.db"));
        let env = IngestInput::new("w1", "k", json!({"n": 1})).normalize();

        bridge.send(&env).await.unwrap();
        bridge.send(&env).await.unwrap();

        assert_eq!(bridge.stored_count().await, 1);
        assert!(bridge.contains(&env.event_id).await);
    }
}
