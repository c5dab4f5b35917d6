//! The versioned, self-describing unit of data flowing through the system.
//!
//! An [`Envelope`] is immutable once created: the only field written after
//! normalization is `routing.topic`, set exactly once by the router before
//! publish. Everything else — identity, trace linkage, shard — is fixed at
//! creation time.
//!
//! # Wire Schema
//!
//! Envelopes serialize with `schema: "world.envelope@v1"` and `version: 1`
//! so consumers can reject unknown shapes. Producers outside the core must
//! supply at minimum `world_id`, `kind`, and `payload`; everything else is
//! defaulted by [`IngestInput::normalize`].
//!
//! # Example
//!
//! ```ignore
//! use relay::IngestInput;
//! use serde_json::json;
//!
//! let env = IngestInput::new("world-42", "player.moved", json!({"x": 1, "y": 2}))
//!     .with_topic("sim.player.moved")
//!     .normalize();
//!
//! assert_eq!(env.schema, "world.envelope@v1");
//! assert_eq!(env.shard, relay::shard_of("world-42"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed schema tag carried by every envelope.
pub const SCHEMA: &str = "world.envelope@v1";

/// Schema version carried alongside the tag.
pub const SCHEMA_VERSION: u32 = 1;

/// Number of local shards `world_id`s are partitioned into.
const SHARD_COUNT: u32 = 8;

/// Derive the deterministic shard label for a world.
///
/// Pure function of the string: the sum of UTF-16 code units modulo the
/// shard count, prefixed with `"local/"`. Stable across processes, so
/// producers and consumers agree on partitioning without coordination.
pub fn shard_of(world_id: &str) -> String {
    let sum = world_id
        .encode_utf16()
        .fold(0u32, |acc, unit| acc.wrapping_add(u32::from(unit)));
    format!("local/{}", sum % SHARD_COUNT)
}

/// Delivery priority hint carried in [`Routing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    User,
    Agent,
    System,
}

/// Origin metadata for an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Producing subsystem (e.g. `"ui"`, `"physics"`, `"relay"`).
    pub system: String,
    pub actor: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Source {
    pub fn new(system: impl Into<String>, actor: Actor) -> Self {
        Self {
            system: system.into(),
            actor,
            session_id: None,
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::new("unknown", Actor::System)
    }
}

/// Causal chain metadata for observability.
///
/// A fresh `span_id` is minted per envelope; `trace_id` is inherited from
/// the caller or minted at the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
}

/// Routing state, written once by the router during ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    pub topic: String,
    pub priority: Priority,
}

/// The unit of data flowing through the pipeline.
///
/// See the module docs for lifecycle and mutability rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub schema: String,
    pub version: u32,
    /// Globally unique identifier; the idempotency key.
    pub event_id: String,
    pub ts: DateTime<Utc>,
    /// Logical tenant/namespace.
    pub world_id: String,
    /// Deterministic partition label derived from `world_id`.
    pub shard: String,
    /// Event type name; the default topic when routing doesn't override it.
    pub kind: String,
    pub source: Source,
    pub trace: Trace,
    /// Ordered free-form strings. Append-only: the router and DLQ extend
    /// this list, nothing removes from it.
    pub tags: Vec<String>,
    pub routing: Routing,
    /// Opaque domain data.
    pub payload: serde_json::Value,
}

/// Caller-supplied fields for one [`crate::Ingestor::ingest`] call.
///
/// Only `world_id`, `kind`, and `payload` are required; the rest defaults
/// during normalization. Builder-style setters follow the crate convention:
///
/// ```ignore
/// let input = IngestInput::new("world-1", "door.opened", json!({"door": 3}))
///     .with_priority(Priority::High)
///     .with_trace_id(parent_trace)
///     .with_tag("sim");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestInput {
    pub world_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Supplied on retries to reuse the idempotency key.
    #[serde(default)]
    pub event_id: Option<String>,
}

impl IngestInput {
    pub fn new(
        world_id: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            world_id: world_id.into(),
            kind: kind.into(),
            payload,
            topic: None,
            tags: Vec::new(),
            source: None,
            priority: None,
            trace_id: None,
            parent_span_id: None,
            session_id: None,
            event_id: None,
        }
    }

    /// Override the default topic (`kind`) used when no router rule matches.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Inherit an existing trace instead of minting a new root.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_parent_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(span_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Reuse a caller-supplied idempotency key (retries of the same event).
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Fill every field the caller didn't supply, producing an [`Envelope`].
    ///
    /// Mints `event_id`, `trace_id`, and `span_id` where absent, stamps the
    /// creation timestamp, computes the shard, and defaults the topic to
    /// `kind` with normal priority. No side effects beyond the random/time
    /// sources.
    pub fn normalize(self) -> Envelope {
        let mut source = self.source.unwrap_or_default();
        if source.session_id.is_none() {
            source.session_id = self.session_id;
        }

        let shard = shard_of(&self.world_id);
        let topic = self.topic.unwrap_or_else(|| self.kind.clone());

        Envelope {
            schema: SCHEMA.to_string(),
            version: SCHEMA_VERSION,
            event_id: self
                .event_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ts: Utc::now(),
            world_id: self.world_id,
            shard,
            kind: self.kind,
            source,
            trace: Trace {
                trace_id: self
                    .trace_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                span_id: Uuid::new_v4().to_string(),
                parent_span_id: self.parent_span_id,
            },
            tags: self.tags,
            routing: Routing {
                topic,
                priority: self.priority.unwrap_or_default(),
            },
            payload: self.payload,
        }
    }
}
