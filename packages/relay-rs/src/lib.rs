//! Event ingestion and reliable delivery for world simulations.
//!
//! `relay` takes raw events from producers, normalizes them into versioned
//! [`Envelope`]s, suppresses duplicates, routes them onto a topic [`Bus`],
//! and fans them out to pluggable transports ([`Bridge`]s) through a
//! retrying outbox. Losses are never silent: failed handlers and exhausted
//! deliveries become dead-letter envelopes on [`DLQ_TOPIC`].
//!
//! ```text
//!                        ┌──────────┐
//!  IngestInput ───────►  │ Ingestor │
//!                        └────┬─────┘
//!        normalize + dedupe   │
//!                        ┌────▼─────┐     ┌───────────┐
//!                        │  Router  ├────►│    Bus    │──► handlers
//!                        └────┬─────┘     └───────────┘
//!                   links     │
//!                        ┌────▼─────┐     ┌───────────┐
//!                        │  Outbox  ├────►│  Bridges  │──► console / ws / store
//!                        └──────────┘     └───────────┘
//!                          retries + backoff; dead-letters on ops.dlq
//! ```
//!
//! # Example
//!
//! ```ignore
//! use relay::{Decision, Ingestor, IngestInput};
//! use relay::bridges::ConsoleBridge;
//! use serde_json::json;
//!
//! let ingestor = Ingestor::builder()
//!     .with_rule(|env| {
//!         env.kind
//!             .starts_with("player.")
//!             .then(|| Decision::with_links("sim.player", ["console"]))
//!     })
//!     .with_link("console", ConsoleBridge::new())
//!     .build();
//!
//! ingestor.ingest(IngestInput::new("world-42", "player.moved", json!({"x": 1})))
//!     .await?;
//! ```

mod bus;
mod dedupe;
mod envelope;
mod error;
mod ingest;
mod link;
mod outbox;
mod router;

pub mod bridges;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bus::{Bus, HandlerFailure};
pub use dedupe::{DedupeStore, InMemoryDedupeStore, IngestState};
pub use envelope::{
    shard_of, Actor, Envelope, IngestInput, Priority, Routing, Source, Trace, SCHEMA,
    SCHEMA_VERSION,
};
pub use error::{LinkError, RelayError};
pub use ingest::{Ingestor, IngestorBuilder, IngestorConfig, DLQ_KIND, DLQ_TOPIC};
pub use link::{Bridge, Delivery, LinkRegistry};
pub use outbox::{DeliveryQueue, InMemoryOutbox, OutboxItem, OutboxPatch};
pub use router::{Decision, Router, RouterRule};

// Re-exported so bridge implementors don't need a separate dependency for
// the trait's attribute macro.
pub use async_trait::async_trait;
