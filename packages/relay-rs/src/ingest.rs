//! The ingest pipeline: normalize, dedupe, route, publish, deliver.
//!
//! [`Ingestor`] wires the other components into one entry point. A single
//! [`Ingestor::ingest`] call walks the full pipeline:
//!
//! ```text
//! IngestInput
//!     │ normalize
//!     ▼
//! dedupe.try_begin ──── duplicate ──► Ok(()) (no-op)
//!     │ claimed
//!     ▼
//! router.decide ──► bus.publish ──► handler failures dead-letter
//!     │
//!     ▼
//! per link: outbox.add ──► flush() ──► bridge.send
//!     │                                   │ retryable: backoff + retry
//!     ▼                                   │ permanent/exhausted: dead-letter
//! dedupe.mark_processed                   ▼
//! ```
//!
//! Failed handlers and failed deliveries become synthetic envelopes on the
//! [`DLQ_TOPIC`] so operators can subscribe to `"ops.*"` and observe every
//! loss. Dead-letter envelopes inherit the failing envelope's `trace_id`
//! (their parent span is the failing envelope's span) but carry a fresh
//! `event_id`; they are published once and never retried.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::{Bus, HandlerFailure};
use crate::dedupe::{DedupeStore, InMemoryDedupeStore};
use crate::envelope::{
    Actor, Envelope, IngestInput, Priority, Routing, Source, Trace, SCHEMA, SCHEMA_VERSION,
};
use crate::link::LinkRegistry;
use crate::outbox::{DeliveryQueue, InMemoryOutbox, OutboxPatch};
use crate::router::{Decision, Router};

/// Topic dead-letter envelopes are published on.
pub const DLQ_TOPIC: &str = "ops.dlq";

/// Kind carried by dead-letter envelopes.
pub const DLQ_KIND: &str = "ops.dlq";

/// Tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// When `false`, deliveries bypass the outbox and dispatch inline with
    /// no retries; any failure dead-letters immediately.
    pub outbox_enabled: bool,
    /// Dispatch attempts per outbox item before it dead-letters.
    pub max_attempts: u32,
    /// Items drained from the outbox at the end of each ingest pass.
    pub flush_per_ingest: usize,
    /// First retry delay; doubles per attempt.
    pub backoff_base: std::time::Duration,
    /// Ceiling on the retry delay.
    pub backoff_cap: std::time::Duration,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            outbox_enabled: true,
            max_attempts: 5,
            flush_per_ingest: 25,
            backoff_base: std::time::Duration::from_millis(50),
            backoff_cap: std::time::Duration::from_secs(10),
        }
    }
}

/// The assembled pipeline. Build one with [`Ingestor::builder`].
pub struct Ingestor {
    bus: Arc<Bus>,
    router: Router,
    links: LinkRegistry,
    dedupe: Arc<dyn DedupeStore>,
    outbox: Arc<dyn DeliveryQueue>,
    config: IngestorConfig,
}

/// Builder for [`Ingestor`]. Every component has an in-memory default.
#[derive(Default)]
pub struct IngestorBuilder {
    bus: Option<Arc<Bus>>,
    router: Router,
    links: LinkRegistry,
    dedupe: Option<Arc<dyn DedupeStore>>,
    outbox: Option<Arc<dyn DeliveryQueue>>,
    config: IngestorConfig,
}

impl IngestorBuilder {
    /// Use an externally owned bus (so callers can register handlers on it).
    pub fn with_bus(mut self, bus: Arc<Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Append a routing rule. Convenience over [`Self::with_router`].
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Envelope) -> Option<Decision> + Send + Sync + 'static,
    {
        self.router = self.router.rule(rule);
        self
    }

    pub fn with_link(mut self, name: impl Into<String>, bridge: impl crate::link::Bridge) -> Self {
        self.links = self.links.with_link(name, bridge);
        self
    }

    pub fn with_shared_link(
        mut self,
        name: impl Into<String>,
        bridge: Arc<dyn crate::link::Bridge>,
    ) -> Self {
        self.links = self.links.with_shared_link(name, bridge);
        self
    }

    pub fn with_dedupe_store(mut self, store: Arc<dyn DedupeStore>) -> Self {
        self.dedupe = Some(store);
        self
    }

    pub fn with_delivery_queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.outbox = Some(queue);
        self
    }

    pub fn with_config(mut self, config: IngestorConfig) -> Self {
        self.config = config;
        self
    }

    /// Dispatch inline instead of through the outbox; failures dead-letter
    /// immediately with no retries.
    pub fn bypass_outbox(mut self) -> Self {
        self.config.outbox_enabled = false;
        self
    }

    pub fn build(self) -> Ingestor {
        Ingestor {
            bus: self.bus.unwrap_or_else(|| Arc::new(Bus::new())),
            router: self.router,
            links: self.links,
            dedupe: self
                .dedupe
                .unwrap_or_else(|| Arc::new(InMemoryDedupeStore::new())),
            outbox: self
                .outbox
                .unwrap_or_else(|| Arc::new(InMemoryOutbox::new())),
            config: self.config,
        }
    }
}

impl Ingestor {
    pub fn builder() -> IngestorBuilder {
        IngestorBuilder::default()
    }

    /// The bus handlers are registered on.
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Pending deliveries held by the outbox.
    pub async fn outbox_depth(&self) -> usize {
        self.outbox.depth().await
    }

    /// Run one event through the full pipeline.
    ///
    /// Duplicates (same `event_id` as an in-flight or processed event) are a
    /// silent no-op. On a pipeline error the dedupe claim is released so the
    /// caller can retry with the same `event_id`.
    pub async fn ingest(&self, input: IngestInput) -> Result<()> {
        let env = input.normalize();
        let event_id = env.event_id.clone();

        if !self.dedupe.try_begin(&event_id).await {
            debug!(event_id = %event_id, "duplicate suppressed");
            return Ok(());
        }

        match self.run_pipeline(env).await {
            Ok(()) => {
                self.dedupe.mark_processed(&event_id).await;
                Ok(())
            }
            Err(e) => {
                self.dedupe.clear(&event_id).await;
                error!(event_id = %event_id, error = %e, "ingest failed; dedupe claim released");
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, mut env: Envelope) -> Result<()> {
        let decision = self.router.decide(&env);
        env.routing.topic = decision.topic.clone();
        info!(
            event_id = %env.event_id,
            topic = %env.routing.topic,
            links = ?decision.links,
            "event routed"
        );

        let failures = self.bus.publish(&env.routing.topic, env.clone()).await;
        if !failures.is_empty() {
            self.dead_letter_handlers(&env, &failures).await;
        }

        for link in &decision.links {
            if self.config.outbox_enabled {
                self.outbox.add(&env.event_id, link, env.clone()).await;
            } else {
                self.dispatch_direct(link, &env).await?;
            }
        }

        if self.config.outbox_enabled {
            self.flush(self.config.flush_per_ingest).await?;
        }
        Ok(())
    }

    /// Dispatch up to `limit` eligible outbox items.
    ///
    /// Returns the number successfully delivered. Retryable failures are
    /// re-queued with exponential backoff; permanent failures and exhausted
    /// retry budgets dead-letter the item. An unregistered link name aborts
    /// the pass with [`crate::RelayError::UnknownLink`].
    pub async fn flush(&self, limit: usize) -> Result<usize> {
        let mut drained = 0;
        for item in self.outbox.pending(Some(limit)).await {
            let bridge = self.links.get(&item.link)?;
            match bridge.send(&item.env).await {
                Ok(_) => {
                    debug!(event_id = %item.event_id, link = %item.link, "delivered");
                    self.outbox.remove(item.outbox_id).await;
                    drained += 1;
                }
                Err(e) => {
                    let attempts = item.attempts + 1;
                    if !e.retryable || attempts >= self.config.max_attempts {
                        error!(
                            event_id = %item.event_id,
                            link = %item.link,
                            attempts,
                            error = %e,
                            "delivery dead-lettered"
                        );
                        self.outbox
                            .update(item.outbox_id, OutboxPatch::terminal(attempts, e.to_string()))
                            .await;
                        self.dead_letter_link(&item.env, &item.link, &e.to_string(), attempts)
                            .await;
                        self.outbox.remove(item.outbox_id).await;
                    } else {
                        let next = Utc::now() + self.backoff_delay(attempts);
                        warn!(
                            event_id = %item.event_id,
                            link = %item.link,
                            attempts,
                            next_attempt_at = %next,
                            error = %e,
                            "delivery failed; will retry"
                        );
                        self.outbox
                            .update(
                                item.outbox_id,
                                OutboxPatch::failure(attempts, e.to_string(), next),
                            )
                            .await;
                    }
                }
            }
        }
        Ok(drained)
    }

    /// Inline dispatch used when the outbox is bypassed. A failed send
    /// dead-letters immediately; only an unknown link is a caller error.
    async fn dispatch_direct(&self, link: &str, env: &Envelope) -> Result<()> {
        let bridge = self.links.get(link)?;
        if let Err(e) = bridge.send(env).await {
            error!(event_id = %env.event_id, link = %link, error = %e, "inline delivery failed");
            self.dead_letter_link(env, link, &e.to_string(), 1).await;
        }
        Ok(())
    }

    fn backoff_delay(&self, attempts: u32) -> chrono::Duration {
        let factor = 1u32 << attempts.saturating_sub(1).min(16);
        let delay = self
            .config
            .backoff_base
            .checked_mul(factor)
            .unwrap_or(self.config.backoff_cap)
            .min(self.config.backoff_cap);
        chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(3600))
    }

    async fn dead_letter_handlers(&self, env: &Envelope, failures: &[HandlerFailure]) {
        let payload = json!({
            "reason": "handler_error",
            "handler_errors": failures
                .iter()
                .map(|f| json!({"topic": f.topic, "error": f.error}))
                .collect::<Vec<_>>(),
        });
        self.publish_dlq(env, &["dlq", "handler_error"], payload)
            .await;
    }

    async fn dead_letter_link(&self, env: &Envelope, link: &str, error: &str, attempts: u32) {
        let payload = json!({
            "reason": "link_error",
            "failed_link": link,
            "error": error,
            "attempts": attempts,
        });
        self.publish_dlq(env, &["dlq", "link_error"], payload).await;
    }

    /// Publish a synthetic dead-letter envelope. Published exactly once;
    /// failures among DLQ subscribers are logged and dropped, never
    /// dead-lettered again.
    async fn publish_dlq(&self, env: &Envelope, extra_tags: &[&str], payload: serde_json::Value) {
        let dlq = dlq_envelope(env, extra_tags, payload);
        let failures = self.bus.publish(DLQ_TOPIC, dlq).await;
        for failure in failures {
            warn!(topic = %failure.topic, error = %failure.error, "dlq subscriber failed");
        }
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("router", &self.router)
            .field("links", &self.links)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build the dead-letter envelope for a failing envelope.
///
/// Fresh `event_id` and span; same world and shard; the failing envelope's
/// span becomes the parent so the loss is traceable to its cause.
fn dlq_envelope(env: &Envelope, extra_tags: &[&str], payload: serde_json::Value) -> Envelope {
    let mut tags = env.tags.clone();
    tags.extend(extra_tags.iter().map(|t| t.to_string()));

    Envelope {
        schema: SCHEMA.to_string(),
        version: SCHEMA_VERSION,
        event_id: Uuid::new_v4().to_string(),
        ts: Utc::now(),
        world_id: env.world_id.clone(),
        shard: env.shard.clone(),
        kind: DLQ_KIND.to_string(),
        source: Source::new("relay", Actor::System),
        trace: Trace {
            trace_id: env.trace.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(env.trace.span_id.clone()),
        },
        tags,
        routing: Routing {
            topic: DLQ_TOPIC.to_string(),
            priority: Priority::Normal,
        },
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::testing::{Collector, RecordingBridge, ScriptedBridge};
    use anyhow::anyhow;
    use serde_json::json;
    use std::time::Duration;

    fn zero_backoff() -> IngestorConfig {
        IngestorConfig {
            backoff_base: Duration::ZERO,
            ..IngestorConfig::default()
        }
    }

    fn input(event_id: &str) -> IngestInput {
        IngestInput::new("world-1", "player.moved", json!({"x": 1})).with_event_id(event_id)
    }

    #[tokio::test]
    async fn test_ingest_publishes_and_delivers() {
        let bus = Arc::new(Bus::new());
        let collector = Collector::new();
        collector.subscribe(&bus, "sim.*");
        let bridge = Arc::new(RecordingBridge::new());

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|_| Some(Decision::with_links("sim.player.moved", ["rec"])))
            .with_shared_link("rec", bridge.clone())
            .with_config(zero_backoff())
            .build();

        ingestor.ingest(input("e1")).await.unwrap();

        assert_eq!(collector.len(), 1);
        assert_eq!(collector.events()[0].routing.topic, "sim.player.moved");
        assert_eq!(bridge.sent_count(), 1);
        assert_eq!(ingestor.outbox_depth().await, 0);
    }

    #[tokio::test]
    async fn test_sequential_duplicate_is_noop() {
        let bus = Arc::new(Bus::new());
        let collector = Collector::new();
        collector.subscribe(&bus, "player.moved");
        let bridge = Arc::new(RecordingBridge::new());

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["rec"])))
            .with_shared_link("rec", bridge.clone())
            .build();

        ingestor.ingest(input("e1")).await.unwrap();
        ingestor.ingest(input("e1")).await.unwrap();

        assert_eq!(collector.len(), 1);
        assert_eq!(bridge.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_processed_once() {
        let bus = Arc::new(Bus::new());
        let collector = Collector::new();
        collector.subscribe(&bus, "player.moved");
        let bridge = Arc::new(RecordingBridge::new());

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["rec"])))
            .with_shared_link("rec", bridge.clone())
            .build();

        let (a, b) = tokio::join!(ingestor.ingest(input("e1")), ingestor.ingest(input("e1")));
        a.unwrap();
        b.unwrap();

        assert_eq!(collector.len(), 1);
        assert_eq!(bridge.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_retryable_failure_retries_then_succeeds() {
        let bridge = Arc::new(
            ScriptedBridge::new()
                .then_fail_retryable("socket closed")
                .then_fail_retryable("socket closed")
                .then_ok(),
        );
        let bus = Arc::new(Bus::new());
        let dlq = Collector::new();
        dlq.subscribe(&bus, DLQ_TOPIC);

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["flaky"])))
            .with_shared_link("flaky", bridge.clone())
            .with_config(zero_backoff())
            .build();

        // Ingest makes the first attempt; two manual passes finish the job.
        ingestor.ingest(input("e1")).await.unwrap();
        assert_eq!(bridge.calls(), 1);
        assert_eq!(ingestor.outbox_depth().await, 1);

        assert_eq!(ingestor.flush(10).await.unwrap(), 0);
        assert_eq!(ingestor.flush(10).await.unwrap(), 1);

        assert_eq!(bridge.calls(), 3);
        assert_eq!(ingestor.outbox_depth().await, 0);
        assert!(dlq.is_empty());
    }

    #[tokio::test]
    async fn test_permanent_failure_dead_letters_immediately() {
        let bridge = Arc::new(ScriptedBridge::new().then_fail_permanent("bad payload"));
        let bus = Arc::new(Bus::new());
        let dlq = Collector::new();
        dlq.subscribe(&bus, DLQ_TOPIC);

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["broken"])))
            .with_shared_link("broken", bridge.clone())
            .with_config(zero_backoff())
            .build();

        ingestor.ingest(input("e1")).await.unwrap();

        assert_eq!(bridge.calls(), 1);
        assert_eq!(ingestor.outbox_depth().await, 0);
        assert_eq!(dlq.len(), 1);

        let letter = &dlq.events()[0];
        assert_eq!(letter.payload["reason"], "link_error");
        assert_eq!(letter.payload["failed_link"], "broken");
        assert_eq!(letter.payload["attempts"], 1);
        assert_eq!(letter.payload["error"], "bad payload");
        assert!(letter.tags.contains(&"dlq".to_string()));
        assert!(letter.tags.contains(&"link_error".to_string()));
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_letter() {
        let bridge = Arc::new(
            ScriptedBridge::new()
                .then_fail_retryable("down")
                .then_fail_retryable("down")
                .then_fail_retryable("down")
                .then_fail_retryable("down")
                .then_fail_retryable("down"),
        );
        let bus = Arc::new(Bus::new());
        let dlq = Collector::new();
        dlq.subscribe(&bus, DLQ_TOPIC);

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["down"])))
            .with_shared_link("down", bridge.clone())
            .with_config(IngestorConfig {
                max_attempts: 5,
                backoff_base: Duration::ZERO,
                ..IngestorConfig::default()
            })
            .build();

        ingestor.ingest(input("e1")).await.unwrap();
        for _ in 0..4 {
            ingestor.flush(10).await.unwrap();
        }

        assert_eq!(bridge.calls(), 5);
        assert_eq!(ingestor.outbox_depth().await, 0);
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq.events()[0].payload["attempts"], 5);

        // A further flush finds nothing; the budget is spent.
        assert_eq!(ingestor.flush(10).await.unwrap(), 0);
        assert_eq!(bridge.calls(), 5);
    }

    #[tokio::test]
    async fn test_handler_failure_dead_letters_with_trace_linkage() {
        let bus = Arc::new(Bus::new());
        let seen = Collector::new();
        seen.subscribe(&bus, "player.moved");
        let dlq = Collector::new();
        dlq.subscribe(&bus, DLQ_TOPIC);
        bus.on("player.moved", |_| async { Err(anyhow!("handler broke")) });

        let ingestor = Ingestor::builder().with_bus(bus).build();
        ingestor.ingest(input("e1")).await.unwrap();

        assert_eq!(dlq.len(), 1);
        let letter = &dlq.events()[0];
        let original = &seen.events()[0];

        assert_eq!(letter.kind, DLQ_KIND);
        assert_eq!(letter.routing.topic, DLQ_TOPIC);
        assert_eq!(letter.payload["reason"], "handler_error");
        assert_eq!(letter.payload["handler_errors"][0]["topic"], "player.moved");
        assert!(letter.payload["handler_errors"][0]["error"]
            .as_str()
            .unwrap()
            .contains("handler broke"));
        assert_eq!(letter.source.system, "relay");
        assert_eq!(letter.source.actor, Actor::System);

        // Fresh identity, inherited trace, parented on the failing span.
        assert_ne!(letter.event_id, original.event_id);
        assert_eq!(letter.trace.trace_id, original.trace.trace_id);
        assert_eq!(
            letter.trace.parent_span_id.as_deref(),
            Some(original.trace.span_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_stop_delivery() {
        let bus = Arc::new(Bus::new());
        bus.on("player.moved", |_| async { Err(anyhow!("broke")) });
        let bridge = Arc::new(RecordingBridge::new());

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["rec"])))
            .with_shared_link("rec", bridge.clone())
            .build();

        ingestor.ingest(input("e1")).await.unwrap();
        assert_eq!(bridge.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_bypass_mode_dispatches_inline() {
        let bridge = Arc::new(RecordingBridge::new());
        let ingestor = Ingestor::builder()
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["rec"])))
            .with_shared_link("rec", bridge.clone())
            .bypass_outbox()
            .build();

        ingestor.ingest(input("e1")).await.unwrap();
        assert_eq!(bridge.sent_count(), 1);
        assert_eq!(ingestor.outbox_depth().await, 0);
    }

    #[tokio::test]
    async fn test_bypass_mode_failure_dead_letters_once() {
        let bridge = Arc::new(ScriptedBridge::new().then_fail_retryable("down"));
        let bus = Arc::new(Bus::new());
        let dlq = Collector::new();
        dlq.subscribe(&bus, DLQ_TOPIC);

        let ingestor = Ingestor::builder()
            .with_bus(bus)
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["down"])))
            .with_shared_link("down", bridge.clone())
            .bypass_outbox()
            .build();

        ingestor.ingest(input("e1")).await.unwrap();

        assert_eq!(bridge.calls(), 1);
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq.events()[0].payload["reason"], "link_error");
        assert_eq!(dlq.events()[0].payload["attempts"], 1);
    }

    #[tokio::test]
    async fn test_unknown_link_propagates_and_releases_claim() {
        let ingestor = Ingestor::builder()
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["missing"])))
            .build();

        let err = ingestor.ingest(input("e1")).await.unwrap_err();
        match err.downcast_ref::<RelayError>() {
            Some(RelayError::UnknownLink { name }) => assert_eq!(name, "missing"),
            None => panic!("expected UnknownLink"),
        }

        // The claim was released: the same event errors again rather than
        // silently deduping.
        assert!(ingestor.ingest(input("e1")).await.is_err());
    }

    #[tokio::test]
    async fn test_publish_only_decision_skips_outbox() {
        let ingestor = Ingestor::builder()
            .with_rule(|_| Some(Decision::publish_only("quiet.topic")))
            .build();

        ingestor.ingest(input("e1")).await.unwrap();
        assert_eq!(ingestor.outbox_depth().await, 0);
    }

    #[tokio::test]
    async fn test_fallback_routes_on_kind() {
        let bus = Arc::new(Bus::new());
        let collector = Collector::new();
        collector.subscribe(&bus, "player.moved");

        let ingestor = Ingestor::builder().with_bus(bus).build();
        ingestor.ingest(input("e1")).await.unwrap();

        assert_eq!(collector.len(), 1);
    }

    #[tokio::test]
    async fn test_fanout_to_multiple_links() {
        let a = Arc::new(RecordingBridge::new());
        let b = Arc::new(RecordingBridge::new());

        let ingestor = Ingestor::builder()
            .with_rule(|env| Some(Decision::with_links(env.routing.topic.clone(), ["a", "b"])))
            .with_shared_link("a", a.clone())
            .with_shared_link("b", b.clone())
            .build();

        ingestor.ingest(input("e1")).await.unwrap();

        assert_eq!(a.sent_count(), 1);
        assert_eq!(b.sent_count(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let ingestor = Ingestor::builder()
            .with_config(IngestorConfig {
                backoff_base: Duration::from_millis(50),
                backoff_cap: Duration::from_millis(300),
                ..IngestorConfig::default()
            })
            .build();

        assert_eq!(ingestor.backoff_delay(1).num_milliseconds(), 50);
        assert_eq!(ingestor.backoff_delay(2).num_milliseconds(), 100);
        assert_eq!(ingestor.backoff_delay(3).num_milliseconds(), 200);
        assert_eq!(ingestor.backoff_delay(4).num_milliseconds(), 300);
        assert_eq!(ingestor.backoff_delay(40).num_milliseconds(), 300);
    }
}
