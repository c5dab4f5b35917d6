//! Topic-addressed publish/subscribe with wildcard matching.
//!
//! # Guarantees
//!
//! - **Sequential dispatch**: handlers are awaited one at a time, in
//!   registration order across all matching topics.
//! - **Failure isolation**: a handler error or panic never stops the
//!   remaining handlers; failures are collected and returned as values.
//! - **`publish` never errors**: the caller decides what to do with the
//!   collected [`HandlerFailure`]s (the ingest pipeline dead-letters them).
//!
//! Exact matches carry no precedence over wildcard matches — registration
//! order is the only ordering guarantee.
//!
//! # Topics
//!
//! A handler registered under `"foo.*"` receives every topic starting with
//! `"foo."` (`"foo.bar"`, `"foo.bar.baz"`), but not `"foo"` itself and not
//! `"foobar"`.
//!
//! # Example
//!
//! ```ignore
//! let bus = Bus::new();
//! bus.on("sim.*", |env| async move {
//!     println!("sim event: {}", env.kind);
//!     Ok(())
//! });
//!
//! let failures = bus.publish("sim.player.moved", envelope).await;
//! assert!(failures.is_empty());
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::warn;

use crate::envelope::Envelope;

type HandlerFn = Arc<dyn Fn(Envelope) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Registration {
    pattern: String,
    handler: HandlerFn,
}

/// A handler that failed during a publish pass.
///
/// `topic` is the registered pattern (which may be a wildcard), `error` the
/// stringified failure. These cross the pipeline as values, never as
/// exceptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub topic: String,
    pub error: String,
}

/// Topic bus for fanning envelopes out to subscribers.
pub struct Bus {
    registrations: Mutex<Vec<Registration>>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler under an exact topic string or a `"<prefix>.*"`
    /// wildcard. Handlers run in registration order.
    pub fn on<F, Fut>(&self, topic: impl Into<String>, handler: F)
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |env| handler(env).boxed());
        self.registrations
            .lock()
            .expect("bus registration lock poisoned")
            .push(Registration {
                pattern: topic.into(),
                handler,
            });
    }

    /// Invoke every matching handler sequentially, collecting failures.
    ///
    /// Each invocation is individually isolated: errors and panics are
    /// captured and reported per handler. Returns the collected failures;
    /// never errors itself.
    pub async fn publish(&self, topic: &str, envelope: Envelope) -> Vec<HandlerFailure> {
        let matching: Vec<(String, HandlerFn)> = {
            let registrations = self
                .registrations
                .lock()
                .expect("bus registration lock poisoned");
            registrations
                .iter()
                .filter(|reg| topic_matches(&reg.pattern, topic))
                .map(|reg| (reg.pattern.clone(), reg.handler.clone()))
                .collect()
        };

        let mut failures = Vec::new();
        for (pattern, handler) in matching {
            let outcome = AssertUnwindSafe(handler(envelope.clone()))
                .catch_unwind()
                .await;
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{e:#}"),
                Err(panic_info) => format!("handler panicked: {}", panic_message(&panic_info)),
            };
            warn!(topic = %pattern, published = %topic, error = %error, "handler failed");
            failures.push(HandlerFailure {
                topic: pattern,
                error,
            });
        }
        failures
    }

    /// Number of registered handlers (across all topics).
    pub fn handler_count(&self) -> usize {
        self.registrations
            .lock()
            .expect("bus registration lock poisoned")
            .len()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

/// True when `pattern` addresses `topic`: exact equality, or a wildcard
/// `"<prefix>.*"` with `topic` starting with `"<prefix>."`.
fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }
    match pattern.strip_suffix(".*") {
        Some(prefix) => topic
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => false,
    }
}

/// Extract a human-readable message from a panic payload.
fn panic_message(panic_info: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
