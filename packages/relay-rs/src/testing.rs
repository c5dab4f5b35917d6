//! Test doubles for exercising the pipeline.
//!
//! Available to downstream crates behind the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! relay = { version = "0.1", features = ["testing"] }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::bus::Bus;
use crate::envelope::Envelope;
use crate::error::LinkError;
use crate::link::{Bridge, Delivery};

/// Bridge that records every envelope it is asked to send and succeeds.
#[derive(Debug, Default)]
pub struct RecordingBridge {
    sent: Mutex<Vec<Envelope>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Bridge for RecordingBridge {
    async fn send(&self, env: &Envelope) -> Result<Delivery, LinkError> {
        self.sent.lock().unwrap().push(env.clone());
        Ok(Delivery::ok())
    }
}

/// One scripted `send` outcome for a [`ScriptedBridge`].
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Ok,
    Retryable(String),
    Permanent(String),
}

/// Bridge that plays back a scripted sequence of outcomes.
///
/// Once the script runs out, every further call succeeds. Call counts are
/// tracked so tests can assert exactly how many attempts were made.
#[derive(Debug, Default)]
pub struct ScriptedBridge {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self) -> Self {
        self.script.lock().unwrap().push_back(ScriptedOutcome::Ok);
        self
    }

    pub fn then_fail_retryable(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedOutcome::Retryable(message.into()));
        self
    }

    pub fn then_fail_permanent(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedOutcome::Permanent(message.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bridge for ScriptedBridge {
    async fn send(&self, _env: &Envelope) -> Result<Delivery, LinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            None | Some(ScriptedOutcome::Ok) => Ok(Delivery::ok()),
            Some(ScriptedOutcome::Retryable(m)) => Err(LinkError::retryable(m)),
            Some(ScriptedOutcome::Permanent(m)) => Err(LinkError::permanent(m)),
        }
    }
}

/// Subscribes to a bus topic and collects every envelope it receives.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    seen: Arc<Mutex<Vec<Envelope>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register this collector as a handler on `topic` (wildcards allowed).
    pub fn subscribe(&self, bus: &Bus, topic: impl Into<String>) {
        let seen = self.seen.clone();
        bus.on(topic, move |env| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(env);
                Ok(())
            }
        });
    }

    pub fn events(&self) -> Vec<Envelope> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().unwrap().is_empty()
    }
}
