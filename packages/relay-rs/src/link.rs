//! The bridge contract and the registry of named transports.
//!
//! A [`Bridge`] is a pluggable delivery transport exposing exactly one
//! operation: `send(envelope)`. Anything wanting to plug a new transport
//! into the pipeline implements the trait, registers under a name, and has
//! router rules reference that name in their `links`.
//!
//! # Example
//!
//! ```ignore
//! struct WebhookBridge { client: reqwest::Client, url: String }
//!
//! #[async_trait]
//! impl Bridge for WebhookBridge {
//!     async fn send(&self, env: &Envelope) -> Result<Delivery, LinkError> {
//!         self.client
//!             .post(&self.url)
//!             .json(env)
//!             .send()
//!             .await
//!             .map_err(|e| LinkError::retryable(format!("webhook: {e}")))?;
//!         Ok(Delivery::ok())
//!     }
//! }
//!
//! let links = LinkRegistry::new().with_link("webhook", WebhookBridge { .. });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::envelope::Envelope;
use crate::error::{LinkError, RelayError};

/// Successful delivery confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Optional transport-specific detail (row id, ack tag).
    pub detail: Option<String>,
}

impl Delivery {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
        }
    }
}

/// A pluggable delivery transport.
///
/// Implementations must degrade to a reported [`LinkError`] rather than
/// panic when an optional dependency is absent or a connection is down.
#[async_trait]
pub trait Bridge: Send + Sync + 'static {
    async fn send(&self, env: &Envelope) -> Result<Delivery, LinkError>;
}

impl std::fmt::Debug for dyn Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Bridge")
    }
}

/// Named registry of bridges.
pub struct LinkRegistry {
    links: HashMap<String, Arc<dyn Bridge>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self {
            links: HashMap::new(),
        }
    }

    /// Register a bridge under `name`, replacing any previous registration.
    pub fn with_link(mut self, name: impl Into<String>, bridge: impl Bridge) -> Self {
        self.links.insert(name.into(), Arc::new(bridge));
        self
    }

    /// Register an already-shared bridge under `name`.
    pub fn with_shared_link(mut self, name: impl Into<String>, bridge: Arc<dyn Bridge>) -> Self {
        self.links.insert(name.into(), bridge);
        self
    }

    /// Look up a bridge; fails with [`RelayError::UnknownLink`] if absent.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Bridge>> {
        self.links.get(name).cloned().ok_or_else(|| {
            RelayError::UnknownLink {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.links.contains_key(name)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.links.keys().collect();
        names.sort();
        f.debug_struct("LinkRegistry").field("links", &names).finish()
    }
}
