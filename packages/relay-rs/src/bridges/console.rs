//! Logging sink bridge. Always succeeds.

use async_trait::async_trait;
use tracing::info;

use crate::envelope::Envelope;
use crate::error::LinkError;
use crate::link::{Bridge, Delivery};

/// Writes every envelope to the log and reports success.
///
/// Useful as a debug fan-out target and as the cheapest possible link for
/// wiring tests and demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleBridge;

impl ConsoleBridge {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Bridge for ConsoleBridge {
    async fn send(&self, env: &Envelope) -> Result<Delivery, LinkError> {
        info!(
            event_id = %env.event_id,
            world_id = %env.world_id,
            topic = %env.routing.topic,
            kind = %env.kind,
            payload = %env.payload,
            "console sink"
        );
        Ok(Delivery::ok())
    }
}
