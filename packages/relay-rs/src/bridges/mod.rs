//! Reference bridge implementations.
//!
//! Three transports illustrate the [`crate::Bridge`] contract:
//!
//! - [`ConsoleBridge`] — always succeeds; observability/debug fan-out.
//! - [`WsBridge`] — optional websocket transport (`ws` feature) with
//!   backoff-gated reconnection; degrades to a permanent error when the
//!   feature is off.
//! - [`StoreBridge`] — embedded-DB sink (`sqlite` feature) with an
//!   in-process fallback and idempotent upsert keyed by `event_id`.

mod console;
mod store;
mod websocket;

pub use console::ConsoleBridge;
pub use store::StoreBridge;
pub use websocket::WsBridge;
