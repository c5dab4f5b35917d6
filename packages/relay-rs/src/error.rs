//! Structured error types for the relay core.
//!
//! The taxonomy follows the pipeline's failure surfaces:
//!
//! - Handler failures never become errors at all — the bus collects them as
//!   [`crate::HandlerFailure`] values and the pipeline dead-letters them.
//! - [`LinkError`] is a bridge's `send` failure, classified retryable or
//!   permanent; the outbox escalation logic keys off that flag.
//! - [`RelayError`] covers the structured pipeline failures that propagate
//!   to the `ingest()` caller as `anyhow::Error`, downcastable for pattern
//!   matching:
//!
//! ```ignore
//! if let Err(e) = ingestor.ingest(input).await {
//!     if let Some(RelayError::UnknownLink { name }) = e.downcast_ref::<RelayError>() {
//!         eprintln!("router referenced unregistered link {name}");
//!     }
//! }
//! ```

use thiserror::Error;

/// A bridge's `send` failed.
///
/// `retryable` drives outbox escalation: retryable failures are re-queued
/// (up to the attempt budget), permanent ones dead-letter immediately.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LinkError {
    pub message: String,
    pub retryable: bool,
}

impl LinkError {
    /// A transient failure worth retrying (connection loss, timeout).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A permanent failure; retrying cannot help (missing dependency,
    /// malformed envelope).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Structured pipeline errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A router rule or caller referenced a link name never registered.
    #[error("no link registered under name {name:?}")]
    UnknownLink { name: String },
}
