//! Websocket transport bridge behind the optional `ws` feature.
//!
//! Without the feature, every `send` reports the permanent
//! `ws-not-installed` error so the pipeline degrades to dead-lettering
//! instead of crashing. With the feature, the connection is established
//! lazily on first use; while disconnected, `send` reports a retryable
//! failure and reconnect attempts are gated by a doubling backoff capped
//! at 10 seconds.

use async_trait::async_trait;

use crate::envelope::Envelope;
use crate::error::LinkError;
use crate::link::{Bridge, Delivery};

/// Sends envelopes as JSON text frames over a websocket connection.
pub struct WsBridge {
    url: String,
    #[cfg(feature = "ws")]
    conn: tokio::sync::Mutex<imp::Conn>,
}

impl WsBridge {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            #[cfg(feature = "ws")]
            conn: tokio::sync::Mutex::new(imp::Conn::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for WsBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsBridge").field("url", &self.url).finish()
    }
}

#[cfg(not(feature = "ws"))]
#[async_trait]
impl Bridge for WsBridge {
    async fn send(&self, _env: &Envelope) -> Result<Delivery, LinkError> {
        Err(LinkError::permanent("ws-not-installed"))
    }
}

#[cfg(feature = "ws")]
#[async_trait]
impl Bridge for WsBridge {
    async fn send(&self, env: &Envelope) -> Result<Delivery, LinkError> {
        let mut conn = self.conn.lock().await;
        conn.ensure_open(&self.url).await?;

        let text = serde_json::to_string(env)
            .map_err(|e| LinkError::permanent(format!("envelope encode failed: {e}")))?;
        conn.send_text(text).await?;
        Ok(Delivery::ok())
    }
}

#[cfg(feature = "ws")]
mod imp {
    use std::time::{Duration, Instant};

    use futures::SinkExt;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tracing::{debug, warn};

    use crate::error::LinkError;

    const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
    const MAX_BACKOFF: Duration = Duration::from_secs(10);

    type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Connection state with backoff-gated reconnection.
    pub(super) struct Conn {
        stream: Option<WsStream>,
        next_attempt: Option<Instant>,
        delay: Duration,
    }

    impl Default for Conn {
        fn default() -> Self {
            Self {
                stream: None,
                next_attempt: None,
                delay: INITIAL_BACKOFF,
            }
        }
    }

    impl Conn {
        /// Connect if disconnected and the backoff window has elapsed.
        pub(super) async fn ensure_open(&mut self, url: &str) -> Result<(), LinkError> {
            if self.stream.is_some() {
                return Ok(());
            }
            if let Some(at) = self.next_attempt {
                if Instant::now() < at {
                    return Err(LinkError::retryable("websocket not yet open"));
                }
            }
            match connect_async(url).await {
                Ok((stream, _response)) => {
                    debug!(%url, "websocket connected");
                    self.stream = Some(stream);
                    self.next_attempt = None;
                    self.delay = INITIAL_BACKOFF;
                    Ok(())
                }
                Err(e) => {
                    warn!(%url, error = %e, backoff = ?self.delay, "websocket connect failed");
                    self.schedule_reconnect();
                    Err(LinkError::retryable(format!(
                        "websocket connect failed: {e}"
                    )))
                }
            }
        }

        pub(super) async fn send_text(&mut self, text: String) -> Result<(), LinkError> {
            let Some(stream) = self.stream.as_mut() else {
                return Err(LinkError::retryable("websocket not yet open"));
            };
            match stream.send(Message::Text(text.into())).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!(error = %e, backoff = ?self.delay, "websocket send failed; dropping connection");
                    self.stream = None;
                    self.schedule_reconnect();
                    Err(LinkError::retryable(format!("websocket send failed: {e}")))
                }
            }
        }

        fn schedule_reconnect(&mut self) {
            self.next_attempt = Some(Instant::now() + self.delay);
            self.delay = (self.delay * 2).min(MAX_BACKOFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::IngestInput;
    use serde_json::json;

    #[cfg(not(feature = "ws"))]
    #[tokio::test]
    async fn test_without_feature_reports_permanent_error() {
        let bridge = WsBridge::new("ws://localhost:9");
        let env = IngestInput::new("w1", "k", json!({})).normalize();

        let err = bridge.send(&env).await.unwrap_err();
        assert_eq!(err.message, "ws-not-installed");
        assert!(!err.retryable);
    }

    #[cfg(feature = "ws")]
    #[tokio::test]
    async fn test_unreachable_server_is_retryable_and_backs_off() {
        // Port 9 (discard) is closed; the first send attempts a connect and
        // fails retryably, the second is gated by the backoff window.
        let bridge = WsBridge::new("ws://127.0.0.1:9");
        let env = IngestInput::new("w1", "k", json!({})).normalize();

        let err = bridge.send(&env).await.unwrap_err();
        assert!(err.retryable);
        assert!(err.message.contains("connect failed"));

        let err = bridge.send(&env).await.unwrap_err();
        assert!(err.retryable);
        assert!(err.message.contains("not yet open"));
    }

    #[test]
    fn test_debug_shows_url() {
        let bridge = WsBridge::new("ws://example.test/feed");
        assert!(format!("{:?}", bridge).contains("ws://example.test/feed"));
    }
}
