//! Push-channel consumption with reconnect backoff.
//!
//! Each channel gets one manager task that connects through a
//! [`ChannelTransport`], forwards every text frame to the engine in
//! arrival order, and reconnects with jittered exponential backoff when
//! the stream drops. Connection internals stay behind the trait.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use stockroom_api_types::{ChannelKind, RawChannelMessage};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ReconnectConfig;
use crate::events::EngineMessage;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Connect failed: {0}")]
    Connect(String),
    #[error("Read failed: {0}")]
    Read(String),
}

/// Stream of text frames from one channel connection.
pub type FrameStream = BoxStream<'static, Result<String, ChannelError>>;

/// Connection factory for one push channel.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn connect(&self) -> Result<FrameStream, ChannelError>;
}

/// WebSocket transport.
pub struct WsTransport {
    endpoint: String,
}

impl WsTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChannelTransport for WsTransport {
    async fn connect(&self) -> Result<FrameStream, ChannelError> {
        let (stream, _) = tokio_tungstenite::connect_async(self.endpoint.as_str())
            .await
            .map_err(|err| ChannelError::Connect(err.to_string()))?;
        let frames = stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(_)) => None,
                Ok(_) => None,
                Err(err) => Some(Err(ChannelError::Read(err.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}

/// Spawn the manager task for one channel.
///
/// Frames that fail to parse are logged and dropped; the stream itself
/// never dies from a bad frame.
pub fn spawn_channel_manager(
    transport: Arc<dyn ChannelTransport>,
    channel: ChannelKind,
    sender: mpsc::Sender<EngineMessage>,
    reconnect: ReconnectConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = reconnect.initial_ms;
        loop {
            match transport.connect().await {
                Ok(mut frames) => {
                    let _ = sender.send(EngineMessage::ChannelUp { channel }).await;
                    backoff = reconnect.initial_ms;

                    let mut drop_reason = "stream closed".to_string();
                    while let Some(frame) = frames.next().await {
                        match frame {
                            Ok(text) => match RawChannelMessage::parse(&text) {
                                Ok(frame) => {
                                    let _ = sender
                                        .send(EngineMessage::Channel { channel, frame })
                                        .await;
                                }
                                Err(err) => {
                                    tracing::warn!(?channel, error = %err, "dropping malformed frame");
                                }
                            },
                            Err(err) => {
                                drop_reason = err.to_string();
                                break;
                            }
                        }
                    }

                    let _ = sender
                        .send(EngineMessage::ChannelDown {
                            channel,
                            reason: drop_reason,
                        })
                        .await;
                }
                Err(err) => {
                    let _ = sender
                        .send(EngineMessage::ChannelDown {
                            channel,
                            reason: err.to_string(),
                        })
                        .await;
                }
            }

            let delay = jittered_backoff(backoff, reconnect.jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            let next = (backoff as f64 * reconnect.multiplier) as u64;
            backoff = next.min(reconnect.max_ms);
        }
    })
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    let jitter = nanos % jitter_ms;
    base_ms.saturating_add(jitter)
}
