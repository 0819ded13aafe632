//! Stream Transport Seam
//!
//! The ingest loop talks to the upstream relay through the
//! `StreamTransport` trait so the reconnect state machine can be driven
//! deterministically in tests with a scripted fake instead of sockets.
//! The production implementation wraps a tokio-tungstenite websocket.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("not connected")]
    NotConnected,
    #[error("websocket error: {0}")]
    Ws(String),
}

/// One logical upstream session: connect, send the subscription, read
/// text frames until the stream ends.
#[async_trait]
pub trait StreamTransport: Send {
    async fn connect(&mut self) -> Result<(), TransportError>;
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    /// Next text frame. `Ok(None)` means the peer closed cleanly.
    async fn next_text(&mut self) -> Result<Option<String>, TransportError>;
    async fn close(&mut self);
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket transport against the live relay.
pub struct WsTransport {
    url: String,
    open_timeout: Duration,
    stream: Option<WsStream>,
}

impl WsTransport {
    pub fn new(url: &str, open_timeout: Duration) -> Self {
        WsTransport {
            url: url.to_string(),
            open_timeout,
            stream: None,
        }
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.stream = None;
        let handshake = connect_async(self.url.as_str());
        let (stream, _response) = tokio::time::timeout(self.open_timeout, handshake)
            .await
            .map_err(|_| TransportError::Connect("opening handshake timed out".to_string()))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Ws(e.to_string()))
    }

    async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        while let Some(frame) = stream.next().await {
            match frame.map_err(|e| TransportError::Ws(e.to_string()))? {
                Message::Text(text) => return Ok(Some(text.to_string())),
                Message::Binary(bytes) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Message::Close(_) => return Ok(None),
                // Control frames are answered by tungstenite itself.
                _ => continue,
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}

/// Scripted transport for driving the ingest loop in tests.
///
/// `sent` is shared so assertions can keep a handle after the transport
/// moves into the ingestor.
#[cfg(test)]
#[derive(Default)]
pub struct FakeTransport {
    pub connect_results: std::collections::VecDeque<Result<(), TransportError>>,
    pub frames: std::collections::VecDeque<Result<Option<String>, TransportError>>,
    pub sent: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    pub connects: usize,
    pub closed: bool,
}

#[cfg(test)]
impl FakeTransport {
    pub fn with_frames<I: IntoIterator<Item = &'static str>>(frames: I) -> Self {
        let mut fake = FakeTransport::default();
        for f in frames {
            fake.frames.push_back(Ok(Some(f.to_string())));
        }
        fake
    }
}

#[cfg(test)]
#[async_trait]
impl StreamTransport for FakeTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connects += 1;
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().expect("sent lock").push(text);
        Ok(())
    }

    async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
        self.frames.pop_front().unwrap_or(Ok(None))
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
