//! WebSocket transport backed by `tokio-tungstenite`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::collector::{Connection, Frame, Received, Transport, TransportError};

/// Production transport for `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, response) = connect_async(endpoint).await?;
        tracing::debug!(endpoint = %endpoint, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl Connection for WebSocketConnection {
    async fn send(&mut self, token: &str) -> Result<(), TransportError> {
        self.stream.send(Message::Text(token.to_owned())).await?;
        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<Received, TransportError> {
        let deadline = Instant::now() + wait;
        loop {
            // `StreamExt::next` is cancel-safe, so timing out here loses nothing.
            let Ok(next) = timeout_at(deadline, self.stream.next()).await else {
                return Ok(Received::Timeout);
            };
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Received::Frame(Frame::Text(text))),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Received::Frame(Frame::Binary(bytes)));
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", f.code, f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Err(TransportError::Closed(reason));
                }
                // ping/pong are answered by tungstenite on the next read
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed("stream ended".to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
