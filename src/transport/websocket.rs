//! WebSocket transport
//!
//! Each stream is one WebSocket connection to `{base_url}{path}`. Requests and
//! responses travel as JSON text frames; binary frames carrying JSON are
//! accepted on receive.

use super::{Stream, StreamClient};
use crate::framer::{FramerError, FramerResult};
use crate::iterator::messages::{IteratorRequest, IteratorResponse};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Opens iterator streams over WebSocket
#[derive(Debug, Clone)]
pub struct WebSocketClient {
    base_url: String,
    connect_timeout: Duration,
}

impl WebSocketClient {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout,
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl StreamClient for WebSocketClient {
    async fn open(&self, path: &str) -> FramerResult<Box<dyn Stream>> {
        let url = self.url_for(path);
        let (socket, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                FramerError::Transport(format!(
                    "connecting to {} timed out after {:?}",
                    url, self.connect_timeout
                ))
            })?
            .map_err(|e| FramerError::Transport(format!("connecting to {}: {}", url, e)))?;

        tracing::debug!(url = %url, "WebSocket stream opened");
        Ok(Box::new(WsStream {
            socket,
            closed: false,
        }))
    }
}

/// A WebSocket connection carrying one iterator session
pub struct WsStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

fn transport_error(err: tungstenite::Error) -> FramerError {
    FramerError::Transport(err.to_string())
}

#[async_trait]
impl Stream for WsStream {
    async fn send(&mut self, request: IteratorRequest) -> FramerResult<()> {
        if self.closed {
            return Err(FramerError::Closed);
        }
        let text = serde_json::to_string(&request)?;
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(transport_error)
    }

    async fn receive(&mut self) -> FramerResult<Option<IteratorResponse>> {
        while let Some(message) = self.socket.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(serde_json::from_str(&text)?)),
                Ok(Message::Binary(bytes)) => return Ok(Some(serde_json::from_slice(&bytes)?)),
                Ok(Message::Ping(payload)) => {
                    self.socket
                        .send(Message::Pong(payload))
                        .await
                        .map_err(transport_error)?;
                }
                Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Remote closed WebSocket stream");
                    return Ok(None);
                }
                Err(tungstenite::Error::ConnectionClosed) => return Ok(None),
                Err(e) => return Err(transport_error(e)),
            }
        }
        Ok(None)
    }

    async fn close_and_ack(&mut self) -> FramerResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.socket.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => {}
            Err(tungstenite::Error::AlreadyClosed) => return Ok(()),
            Err(e) => return Err(transport_error(e)),
        }
        // Wait for the remote's close frame, discarding anything still in flight
        while let Some(message) = self.socket.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        Ok(())
    }
}
