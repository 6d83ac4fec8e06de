//! In-memory transport
//!
//! A tokio `mpsc` duplex. The client half implements [`Stream`]; the server
//! half ([`ServerStream`]) is handed to whatever task plays the remote.

use super::{Stream, StreamClient};
use crate::framer::{FramerError, FramerResult};
use crate::iterator::messages::{IteratorRequest, IteratorResponse};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Client half of an in-memory stream
#[derive(Debug)]
pub struct MemoryStream {
    /// `None` once the sending half is closed
    tx: Option<mpsc::UnboundedSender<IteratorRequest>>,
    rx: mpsc::UnboundedReceiver<IteratorResponse>,
}

/// Server half of an in-memory stream
#[derive(Debug)]
pub struct ServerStream {
    rx: mpsc::UnboundedReceiver<IteratorRequest>,
    tx: mpsc::UnboundedSender<IteratorResponse>,
}

/// Create a connected client/server pair
pub fn duplex() -> (MemoryStream, ServerStream) {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (res_tx, res_rx) = mpsc::unbounded_channel();
    (
        MemoryStream {
            tx: Some(req_tx),
            rx: res_rx,
        },
        ServerStream {
            rx: req_rx,
            tx: res_tx,
        },
    )
}

impl ServerStream {
    /// Next request, or `None` once the client closed its sending half
    pub async fn recv(&mut self) -> Option<IteratorRequest> {
        self.rx.recv().await
    }

    pub fn send(&self, response: IteratorResponse) -> FramerResult<()> {
        self.tx.send(response).map_err(|_| FramerError::Closed)
    }
}

#[async_trait]
impl Stream for MemoryStream {
    async fn send(&mut self, request: IteratorRequest) -> FramerResult<()> {
        let tx = self.tx.as_ref().ok_or(FramerError::Closed)?;
        tx.send(request).map_err(|_| FramerError::Closed)
    }

    async fn receive(&mut self) -> FramerResult<Option<IteratorResponse>> {
        Ok(self.rx.recv().await)
    }

    async fn close_and_ack(&mut self) -> FramerResult<()> {
        self.tx = None;
        while self.rx.recv().await.is_some() {}
        Ok(())
    }
}

/// Stream client whose streams are accepted by a [`MemoryAcceptor`]
#[derive(Debug, Clone)]
pub struct MemoryClient {
    connections: mpsc::UnboundedSender<(String, ServerStream)>,
}

/// Receives the server halves of streams opened through a [`MemoryClient`]
#[derive(Debug)]
pub struct MemoryAcceptor {
    connections: Mutex<mpsc::UnboundedReceiver<(String, ServerStream)>>,
}

impl MemoryClient {
    /// A client and the acceptor receiving its streams
    pub fn pair() -> (Self, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { connections: tx },
            MemoryAcceptor {
                connections: Mutex::new(rx),
            },
        )
    }
}

impl MemoryAcceptor {
    /// Wait for the next opened stream and the path it was opened on
    pub async fn accept(&self) -> Option<(String, ServerStream)> {
        self.connections.lock().await.recv().await
    }
}

#[async_trait]
impl StreamClient for MemoryClient {
    async fn open(&self, path: &str) -> FramerResult<Box<dyn Stream>> {
        let (client, server) = duplex();
        self.connections
            .send((path.to_string(), server))
            .map_err(|_| FramerError::Transport(format!("no acceptor for {}", path)))?;
        tracing::debug!(path = %path, "Opened in-memory stream");
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::messages::Command;

    #[tokio::test]
    async fn test_duplex_exchange() {
        let (mut client, mut server) = duplex();

        client.send(IteratorRequest::seek_first()).await.unwrap();
        let req = server.recv().await.unwrap();
        assert_eq!(req.command, Command::SeekFirst);

        server
            .send(IteratorResponse::ack(Command::SeekFirst, true))
            .unwrap();
        let res = client.receive().await.unwrap().unwrap();
        assert!(res.ack);
    }

    #[tokio::test]
    async fn test_close_and_ack_drains() {
        let (mut client, mut server) = duplex();

        let remote = tokio::spawn(async move {
            server
                .send(IteratorResponse::ack(Command::Next, true))
                .unwrap();
            // Runs until the client closes its sending half
            while server.recv().await.is_some() {}
        });

        client.close_and_ack().await.unwrap();
        remote.await.unwrap();
        assert!(matches!(
            client.send(IteratorRequest::valid()).await,
            Err(FramerError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_client_without_acceptor() {
        let (client, acceptor) = MemoryClient::pair();
        drop(acceptor);
        assert!(matches!(
            client.open("/frame/iterate").await,
            Err(FramerError::Transport(_))
        ));
    }
}
