//! Stream transport
//!
//! The iterator talks to a remote cursor over a bidirectional stream of
//! [`IteratorRequest`]s and [`IteratorResponse`]s. This module defines that
//! seam and two implementations:
//!
//! - **memory**: an in-process duplex built on tokio channels
//! - **websocket**: JSON text frames over a WebSocket connection

pub mod memory;
pub mod websocket;

use crate::framer::FramerResult;
use crate::iterator::messages::{IteratorRequest, IteratorResponse};
use async_trait::async_trait;

pub use memory::{duplex, MemoryAcceptor, MemoryClient, MemoryStream, ServerStream};
pub use websocket::{WebSocketClient, WsStream};

/// One open request/response stream
#[async_trait]
pub trait Stream: Send {
    /// Send a request
    async fn send(&mut self, request: IteratorRequest) -> FramerResult<()>;

    /// Next response, or `None` once the remote has closed the stream
    async fn receive(&mut self) -> FramerResult<Option<IteratorResponse>>;

    /// Close the sending half and wait for the remote to acknowledge by
    /// closing its half. Responses still in flight are discarded.
    async fn close_and_ack(&mut self) -> FramerResult<()>;
}

/// Opens streams to a remote service
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn open(&self, path: &str) -> FramerResult<Box<dyn Stream>>;
}
