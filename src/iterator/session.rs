//! Frame iterator
//!
//! A `FrameIterator` owns one stream to a remote cursor. Every command is sent
//! once and answered by zero or more data responses, whose frames are
//! accumulated into [`FrameIterator::value`], followed by exactly one ack.
//!
//! Only one command is in flight at a time; the `&mut self` receivers enforce
//! that.

use crate::channel::{ChannelParams, ChannelRetriever};
use crate::framer::{Frame, FramerError, FramerResult, ReadAdapter};
use crate::iterator::messages::{ErrorPayload, IteratorRequest, IteratorResponse, ResponseVariant};
use crate::iterator::sequence::FrameSequence;
use crate::telem::{TimeRange, TimeSpan, TimeStamp};
use crate::transport::{Stream, StreamClient};
use uuid::Uuid;

/// Lets the remote cursor choose how far each `next`/`prev` advances
pub const AUTO_SPAN: TimeSpan = TimeSpan(-1);

/// Parameters for opening an iterator
#[derive(Debug, Clone)]
pub struct IteratorConfig {
    /// Time bound of the whole session
    pub bounds: TimeRange,
    /// Channels to iterate over, by key or by name
    pub channels: ChannelParams,
    /// Maximum samples per channel per data response
    pub chunk_size: u64,
}

impl IteratorConfig {
    pub fn new(bounds: TimeRange, channels: impl Into<ChannelParams>) -> Self {
        Self {
            bounds,
            channels: channels.into(),
            chunk_size: 100_000,
        }
    }

    /// Builder: set chunk size
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Client side of a remote cursor session
pub struct FrameIterator {
    id: Uuid,
    /// Taken on close
    stream: Option<Box<dyn Stream>>,
    adapter: ReadAdapter,
    value: Frame,
    last_error: Option<ErrorPayload>,
    closed: bool,
}

impl FrameIterator {
    /// Resolve channels, open a stream on `path`, and send `Open`.
    ///
    /// A refused `Open` closes the stream and fails with the remote error, or
    /// with a protocol error if the remote gave none.
    pub async fn open(
        client: &dyn StreamClient,
        retriever: &dyn ChannelRetriever,
        path: &str,
        config: IteratorConfig,
    ) -> FramerResult<Self> {
        let adapter = ReadAdapter::open(retriever, &config.channels).await?;
        let stream = client.open(path).await?;

        let mut iter = Self {
            id: Uuid::new_v4(),
            stream: Some(stream),
            adapter,
            value: Frame::empty(),
            last_error: None,
            closed: false,
        };

        tracing::debug!(
            session = %iter.id,
            bounds = %config.bounds,
            keys = ?iter.adapter.keys(),
            chunk_size = config.chunk_size,
            "Opening iterator"
        );

        let request =
            IteratorRequest::open(config.bounds, iter.adapter.keys().to_vec(), config.chunk_size);
        if !iter.execute(request).await? {
            let err = match iter.last_error.take() {
                Some(err) => err.into(),
                None => FramerError::Protocol("remote cursor refused to open".to_string()),
            };
            iter.close().await;
            return Err(err);
        }
        Ok(iter)
    }

    /// Advance by `span`. A negative span other than [`AUTO_SPAN`] moves
    /// backward by its magnitude.
    pub async fn next(&mut self, span: TimeSpan) -> FramerResult<bool> {
        let request = if span != AUTO_SPAN && span.is_negative() {
            IteratorRequest::prev(span.abs())
        } else {
            IteratorRequest::next(span)
        };
        self.execute(request).await
    }

    /// Move backward by `span`. A negative span other than [`AUTO_SPAN`] moves
    /// forward by its magnitude.
    pub async fn prev(&mut self, span: TimeSpan) -> FramerResult<bool> {
        let request = if span != AUTO_SPAN && span.is_negative() {
            IteratorRequest::next(span.abs())
        } else {
            IteratorRequest::prev(span)
        };
        self.execute(request).await
    }

    pub async fn seek_first(&mut self) -> FramerResult<bool> {
        self.execute(IteratorRequest::seek_first()).await
    }

    pub async fn seek_last(&mut self) -> FramerResult<bool> {
        self.execute(IteratorRequest::seek_last()).await
    }

    pub async fn seek_le(&mut self, stamp: TimeStamp) -> FramerResult<bool> {
        self.execute(IteratorRequest::seek_le(stamp)).await
    }

    pub async fn seek_ge(&mut self, stamp: TimeStamp) -> FramerResult<bool> {
        self.execute(IteratorRequest::seek_ge(stamp)).await
    }

    /// Whether the cursor is positioned and has not accumulated an error
    pub async fn valid(&mut self) -> FramerResult<bool> {
        self.execute(IteratorRequest::valid()).await
    }

    /// Send `request` and accumulate data responses until its ack.
    ///
    /// Resets [`value`](Self::value) first. Returns the ack flag; `Ok(false)`
    /// once closed. A stream that ends before the ack, or a response for
    /// another command, closes the iterator and fails with a protocol error.
    pub async fn execute(&mut self, request: IteratorRequest) -> FramerResult<bool> {
        if self.closed {
            return Ok(false);
        }
        self.value = Frame::empty();
        self.last_error = None;

        let command = request.command;
        tracing::trace!(session = %self.id, command = %command, "Sending command");
        if let Err(e) = self.send_request(request).await {
            return Err(self.fail(e).await);
        }

        loop {
            let response = match self.receive_response().await {
                Ok(Some(response)) => response,
                Ok(None) => {
                    let err = FramerError::Protocol(format!(
                        "stream ended before ack for {}",
                        command
                    ));
                    return Err(self.fail(err).await);
                }
                Err(e) => return Err(self.fail(e).await),
            };
            if let Err(e) = response.validate(command) {
                return Err(self.fail(e).await);
            }

            match response.variant {
                ResponseVariant::None => {
                    tracing::debug!(session = %self.id, command = %command, "Skipping empty response");
                }
                ResponseVariant::Data => {
                    let Some(payload) = response.frame else {
                        continue;
                    };
                    let frame = match Frame::from_payload(payload) {
                        Ok(frame) => self.adapter.adapt(frame),
                        Err(e) => return Err(self.fail(e).await),
                    };
                    if let Err(e) = self.value.push(frame) {
                        return Err(self.fail(e).await);
                    }
                }
                ResponseVariant::Ack => {
                    if let Some(err) = &response.error {
                        tracing::debug!(
                            session = %self.id,
                            command = %command,
                            kind = %err.kind,
                            error = %err.message,
                            "Command failed remotely"
                        );
                    }
                    self.last_error = response.error;
                    tracing::trace!(
                        session = %self.id,
                        command = %command,
                        ack = response.ack,
                        samples = self.value.sample_count(),
                        "Command acknowledged"
                    );
                    return Ok(response.ack);
                }
            }
        }
    }

    async fn send_request(&mut self, request: IteratorRequest) -> FramerResult<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.send(request).await,
            None => Err(FramerError::Closed),
        }
    }

    async fn receive_response(&mut self) -> FramerResult<Option<IteratorResponse>> {
        match self.stream.as_mut() {
            Some(stream) => stream.receive().await,
            None => Err(FramerError::Closed),
        }
    }

    async fn fail(&mut self, err: FramerError) -> FramerError {
        tracing::warn!(session = %self.id, error = %err, "Iterator failed, closing");
        self.close().await;
        err
    }

    /// Close the stream. Idempotent and best-effort: transport failures
    /// while closing are logged, not returned.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close_and_ack().await {
                tracing::debug!(session = %self.id, error = %e, "Error while closing stream");
            }
        }
        tracing::debug!(session = %self.id, "Iterator closed");
    }

    /// Frame accumulated by the last command
    pub fn value(&self) -> &Frame {
        &self.value
    }

    /// Move the accumulated frame out, leaving an empty one
    pub fn take_value(&mut self) -> Frame {
        std::mem::take(&mut self.value)
    }

    /// Error carried by the last ack, if any
    pub fn last_error(&self) -> Option<&ErrorPayload> {
        self.last_error.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    /// Lazy sequence of frames advancing by `span`
    pub fn into_sequence(self, span: TimeSpan) -> FrameSequence {
        FrameSequence::new(self, span)
    }
}

/// An iterator dropped while open closes its stream on a background task.
/// Outside a runtime the stream is simply dropped.
impl Drop for FrameIterator {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(session = %id, "Iterator dropped without close, closing in background");
                handle.spawn(async move {
                    if let Err(e) = stream.close_and_ack().await {
                        tracing::debug!(session = %id, error = %e, "Error while closing stream");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(session = %id, "Iterator dropped without close outside a runtime");
            }
        }
    }
}
