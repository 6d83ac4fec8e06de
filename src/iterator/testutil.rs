//! Scripted remote cursor served over the in-memory transport

use crate::channel::{Channel, ChannelRegistry};
use crate::framer::{Frame, FramePayload, FramerResult};
use crate::iterator::messages::{Command, IteratorRequest, IteratorResponse};
use crate::telem::{DataType, Series, TimeRange, TimeStamp};
use crate::transport::{MemoryClient, ServerStream, Stream, StreamClient};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How the fake cursor behaves
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Key-labelled frames served one per `Next`, limited to those
    /// overlapping the `Open` bounds
    pub segments: Vec<Frame>,
    /// Deliver each segment as two data responses
    pub split_data: bool,
    /// Refuse `Open` with an error ack
    pub reject_open: bool,
    /// Answer this command with an error ack
    pub error_on: Option<Command>,
    /// Drop the stream on the nth (zero-based) occurrence of a command
    pub hang_up_on: Option<(Command, usize)>,
    /// Echo the wrong command in the ack to this command
    pub bad_echo_on: Option<Command>,
}

/// Handle to a running fake cursor
pub struct FakeCursor {
    pub client: Arc<CountingClient>,
    pub requests: Arc<Mutex<Vec<IteratorRequest>>>,
}

impl FakeCursor {
    pub fn closes(&self) -> usize {
        self.client.closes.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<Command> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command)
            .collect()
    }
}

/// Wait up to a second for `closes` stream closes, for closes that happen on
/// a background task
pub async fn wait_for_closes(cursor: &FakeCursor, closes: usize) {
    for _ in 0..100 {
        if cursor.closes() >= closes {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

/// Channels "a" (key 1) and "b" (key 2)
pub fn registry() -> Arc<ChannelRegistry> {
    let mut registry = ChannelRegistry::new();
    registry.register(Channel::new("a", DataType::Float64).key(1));
    registry.register(Channel::new("b", DataType::Float64).key(2));
    Arc::new(registry)
}

pub fn secs(start: i64, end: i64) -> TimeRange {
    TimeStamp::seconds(start).range(TimeStamp::seconds(end))
}

/// A segment covering `[start, end)` seconds with one sample per second on
/// channels 1 and 2
pub fn segment(start: i64, end: i64) -> Frame {
    let values: Vec<f64> = (start..end).map(|v| v as f64).collect();
    Frame::from_keyed_arrays(
        vec![1, 2],
        vec![
            Series::from_values(&values, secs(start, end)),
            Series::from_values(&values, secs(start, end)),
        ],
    )
    .unwrap()
}

pub fn spawn_cursor(script: Script) -> FakeCursor {
    let (client, acceptor) = MemoryClient::pair();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Some((_, server)) = acceptor.accept().await {
            tokio::spawn(serve(script.clone(), server, Arc::clone(&log)));
        }
    });

    FakeCursor {
        client: Arc::new(CountingClient {
            inner: client,
            closes: Arc::new(AtomicUsize::new(0)),
        }),
        requests,
    }
}

async fn serve(script: Script, mut server: ServerStream, log: Arc<Mutex<Vec<IteratorRequest>>>) {
    let mut segments = script.segments.clone();
    let mut pos = 0usize;
    let mut errored = false;
    let mut seen: Vec<Command> = Vec::new();

    while let Some(req) = server.recv().await {
        log.lock().unwrap().push(req.clone());
        let command = req.command;
        let nth = seen.iter().filter(|c| **c == command).count();
        seen.push(command);

        if script.hang_up_on == Some((command, nth)) {
            return;
        }
        if script.bad_echo_on == Some(command) {
            let _ = server.send(IteratorResponse::ack(Command::Error, true));
            continue;
        }
        if script.error_on == Some(command) || (command == Command::Open && script.reject_open) {
            errored = true;
            let _ = server.send(IteratorResponse::error(command, "cursor", "scripted failure"));
            continue;
        }

        let n = segments.len();
        let ack = match command {
            Command::Open => {
                if let Some(bounds) = req.bounds {
                    segments.retain(|s| s.time_range().overlaps_with(&bounds));
                }
                true
            }
            Command::SeekFirst => {
                pos = 0;
                n > 0
            }
            Command::SeekLast => {
                pos = n;
                n > 0
            }
            Command::SeekGE => {
                let stamp = req.stamp.unwrap_or_default();
                pos = segments
                    .iter()
                    .position(|s| s.time_range().end > stamp)
                    .unwrap_or(n);
                pos < n
            }
            Command::SeekLE => {
                let stamp = req.stamp.unwrap_or_default();
                match segments
                    .iter()
                    .rposition(|s| s.time_range().start <= stamp)
                {
                    Some(i) => {
                        pos = i;
                        true
                    }
                    None => false,
                }
            }
            Command::Next if pos < n => {
                send_segment(&server, &script, command, &segments[pos]);
                pos += 1;
                true
            }
            Command::Prev if pos > 0 => {
                pos -= 1;
                send_segment(&server, &script, command, &segments[pos]);
                true
            }
            Command::Valid => !errored && pos <= n,
            _ => false,
        };
        let _ = server.send(IteratorResponse::ack(command, ack));
    }
}

fn send_segment(server: &ServerStream, script: &Script, command: Command, frame: &Frame) {
    let payload = frame.to_payload();
    if script.split_data && payload.keys.len() > 1 {
        let mid = payload.keys.len() / 2;
        let head = FramePayload {
            keys: payload.keys[..mid].to_vec(),
            arrays: payload.arrays[..mid].to_vec(),
        };
        let tail = FramePayload {
            keys: payload.keys[mid..].to_vec(),
            arrays: payload.arrays[mid..].to_vec(),
        };
        let _ = server.send(IteratorResponse::data(command, head));
        let _ = server.send(IteratorResponse::data(command, tail));
    } else {
        let _ = server.send(IteratorResponse::data(command, payload));
    }
}

/// Stream client that counts `close_and_ack` calls across its streams
pub struct CountingClient {
    inner: MemoryClient,
    closes: Arc<AtomicUsize>,
}

struct CountingStream {
    inner: Box<dyn Stream>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl StreamClient for CountingClient {
    async fn open(&self, path: &str) -> FramerResult<Box<dyn Stream>> {
        let inner = self.inner.open(path).await?;
        Ok(Box::new(CountingStream {
            inner,
            closes: Arc::clone(&self.closes),
        }))
    }
}

#[async_trait]
impl Stream for CountingStream {
    async fn send(&mut self, request: IteratorRequest) -> FramerResult<()> {
        self.inner.send(request).await
    }

    async fn receive(&mut self) -> FramerResult<Option<IteratorResponse>> {
        self.inner.receive().await
    }

    async fn close_and_ack(&mut self) -> FramerResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close_and_ack().await
    }
}
