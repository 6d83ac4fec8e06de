//! Frame client
//!
//! Ties the pieces together: opens iterators through a stream client and a
//! channel retriever, reads whole ranges, and answers reads through a
//! [`Cache`], fetching only the gaps.

use crate::cache::{Cache, DirtyRead};
use crate::channel::{ChannelKey, ChannelParams, ChannelRetriever};
use crate::config::Config;
use crate::framer::{Frame, FramerError, FramerResult};
use crate::iterator::{FrameIterator, IteratorConfig, AUTO_SPAN};
use crate::telem::{Series, TimeRange};
use crate::transport::{StreamClient, WebSocketClient};
use std::sync::Arc;

/// Client-level iterator settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub iterate_path: String,
    pub chunk_size: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            iterate_path: "/frame/iterate".to_string(),
            chunk_size: 100_000,
        }
    }
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            iterate_path: config.client.iterate_path.clone(),
            chunk_size: config.iterator.chunk_size,
        }
    }
}

pub struct FrameClient {
    streams: Arc<dyn StreamClient>,
    retriever: Arc<dyn ChannelRetriever>,
    config: ClientConfig,
}

impl FrameClient {
    pub fn new(
        streams: Arc<dyn StreamClient>,
        retriever: Arc<dyn ChannelRetriever>,
        config: ClientConfig,
    ) -> Self {
        Self {
            streams,
            retriever,
            config,
        }
    }

    /// Client speaking WebSocket to `config.client.url`
    pub fn connect(config: &Config, retriever: Arc<dyn ChannelRetriever>) -> Self {
        let streams = WebSocketClient::new(&config.client.url, config.client.connect_timeout());
        Self::new(Arc::new(streams), retriever, ClientConfig::from(config))
    }

    pub async fn open_iterator(
        &self,
        bounds: TimeRange,
        params: impl Into<ChannelParams>,
    ) -> FramerResult<FrameIterator> {
        let config = IteratorConfig::new(bounds, params).chunk_size(self.config.chunk_size);
        FrameIterator::open(
            self.streams.as_ref(),
            self.retriever.as_ref(),
            &self.config.iterate_path,
            config,
        )
        .await
    }

    /// Read everything in `range` into one frame
    pub async fn read(
        &self,
        range: TimeRange,
        params: impl Into<ChannelParams>,
    ) -> FramerResult<Frame> {
        let mut iter = self.open_iterator(range, params).await?;
        let result = drain(&mut iter).await;
        iter.close().await;
        result
    }

    /// Read `range` of channel `key` through `cache`.
    ///
    /// Each gap is first marked as known-empty, then filled with whatever the
    /// remote returns for it, so ranges without data are not fetched again.
    pub async fn read_cached(
        &self,
        cache: &Cache,
        key: ChannelKey,
        range: TimeRange,
    ) -> FramerResult<DirtyRead> {
        let first = cache.dirty_read(key, range);
        if first.is_complete() {
            return Ok(first);
        }
        let gaps = first.gaps.clone();
        drop(first);

        let params = ChannelParams::from(key);
        let channel = self
            .retriever
            .retrieve(&params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FramerError::NotFound(format!("channel key {}", key)))?;

        tracing::debug!(channel = key, gaps = gaps.len(), "Filling cache gaps");
        for gap in gaps {
            let frame = self.read(gap, params.clone()).await?;
            cache.write(key, Series::empty(channel.data_type, gap));
            cache.write_frame(&frame);
        }

        Ok(cache.dirty_read(key, range))
    }
}

async fn drain(iter: &mut FrameIterator) -> FramerResult<Frame> {
    let mut frame = Frame::empty();
    if !iter.seek_first().await? {
        return Ok(frame);
    }
    while iter.next(AUTO_SPAN).await? {
        frame.push(iter.take_value())?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::messages::Command;
    use crate::iterator::testutil::{registry, secs, segment, spawn_cursor, FakeCursor, Script};

    fn client(cursor: &FakeCursor) -> FrameClient {
        FrameClient::new(cursor.client.clone(), registry(), ClientConfig::default())
    }

    fn script() -> Script {
        Script {
            segments: vec![segment(0, 2), segment(2, 5), segment(5, 8)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_read_concatenates_range() {
        let cursor = spawn_cursor(script());
        let frame = client(&cursor).read(secs(0, 10), "a").await.unwrap();

        assert_eq!(frame.series_count(), 3);
        assert_eq!(frame.sample_count(), 8);
        assert_eq!(frame.time_range(), secs(0, 8));
        assert!(frame.is_horizontal());
        assert_eq!(cursor.closes(), 1);
    }

    #[tokio::test]
    async fn test_read_empty_range() {
        let cursor = spawn_cursor(script());
        let frame = client(&cursor)
            .read(secs(20, 30), vec![1u32, 2])
            .await
            .unwrap();

        assert!(frame.is_empty());
        assert_eq!(cursor.closes(), 1);
    }

    #[tokio::test]
    async fn test_read_error_still_closes() {
        let cursor = spawn_cursor(Script {
            hang_up_on: Some((Command::Next, 1)),
            ..script()
        });
        let err = client(&cursor).read(secs(0, 10), 1u32).await.unwrap_err();

        assert!(matches!(err, FramerError::Protocol(_)));
        assert_eq!(cursor.closes(), 1);
    }

    #[tokio::test]
    async fn test_read_cached_fetches_only_gaps() {
        let cursor = spawn_cursor(script());
        let client = client(&cursor);
        let cache = Cache::new();
        cache.write_frame(&segment(0, 2));

        let read = client.read_cached(&cache, 1, secs(0, 10)).await.unwrap();
        assert!(read.is_complete());
        assert_eq!(read.sample_count(), 8);

        // Only the gap [2s, 10s) went over the wire
        let requests = cursor.requests.lock().unwrap().clone();
        let opens: Vec<_> = requests
            .iter()
            .filter(|r| r.command == Command::Open)
            .collect();
        assert_eq!(opens.len(), 1);
        assert_eq!(opens[0].bounds, Some(secs(2, 10)));
        assert_eq!(opens[0].keys, Some(vec![1]));

        // [8s, 10s) is now known to be empty; nothing more is fetched
        let read = client.read_cached(&cache, 1, secs(0, 10)).await.unwrap();
        assert!(read.is_complete());
        assert_eq!(cursor.commands().len(), requests.len());
    }

    #[tokio::test]
    async fn test_read_cached_unknown_channel() {
        let cursor = spawn_cursor(script());
        let cache = Cache::new();

        let err = client(&cursor)
            .read_cached(&cache, 99, secs(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, FramerError::NotFound(_)));
        assert!(cursor.commands().is_empty());
    }
}
