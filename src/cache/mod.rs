//! Cache
//!
//! Local, gap-aware cache of channel telemetry:
//! - **static_cache**: `StaticCache`, the coverage tracker for one channel
//! - `Cache`: one `StaticCache` per channel key, with a background GC task
//!
//! The cache is populated from query results and live streams only; it never
//! writes anything back.

pub mod static_cache;

pub use static_cache::{DirtyRead, GcResult, StaticCache};

use crate::channel::{ChannelKey, LabeledBy};
use crate::framer::{Frame, Label};
use crate::telem::{MultiSeries, TimeRange};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::time::interval;

/// Cache-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub channel_count: usize,
    pub span_count: usize,
    pub sample_count: usize,
    pub byte_count: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Channels: {}, Spans: {}, Samples: {}, Size: {:.2} MB",
            self.channel_count,
            self.span_count,
            self.sample_count,
            self.byte_count as f64 / (1024.0 * 1024.0)
        )
    }
}

/// Per-channel static caches
#[derive(Debug, Default)]
pub struct Cache {
    channels: RwLock<HashMap<ChannelKey, Arc<StaticCache>>>,
    closed: AtomicBool,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache for `key`, if anything was ever written to it
    pub fn channel(&self, key: ChannelKey) -> Option<Arc<StaticCache>> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
    }

    /// `None` once closed. The flag is checked again under the map lock so
    /// a channel cannot be added after `close` has emptied the map.
    fn channel_or_insert(&self, key: ChannelKey) -> Option<Arc<StaticCache>> {
        if let Some(cache) = self.channel(key) {
            return Some(cache);
        }
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        if self.is_closed() {
            return None;
        }
        Some(Arc::clone(channels.entry(key).or_default()))
    }

    fn all(&self) -> Vec<(ChannelKey, Arc<StaticCache>)> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, c)| (*k, Arc::clone(c)))
            .collect()
    }

    pub fn write(&self, key: ChannelKey, series: impl Into<MultiSeries>) {
        if self.is_closed() {
            tracing::debug!(channel = key, "Write to closed cache ignored");
            return;
        }
        match self.channel_or_insert(key) {
            Some(cache) => cache.write(series),
            None => tracing::debug!(channel = key, "Write to closed cache ignored"),
        }
    }

    /// Write every series of a key-labelled frame under its key
    pub fn write_frame(&self, frame: &Frame) {
        if frame.is_empty() {
            return;
        }
        if frame.labeled_by() != LabeledBy::Key {
            tracing::warn!(
                series = frame.series_count(),
                "Skipping name-labelled frame; the cache is keyed by channel key"
            );
            return;
        }
        for (label, series) in frame.iter() {
            if let Label::Key(key) = label {
                self.write(key, series.clone());
            }
        }
    }

    /// Read `range` of channel `key`. An unknown channel is one gap.
    pub fn dirty_read(&self, key: ChannelKey, range: TimeRange) -> DirtyRead {
        match self.channel(key) {
            Some(cache) => cache.dirty_read(range),
            None if range.start < range.end => DirtyRead {
                series: Vec::new(),
                gaps: vec![range],
            },
            None => DirtyRead::default(),
        }
    }

    pub fn gc(&self, threshold: Duration) -> GcResult {
        self.gc_at(Instant::now(), threshold)
    }

    pub fn gc_at(&self, now: Instant, threshold: Duration) -> GcResult {
        let mut result = GcResult::default();
        for (_, cache) in self.all() {
            result += cache.gc_at(now, threshold);
        }
        if result.purged_series > 0 {
            tracing::debug!(purged = result.purged_series, "Cache GC purged series");
        }
        result
    }

    /// Drop all cached data. Writes after close are ignored.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let channels =
            std::mem::take(&mut *self.channels.write().unwrap_or_else(|e| e.into_inner()));
        for cache in channels.values() {
            cache.close();
        }
        tracing::debug!(channels = channels.len(), "Cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CacheStats {
        let channels = self.all();
        CacheStats {
            channel_count: channels.len(),
            span_count: channels.iter().map(|(_, c)| c.len()).sum(),
            sample_count: channels.iter().map(|(_, c)| c.sample_count()).sum(),
            byte_count: channels.iter().map(|(_, c)| c.byte_count()).sum(),
        }
    }

    /// Start background GC task. Stops after [`close`](Self::close).
    pub fn start_background_gc(
        self: &Arc<Self>,
        gc_interval: Duration,
        threshold: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(gc_interval);

            loop {
                ticker.tick().await;

                if cache.is_closed() {
                    break;
                }

                let result = cache.gc(threshold);
                tracing::trace!(purged = result.purged_series, "Background GC pass");
            }

            tracing::debug!("Background GC stopped");
        })
    }
}
