//! Static Cache
//!
//! Per-channel coverage tracker. Holds an ordered, non-overlapping list of
//! cached series spans and answers range reads with the overlapping series
//! plus the uncovered gaps.
//!
//! Writers build a new span list and swap it in whole, so a reader always sees
//! either the list before a write or the list after it. Series are shared as
//! `Arc<Series>`: a caller holding a series returned by a read keeps it alive,
//! and garbage collection skips any span whose series is still held.

use crate::telem::{MultiSeries, Series, TimeRange};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// A cached series, the range it covers, and the last time it was read.
///
/// Coverage is tracked apart from the series' own time range: a trimmed
/// series keeps its original sample spacing, so its range can run past the
/// cut by up to one sample period.
#[derive(Debug)]
struct Span {
    series: Arc<Series>,
    coverage: TimeRange,
    /// Nanoseconds since the cache epoch
    last_read: AtomicU64,
}

impl Span {
    fn new(series: Series, last_read: u64) -> Arc<Self> {
        Arc::new(Self {
            coverage: series.time_range(),
            series: Arc::new(series),
            last_read: AtomicU64::new(last_read),
        })
    }

    fn range(&self) -> TimeRange {
        self.coverage
    }

    /// The part of this span inside `cut`, keeping only samples that fall in it
    fn trim(&self, cut: TimeRange) -> Arc<Self> {
        let series = if self.series.is_empty() {
            Series::empty(self.series.data_type(), cut).with_alignment(self.series.alignment())
        } else {
            let lo = self.series.index_of(cut.start);
            let hi = self.series.index_of(cut.end);
            self.series.slice(lo, hi)
        };
        Arc::new(Self {
            series: Arc::new(series),
            coverage: cut,
            last_read: AtomicU64::new(self.last_read()),
        })
    }

    fn last_read(&self) -> u64 {
        self.last_read.load(Ordering::Relaxed)
    }

    fn touch(&self, at: u64) {
        self.last_read.fetch_max(at, Ordering::Relaxed);
    }

    /// Whether a caller still holds the series
    fn is_held(&self) -> bool {
        Arc::strong_count(&self.series) > 1
    }
}

/// Result of a range read
#[derive(Debug, Clone, Default)]
pub struct DirtyRead {
    /// Cached series overlapping the range, in time order
    pub series: Vec<Arc<Series>>,
    /// Sub-ranges of the query with no cached coverage, in time order
    pub gaps: Vec<TimeRange>,
}

impl DirtyRead {
    /// Whether the cache covered the whole range
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.series.iter().map(|s| s.len()).sum()
    }

    /// Copy the series out, trimmed to `range`
    pub fn to_multi_series(&self, range: TimeRange) -> MultiSeries {
        self.series.iter().map(|s| s.slice_time(range)).collect()
    }
}

/// Outcome of a garbage collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcResult {
    pub purged_series: usize,
}

impl std::ops::AddAssign for GcResult {
    fn add_assign(&mut self, other: GcResult) {
        self.purged_series += other.purged_series;
    }
}

/// Gap-aware read cache for a single channel
#[derive(Debug)]
pub struct StaticCache {
    spans: RwLock<Arc<Vec<Arc<Span>>>>,
    epoch: Instant,
    closed: AtomicBool,
}

impl Default for StaticCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticCache {
    pub fn new() -> Self {
        Self {
            spans: RwLock::new(Arc::new(Vec::new())),
            epoch: Instant::now(),
            closed: AtomicBool::new(false),
        }
    }

    fn nanos_at(&self, at: Instant) -> u64 {
        u64::try_from(at.saturating_duration_since(self.epoch).as_nanos()).unwrap_or(u64::MAX)
    }

    // A poisoned lock still guards a consistent list: writers only ever
    // replace the whole Arc.
    fn read_spans(&self) -> RwLockReadGuard<'_, Arc<Vec<Arc<Span>>>> {
        self.spans.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_spans(&self) -> RwLockWriteGuard<'_, Arc<Vec<Arc<Span>>>> {
        self.spans.write().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> Arc<Vec<Arc<Span>>> {
        Arc::clone(&self.read_spans())
    }

    /// Merge every series into the span list.
    ///
    /// Existing spans fully covered by a write are evicted; spans partially
    /// covered keep only the part outside it. Zero-width series carry no
    /// coverage and are ignored.
    pub fn write(&self, series: impl Into<MultiSeries>) {
        for s in series.into() {
            self.write_one(s);
        }
    }

    fn write_one(&self, series: Series) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("Write to closed cache ignored");
            return;
        }
        let tr = series.time_range();
        if tr.start >= tr.end {
            tracing::trace!(range = %tr, "Skipping zero-width series");
            return;
        }
        let now = self.nanos_at(Instant::now());

        let mut guard = self.write_spans();
        // close() may have cleared the list since the check above
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let current = Arc::clone(&guard);
        let lo = current.partition_point(|sp| sp.range().end <= tr.start);
        let hi = current.partition_point(|sp| sp.range().start < tr.end);

        let mut next = Vec::with_capacity(current.len() + 2);
        next.extend(current[..lo].iter().cloned());
        // Only current[lo] can stick out before the write and only
        // current[hi - 1] after it.
        for sp in &current[lo..hi] {
            let r = sp.range();
            if r.start < tr.start {
                next.push(sp.trim(TimeRange::new(r.start, tr.start)));
            }
        }
        next.push(Span::new(series, now));
        for sp in &current[lo..hi] {
            let r = sp.range();
            if r.end > tr.end {
                next.push(sp.trim(TimeRange::new(tr.end, r.end)));
            }
        }
        next.extend(current[hi..].iter().cloned());

        tracing::trace!(
            range = %tr,
            replaced = hi - lo,
            spans = next.len(),
            "Merged series into cache"
        );
        *guard = Arc::new(next);
    }

    /// Series overlapping `range` and the gaps between them
    pub fn dirty_read(&self, range: TimeRange) -> DirtyRead {
        self.dirty_read_at(range, Instant::now())
    }

    /// [`dirty_read`](Self::dirty_read) with an explicit read time
    pub fn dirty_read_at(&self, range: TimeRange, now: Instant) -> DirtyRead {
        let mut out = DirtyRead::default();
        if range.start >= range.end {
            return out;
        }
        let now = self.nanos_at(now);
        let spans = self.snapshot();
        let lo = spans.partition_point(|sp| sp.range().end <= range.start);
        let hi = spans.partition_point(|sp| sp.range().start < range.end);

        let mut cursor = range.start;
        for sp in &spans[lo..hi] {
            sp.touch(now);
            let r = sp.range();
            if r.start > cursor {
                out.gaps.push(TimeRange::new(cursor, r.start));
            }
            out.series.push(Arc::clone(&sp.series));
            cursor = cursor.max(r.end);
        }
        if cursor < range.end {
            out.gaps.push(TimeRange::new(cursor, range.end));
        }
        out
    }

    /// Purge spans nobody holds that have not been read for `threshold`
    pub fn gc(&self, threshold: Duration) -> GcResult {
        self.gc_at(Instant::now(), threshold)
    }

    /// [`gc`](Self::gc) as of `now`
    pub fn gc_at(&self, now: Instant, threshold: Duration) -> GcResult {
        let now = self.nanos_at(now);
        let threshold = u64::try_from(threshold.as_nanos()).unwrap_or(u64::MAX);

        let mut guard = self.write_spans();
        let mut purged = 0;
        let kept: Vec<Arc<Span>> = guard
            .iter()
            .filter(|sp| {
                let stale = now.saturating_sub(sp.last_read()) >= threshold;
                if stale && !sp.is_held() {
                    purged += 1;
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();
        if purged > 0 {
            *guard = Arc::new(kept);
        }
        GcResult {
            purged_series: purged,
        }
    }

    /// Drop every span regardless of holders. Later writes are ignored.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        *self.write_spans() = Arc::new(Vec::new());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of cached spans
    pub fn len(&self) -> usize {
        self.read_spans().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time ranges of the cached spans, in order
    pub fn span_ranges(&self) -> Vec<TimeRange> {
        self.snapshot().iter().map(|sp| sp.range()).collect()
    }

    pub fn sample_count(&self) -> usize {
        self.snapshot().iter().map(|sp| sp.series.len()).sum()
    }

    pub fn byte_count(&self) -> usize {
        self.snapshot().iter().map(|sp| sp.series.byte_len()).sum()
    }
}
