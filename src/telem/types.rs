//! Core time types and data types for telemetry
//!
//! This module defines the fundamental scalar types used throughout the client:
//! - `TimeStamp`: A nanosecond-precision point in time
//! - `TimeSpan`: A signed nanosecond duration
//! - `TimeRange`: A half-open interval of time
//! - `DataType`: The sample type stored in a series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A point in time, in nanoseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeStamp(pub i64);

impl TimeStamp {
    pub const ZERO: TimeStamp = TimeStamp(0);
    pub const MIN: TimeStamp = TimeStamp(0);
    pub const MAX: TimeStamp = TimeStamp(i64::MAX);

    /// Current wall-clock time
    pub fn now() -> Self {
        Self(Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX))
    }

    /// Timestamp `n` seconds after the epoch
    pub const fn seconds(n: i64) -> Self {
        Self(n * TimeSpan::SECOND.0)
    }

    /// Timestamp `n` milliseconds after the epoch
    pub const fn millis(n: i64) -> Self {
        Self(n * TimeSpan::MILLISECOND.0)
    }

    /// Build the half-open range `[self, end)`
    pub fn range(self, end: TimeStamp) -> TimeRange {
        TimeRange::new(self, end)
    }

    /// Signed span from `self` to `other`
    pub fn span(self, other: TimeStamp) -> TimeSpan {
        TimeSpan(other.0.saturating_sub(self.0))
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(
            self.0.div_euclid(TimeSpan::SECOND.0),
            self.0.rem_euclid(TimeSpan::SECOND.0) as u32,
        )
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_nanos_opt().unwrap_or(i64::MAX))
    }
}

impl Add<TimeSpan> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, rhs: TimeSpan) -> TimeStamp {
        TimeStamp(self.0.saturating_add(rhs.0))
    }
}

impl Sub<TimeSpan> for TimeStamp {
    type Output = TimeStamp;

    fn sub(self, rhs: TimeSpan) -> TimeStamp {
        TimeStamp(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.9fZ")),
            None => write!(f, "{}ns", self.0),
        }
    }
}

/// A signed duration in nanoseconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeSpan(pub i64);

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan(0);
    pub const NANOSECOND: TimeSpan = TimeSpan(1);
    pub const MICROSECOND: TimeSpan = TimeSpan(1_000);
    pub const MILLISECOND: TimeSpan = TimeSpan(1_000_000);
    pub const SECOND: TimeSpan = TimeSpan(1_000_000_000);
    pub const MINUTE: TimeSpan = TimeSpan(60 * 1_000_000_000);
    pub const HOUR: TimeSpan = TimeSpan(3600 * 1_000_000_000);

    pub const fn seconds(n: i64) -> Self {
        Self(n * Self::SECOND.0)
    }

    pub const fn millis(n: i64) -> Self {
        Self(n * Self::MILLISECOND.0)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }
}

impl Mul<i64> for TimeSpan {
    type Output = TimeSpan;

    fn mul(self, rhs: i64) -> TimeSpan {
        TimeSpan(self.0.saturating_mul(rhs))
    }
}

impl From<std::time::Duration> for TimeSpan {
    fn from(d: std::time::Duration) -> Self {
        Self(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 % Self::SECOND.0 == 0 {
            write!(f, "{}s", self.0 / Self::SECOND.0)
        } else if self.0 % Self::MILLISECOND.0 == 0 {
            write!(f, "{}ms", self.0 / Self::MILLISECOND.0)
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

/// Time range (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive)
    pub start: TimeStamp,
    /// End timestamp (exclusive)
    pub end: TimeStamp,
}

impl TimeRange {
    pub const ZERO: TimeRange = TimeRange {
        start: TimeStamp::ZERO,
        end: TimeStamp::ZERO,
    };

    /// The widest representable range
    pub const MAX: TimeRange = TimeRange {
        start: TimeStamp::MIN,
        end: TimeStamp::MAX,
    };

    /// Create a new time range. No validation is performed; see [`TimeRange::is_valid`].
    pub const fn new(start: TimeStamp, end: TimeStamp) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// True when the range covers no time at all
    pub fn is_zero(&self) -> bool {
        self.start == self.end
    }

    /// Swap the bounds if they are reversed
    pub fn make_valid(self) -> Self {
        if self.is_valid() {
            self
        } else {
            Self::new(self.end, self.start)
        }
    }

    pub fn span(&self) -> TimeSpan {
        self.start.span(self.end)
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, stamp: TimeStamp) -> bool {
        stamp >= self.start && stamp < self.end
    }

    /// Check if `other` lies entirely inside this range
    pub fn contains_range(&self, other: &TimeRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Check if this range overlaps with another.
    ///
    /// Ranges that only touch (`a.end == b.start`) are adjacent, not overlapping.
    pub fn overlaps_with(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Get intersection with another range, if any
    pub fn intersection(&self, other: &TimeRange) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self::new(start, end))
        } else {
            None
        }
    }

    /// Smallest range covering both
    pub fn union(&self, other: &TimeRange) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Sample type of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float64,
    Float32,
    Int64,
    Int32,
    Int16,
    Int8,
    Uint64,
    Uint32,
    Uint16,
    Uint8,
    Timestamp,
    /// Newline-delimited UTF-8 strings
    String,
    /// Newline-delimited JSON documents
    Json,
}

impl DataType {
    /// Bytes per sample, or `None` for variable-length types
    pub fn density(&self) -> Option<usize> {
        match self {
            DataType::Float64 | DataType::Int64 | DataType::Uint64 | DataType::Timestamp => Some(8),
            DataType::Float32 | DataType::Int32 | DataType::Uint32 => Some(4),
            DataType::Int16 | DataType::Uint16 => Some(2),
            DataType::Int8 | DataType::Uint8 => Some(1),
            DataType::String | DataType::Json => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        self.density().is_none()
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Float64 => "float64",
            DataType::Float32 => "float32",
            DataType::Int64 => "int64",
            DataType::Int32 => "int32",
            DataType::Int16 => "int16",
            DataType::Int8 => "int8",
            DataType::Uint64 => "uint64",
            DataType::Uint32 => "uint32",
            DataType::Uint16 => "uint16",
            DataType::Uint8 => "uint8",
            DataType::Timestamp => "timestamp",
            DataType::String => "string",
            DataType::Json => "json",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: i64, end: i64) -> TimeRange {
        TimeStamp::seconds(start).range(TimeStamp::seconds(end))
    }

    #[test]
    fn test_time_range_contains() {
        let r = range(1, 2);

        assert!(!r.contains(TimeStamp(TimeStamp::seconds(1).0 - 1)));
        assert!(r.contains(TimeStamp::seconds(1)));
        assert!(!r.contains(TimeStamp::seconds(2)));
    }

    #[test]
    fn test_time_range_overlaps() {
        assert!(range(1, 3).overlaps_with(&range(2, 4)));
        assert!(range(2, 4).overlaps_with(&range(1, 3)));
        assert!(range(1, 5).overlaps_with(&range(2, 3)));
        // Adjacent, not overlapping
        assert!(!range(1, 2).overlaps_with(&range(2, 3)));
        assert!(!range(2, 3).overlaps_with(&range(1, 2)));
    }

    #[test]
    fn test_intersection_and_union() {
        assert_eq!(range(1, 4).intersection(&range(3, 6)), Some(range(3, 4)));
        assert_eq!(range(1, 2).intersection(&range(2, 3)), None);
        assert_eq!(range(1, 2).union(&range(5, 6)), range(1, 6));
    }

    #[test]
    fn test_make_valid() {
        let r = TimeRange::new(TimeStamp::seconds(5), TimeStamp::seconds(1));
        assert!(!r.is_valid());
        assert_eq!(r.make_valid(), range(1, 5));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(TimeSpan::seconds(3).to_string(), "3s");
        assert_eq!(TimeSpan::millis(5).to_string(), "5ms");
        assert_eq!(TimeSpan(7).to_string(), "7ns");
        assert_eq!(TimeSpan::seconds(-2).abs(), TimeSpan::seconds(2));
    }

    #[test]
    fn test_data_type_density() {
        assert_eq!(DataType::Float64.density(), Some(8));
        assert_eq!(DataType::Uint16.density(), Some(2));
        assert!(DataType::String.is_variable());

        let json = serde_json::to_string(&DataType::Timestamp).unwrap();
        assert_eq!(json, "\"timestamp\"");
    }
}
