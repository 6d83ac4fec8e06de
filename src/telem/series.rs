//! Series and MultiSeries
//!
//! A `Series` is one contiguous, typed, time-ranged buffer of samples for a
//! single channel. Samples are treated as evenly spaced across the series'
//! time range, which is what lets the cache trim a series to a sub-range
//! without per-sample timestamps.
//!
//! Series are immutable once built. Shared ownership is expressed with
//! `Arc<Series>`: acquiring a series is `Arc::clone`, releasing it is a drop.

use crate::framer::{FramerError, FramerResult};
use crate::telem::types::{DataType, TimeRange, TimeStamp};
use serde::Serialize;

/// Numeric sample types that can be packed into a series buffer
pub trait Sample: Copy {
    const DATA_TYPE: DataType;

    fn write_le(self, out: &mut Vec<u8>);

    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_sample {
    ($ty:ty, $dt:expr) => {
        impl Sample for $ty {
            const DATA_TYPE: DataType = $dt;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }
        }
    };
}

impl_sample!(f64, DataType::Float64);
impl_sample!(f32, DataType::Float32);
impl_sample!(i64, DataType::Int64);
impl_sample!(i32, DataType::Int32);
impl_sample!(i16, DataType::Int16);
impl_sample!(i8, DataType::Int8);
impl_sample!(u64, DataType::Uint64);
impl_sample!(u32, DataType::Uint32);
impl_sample!(u16, DataType::Uint16);
impl_sample!(u8, DataType::Uint8);

impl Sample for TimeStamp {
    const DATA_TYPE: DataType = DataType::Timestamp;

    fn write_le(self, out: &mut Vec<u8>) {
        self.0.write_le(out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        TimeStamp(i64::read_le(bytes))
    }
}

/// A typed, time-ranged buffer of samples.
///
/// Travels on the wire as a `SeriesPayload`, which is validated through
/// [`Series::new`] on the way in.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    data_type: DataType,
    time_range: TimeRange,
    /// Position of the first sample in the channel's sample order
    alignment: u64,
    data: Vec<u8>,
}

impl Series {
    /// Build a series from raw bytes, validating the buffer against its data type
    pub fn new(
        data_type: DataType,
        data: Vec<u8>,
        time_range: TimeRange,
        alignment: u64,
    ) -> FramerResult<Self> {
        if !time_range.is_valid() {
            return Err(FramerError::InvalidSeries(format!(
                "time range {} ends before it starts",
                time_range
            )));
        }
        match data_type.density() {
            Some(density) if data.len() % density != 0 => {
                return Err(FramerError::InvalidSeries(format!(
                    "{} bytes is not a multiple of {} density {}",
                    data.len(),
                    data_type,
                    density
                )));
            }
            None if !data.is_empty() && data.last() != Some(&b'\n') => {
                return Err(FramerError::InvalidSeries(format!(
                    "{} buffer is not newline terminated",
                    data_type
                )));
            }
            _ => {}
        }
        Ok(Self {
            data_type,
            time_range,
            alignment,
            data,
        })
    }

    /// Build a series from numeric samples
    pub fn from_values<T: Sample>(values: &[T], time_range: TimeRange) -> Self {
        let mut data = Vec::with_capacity(values.len() * std::mem::size_of::<T>());
        for v in values {
            v.write_le(&mut data);
        }
        Self {
            data_type: T::DATA_TYPE,
            time_range: time_range.make_valid(),
            alignment: 0,
            data,
        }
    }

    /// Build a string series. Embedded newlines are replaced with spaces.
    pub fn from_strings<S: AsRef<str>>(values: &[S], time_range: TimeRange) -> Self {
        let mut data = Vec::new();
        for v in values {
            data.extend(v.as_ref().replace('\n', " ").into_bytes());
            data.push(b'\n');
        }
        Self {
            data_type: DataType::String,
            time_range: time_range.make_valid(),
            alignment: 0,
            data,
        }
    }

    /// Build a JSON series, one compact document per sample
    pub fn from_json<T: Serialize>(values: &[T], time_range: TimeRange) -> FramerResult<Self> {
        let mut data = Vec::new();
        for v in values {
            data.extend(serde_json::to_vec(v)?);
            data.push(b'\n');
        }
        Ok(Self {
            data_type: DataType::Json,
            time_range: time_range.make_valid(),
            alignment: 0,
            data,
        })
    }

    /// An empty series that still claims coverage of `time_range`
    pub fn empty(data_type: DataType, time_range: TimeRange) -> Self {
        Self {
            data_type,
            time_range: time_range.make_valid(),
            alignment: 0,
            data: Vec::new(),
        }
    }

    /// Builder: set alignment
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        match self.data_type.density() {
            Some(density) => self.data.len() / density,
            None => self.data.iter().filter(|b| **b == b'\n').count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// `[alignment, alignment + len)`
    pub fn alignment_bounds(&self) -> (u64, u64) {
        (
            self.alignment,
            self.alignment.saturating_add(self.len() as u64),
        )
    }

    /// Time of the `i`th sample, assuming samples are evenly spaced over the range
    pub fn sample_time(&self, i: usize) -> TimeStamp {
        let n = self.len();
        if n == 0 {
            return self.time_range.start;
        }
        let span = self.time_range.span().0 as i128;
        let offset = span * i as i128 / n as i128;
        TimeStamp(self.time_range.start.0 + offset as i64)
    }

    /// Index of the first sample whose time is at or after `stamp`
    pub fn index_of(&self, stamp: TimeStamp) -> usize {
        let n = self.len();
        let delta = stamp.0 as i128 - self.time_range.start.0 as i128;
        if delta <= 0 || n == 0 {
            return 0;
        }
        let span = self.time_range.span().0 as i128;
        if span == 0 {
            return n;
        }
        // smallest i with floor(span * i / n) >= delta
        let numerator = delta * n as i128;
        let idx = (numerator + span - 1) / span;
        idx.min(n as i128) as usize
    }

    /// Samples `[lo, hi)`. The time range shrinks to the sample times it keeps.
    pub fn slice(&self, lo: usize, hi: usize) -> Series {
        let n = self.len();
        let hi = hi.min(n);
        let lo = lo.min(hi);
        let start = self.sample_time(lo);
        let end = if hi == n {
            self.time_range.end
        } else {
            self.sample_time(hi)
        };
        self.slice_with_range(lo, hi, TimeRange::new(start, end))
    }

    /// The part of this series inside `range`, with its time range set to the
    /// exact intersection.
    pub fn slice_time(&self, range: TimeRange) -> Series {
        let bounded = match self.time_range.intersection(&range) {
            Some(r) => r,
            None => {
                let at = range.start.clamp(self.time_range.start, self.time_range.end);
                TimeRange::new(at, at)
            }
        };
        let lo = self.index_of(bounded.start);
        let hi = self.index_of(bounded.end);
        self.slice_with_range(lo, hi, bounded)
    }

    fn slice_with_range(&self, lo: usize, hi: usize, time_range: TimeRange) -> Series {
        let (from, to) = match self.data_type.density() {
            Some(density) => (lo * density, hi * density),
            None => {
                let offsets = self.sample_offsets();
                (offsets[lo], offsets[hi])
            }
        };
        Series {
            data_type: self.data_type,
            time_range,
            alignment: self.alignment.saturating_add(lo as u64),
            data: self.data[from..to].to_vec(),
        }
    }

    /// Byte offset of each sample start, plus the buffer length as a final entry
    fn sample_offsets(&self) -> Vec<usize> {
        let mut offsets = vec![0];
        for (i, b) in self.data.iter().enumerate() {
            if *b == b'\n' {
                offsets.push(i + 1);
            }
        }
        offsets
    }

    /// Decode numeric samples
    pub fn to_vec<T: Sample>(&self) -> FramerResult<Vec<T>> {
        if T::DATA_TYPE != self.data_type {
            return Err(FramerError::DataTypeMismatch {
                expected: T::DATA_TYPE,
                actual: self.data_type,
            });
        }
        let size = std::mem::size_of::<T>();
        Ok(self.data.chunks_exact(size).map(T::read_le).collect())
    }

    /// Decode string or JSON samples as text
    pub fn to_strings(&self) -> FramerResult<Vec<String>> {
        if !self.data_type.is_variable() {
            return Err(FramerError::DataTypeMismatch {
                expected: DataType::String,
                actual: self.data_type,
            });
        }
        Ok(self
            .data
            .split(|b| *b == b'\n')
            .take(self.len())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect())
    }
}

/// An ordered collection of series for one channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiSeries {
    series: Vec<Series>,
}

impl MultiSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Total samples across all series
    pub fn len(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Union of the series time ranges, or `TimeRange::ZERO` when empty
    pub fn time_range(&self) -> TimeRange {
        let mut ranges = self.series.iter().map(Series::time_range);
        match ranges.next() {
            Some(first) => ranges.fold(first, |acc, r| acc.union(&r)),
            None => TimeRange::ZERO,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Series> {
        self.series.iter()
    }
}

impl From<Series> for MultiSeries {
    fn from(series: Series) -> Self {
        Self {
            series: vec![series],
        }
    }
}

impl From<Vec<Series>> for MultiSeries {
    fn from(series: Vec<Series>) -> Self {
        Self { series }
    }
}

impl FromIterator<Series> for MultiSeries {
    fn from_iter<I: IntoIterator<Item = Series>>(iter: I) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MultiSeries {
    type Item = Series;
    type IntoIter = std::vec::IntoIter<Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiSeries {
    type Item = &'a Series;
    type IntoIter = std::slice::Iter<'a, Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}
