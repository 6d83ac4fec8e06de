//! Frame - one logical batch of samples across one or more channels
//!
//! A frame is a pair of parallel sequences: channel labels and series. A label
//! may repeat, in which case the channel owns several series in arrival order.
//! All labels in a frame are of one kind (keys or names), which is what
//! [`Frame::labeled_by`] reports.
//!
//! Frames are built through a small set of tagged factories that all funnel
//! into the same representation:
//!
//! ```rust
//! use telem_client::framer::Frame;
//! use telem_client::telem::{Series, TimeStamp};
//!
//! let tr = TimeStamp::seconds(0).range(TimeStamp::seconds(3));
//! let frame = Frame::from_keyed_arrays(
//!     vec![1, 2],
//!     vec![
//!         Series::from_values(&[1.0f64, 2.0, 3.0], tr),
//!         Series::from_values(&[4.0f64, 5.0, 6.0], tr),
//!     ],
//! )
//! .unwrap();
//!
//! assert!(frame.is_vertical());
//! assert_eq!(frame.sample_count(), 6);
//! ```

use crate::channel::{ChannelKey, LabeledBy};
use crate::framer::error::{FramerError, FramerResult};
use crate::telem::{MultiSeries, Series, TimeRange};
use std::collections::{HashMap, HashSet};

/// A single channel label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Key(ChannelKey),
    Name(String),
}

impl Label {
    pub fn labeled_by(&self) -> LabeledBy {
        match self {
            Label::Key(_) => LabeledBy::Key,
            Label::Name(_) => LabeledBy::Name,
        }
    }
}

impl From<ChannelKey> for Label {
    fn from(key: ChannelKey) -> Self {
        Label::Key(key)
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::Name(name.to_string())
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Label::Name(name)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Key(key) => write!(f, "{}", key),
            Label::Name(name) => write!(f, "{}", name),
        }
    }
}

/// The label sequence of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Labels {
    Keys(Vec<ChannelKey>),
    Names(Vec<String>),
}

impl Labels {
    pub fn len(&self) -> usize {
        match self {
            Labels::Keys(keys) => keys.len(),
            Labels::Names(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labeled_by(&self) -> LabeledBy {
        match self {
            Labels::Keys(_) => LabeledBy::Key,
            Labels::Names(_) => LabeledBy::Name,
        }
    }

    fn get(&self, i: usize) -> Option<Label> {
        match self {
            Labels::Keys(keys) => keys.get(i).map(|k| Label::Key(*k)),
            Labels::Names(names) => names.get(i).map(|n| Label::Name(n.clone())),
        }
    }

    fn matches(&self, i: usize, label: &Label) -> bool {
        match (self, label) {
            (Labels::Keys(keys), Label::Key(key)) => keys.get(i) == Some(key),
            (Labels::Names(names), Label::Name(name)) => names.get(i) == Some(name),
            _ => false,
        }
    }

    fn empty_like(&self) -> Labels {
        match self {
            Labels::Keys(_) => Labels::Keys(Vec::new()),
            Labels::Names(_) => Labels::Names(Vec::new()),
        }
    }
}

/// An ordered bundle of series keyed by channel
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    labels: Labels,
    series: Vec<Series>,
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

impl Frame {
    /// An empty, key-labelled frame
    pub fn empty() -> Self {
        Self {
            labels: Labels::Keys(Vec::new()),
            series: Vec::new(),
        }
    }

    /// A frame holding a single series for `key`
    pub fn from_key(key: ChannelKey, series: Series) -> Self {
        Self {
            labels: Labels::Keys(vec![key]),
            series: vec![series],
        }
    }

    /// A frame holding a single series for the channel `name`
    pub fn from_name(name: impl Into<String>, series: Series) -> Self {
        Self {
            labels: Labels::Names(vec![name.into()]),
            series: vec![series],
        }
    }

    /// A frame from parallel key and series sequences
    pub fn from_keyed_arrays(keys: Vec<ChannelKey>, series: Vec<Series>) -> FramerResult<Self> {
        Self::from_labels(Labels::Keys(keys), series)
    }

    /// A frame from parallel name and series sequences
    pub fn from_named_arrays(names: Vec<String>, series: Vec<Series>) -> FramerResult<Self> {
        Self::from_labels(Labels::Names(names), series)
    }

    /// A frame from name → series entries, in iteration order
    pub fn from_map<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, S)>,
        S: IntoIterator<Item = Series>,
    {
        let mut names = Vec::new();
        let mut series = Vec::new();
        for (name, group) in entries {
            for s in group {
                names.push(name.clone());
                series.push(s);
            }
        }
        Self {
            labels: Labels::Names(names),
            series,
        }
    }

    /// Canonical constructor: validates that labels and series line up
    pub fn from_labels(labels: Labels, series: Vec<Series>) -> FramerResult<Self> {
        if labels.len() != series.len() {
            return Err(FramerError::StructuralMismatch {
                keys: labels.len(),
                arrays: series.len(),
            });
        }
        Ok(Self { labels, series })
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn into_parts(self) -> (Labels, Vec<Series>) {
        (self.labels, self.series)
    }

    pub fn labeled_by(&self) -> LabeledBy {
        self.labels.labeled_by()
    }

    /// Iterate over (label, series) pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (Label, &Series)> + '_ {
        self.series
            .iter()
            .enumerate()
            .filter_map(move |(i, s)| self.labels.get(i).map(|l| (l, s)))
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of series in the frame
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Total samples across all series
    pub fn sample_count(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    /// Distinct labels in first-appearance order
    pub fn unique_labels(&self) -> Vec<Label> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for i in 0..self.labels.len() {
            if let Some(label) = self.labels.get(i) {
                if seen.insert(label.clone()) {
                    out.push(label);
                }
            }
        }
        out
    }

    /// Distinct keys, empty for a name-labelled frame
    pub fn unique_keys(&self) -> Vec<ChannelKey> {
        self.unique_labels()
            .into_iter()
            .filter_map(|l| match l {
                Label::Key(k) => Some(k),
                Label::Name(_) => None,
            })
            .collect()
    }

    /// Every label maps to exactly one series
    pub fn is_vertical(&self) -> bool {
        self.unique_labels().len() == self.series.len()
    }

    /// Exactly one distinct label
    pub fn is_horizontal(&self) -> bool {
        self.unique_labels().len() == 1
    }

    /// Every label's series cover identical time ranges
    pub fn is_weakly_aligned(&self) -> bool {
        let mut groups: Vec<Vec<TimeRange>> = Vec::new();
        let mut index: HashMap<Label, usize> = HashMap::new();
        for (label, s) in self.iter() {
            let slot = *index.entry(label).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(s.time_range());
        }
        match groups.split_first() {
            Some((first, rest)) => rest.iter().all(|g| g == first),
            None => true,
        }
    }

    /// Union of all series time ranges, `TimeRange::ZERO` when empty
    pub fn time_range(&self) -> TimeRange {
        self.series
            .iter()
            .map(Series::time_range)
            .reduce(|acc, r| acc.union(&r))
            .unwrap_or(TimeRange::ZERO)
    }

    /// Union of the time ranges of one channel's series
    pub fn time_range_of(&self, label: impl Into<Label>) -> Option<TimeRange> {
        let label = label.into();
        self.iter()
            .filter(|(l, _)| *l == label)
            .map(|(_, s)| s.time_range())
            .reduce(|acc, r| acc.union(&r))
    }

    /// All series for one channel, in order
    pub fn get(&self, label: impl Into<Label>) -> MultiSeries {
        let label = label.into();
        self.series
            .iter()
            .enumerate()
            .filter(|(i, _)| self.labels.matches(*i, &label))
            .map(|(_, s)| s.clone())
            .collect()
    }

    /// A new frame keeping only the labels for which `predicate` holds
    pub fn filter<F>(&self, predicate: F) -> Frame
    where
        F: Fn(&Label) -> bool,
    {
        let mut out = Frame {
            labels: self.labels.empty_like(),
            series: Vec::new(),
        };
        for (label, s) in self.iter() {
            if predicate(&label) {
                out.append_unchecked(label, s.clone());
            }
        }
        out
    }

    /// Append one series under `label`
    pub fn push_series(&mut self, label: impl Into<Label>, series: Series) -> FramerResult<()> {
        let label = label.into();
        if self.is_empty() && label.labeled_by() != self.labeled_by() {
            self.labels = match label {
                Label::Key(_) => Labels::Keys(Vec::new()),
                Label::Name(_) => Labels::Names(Vec::new()),
            };
        }
        if label.labeled_by() != self.labeled_by() {
            return Err(FramerError::LabelMismatch {
                expected: self.labeled_by(),
                actual: label.labeled_by(),
            });
        }
        self.append_unchecked(label, series);
        Ok(())
    }

    /// Append every series of `other`, keeping all prior series
    pub fn push(&mut self, other: Frame) -> FramerResult<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        let expected = self.labeled_by();
        match (&mut self.labels, other.labels) {
            (Labels::Keys(a), Labels::Keys(b)) => a.extend(b),
            (Labels::Names(a), Labels::Names(b)) => a.extend(b),
            (_, labels) => {
                return Err(FramerError::LabelMismatch {
                    expected,
                    actual: labels.labeled_by(),
                })
            }
        }
        self.series.extend(other.series);
        Ok(())
    }

    /// Relabel a key-labelled frame with names, dropping keys not in `names`.
    /// Name-labelled frames are returned unchanged.
    pub fn relabel(self, names: &HashMap<ChannelKey, String>) -> Frame {
        let keys = match self.labels {
            Labels::Keys(keys) => keys,
            labels @ Labels::Names(_) => {
                return Frame {
                    labels,
                    series: self.series,
                }
            }
        };
        let mut out_names = Vec::with_capacity(keys.len());
        let mut out_series = Vec::with_capacity(keys.len());
        for (key, s) in keys.into_iter().zip(self.series) {
            if let Some(name) = names.get(&key) {
                out_names.push(name.clone());
                out_series.push(s);
            }
        }
        Frame {
            labels: Labels::Names(out_names),
            series: out_series,
        }
    }

    fn append_unchecked(&mut self, label: Label, series: Series) {
        match (&mut self.labels, label) {
            (Labels::Keys(keys), Label::Key(k)) => keys.push(k),
            (Labels::Names(names), Label::Name(n)) => names.push(n),
            _ => return,
        }
        self.series.push(series);
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Channels: {}, Series: {}, Samples: {}, Range: {}",
            self.unique_labels().len(),
            self.series_count(),
            self.sample_count(),
            self.time_range()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telem::TimeStamp;

    fn secs(start: i64, end: i64) -> TimeRange {
        TimeStamp::seconds(start).range(TimeStamp::seconds(end))
    }

    fn series(n: usize, tr: TimeRange) -> Series {
        let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        Series::from_values(&values, tr)
    }

    #[test]
    fn test_length_for_every_shape() {
        let by_key = Frame::from_key(1, series(3, secs(0, 3)));
        assert_eq!(by_key.sample_count(), 3);
        assert_eq!(by_key.labeled_by(), LabeledBy::Key);

        let by_name = Frame::from_name("a", series(2, secs(0, 2)));
        assert_eq!(by_name.sample_count(), 2);
        assert_eq!(by_name.labeled_by(), LabeledBy::Name);

        let keyed = Frame::from_keyed_arrays(
            vec![1, 2],
            vec![series(3, secs(0, 3)), series(4, secs(0, 4))],
        )
        .unwrap();
        assert_eq!(keyed.sample_count(), 7);

        let named = Frame::from_named_arrays(
            vec!["a".into(), "b".into()],
            vec![series(1, secs(0, 1)), series(5, secs(0, 5))],
        )
        .unwrap();
        assert_eq!(named.sample_count(), 6);

        let mapped = Frame::from_map(vec![
            ("a".to_string(), vec![series(2, secs(0, 2)), series(2, secs(2, 4))]),
            ("b".to_string(), vec![series(1, secs(0, 1))]),
        ]);
        assert_eq!(mapped.sample_count(), 5);
        assert_eq!(mapped.series_count(), 3);
        assert_eq!(mapped.labeled_by(), LabeledBy::Name);
    }

    #[test]
    fn test_structural_mismatch() {
        let err = Frame::from_keyed_arrays(vec![1, 2], vec![series(3, secs(0, 3))]).unwrap_err();
        assert!(matches!(
            err,
            FramerError::StructuralMismatch { keys: 2, arrays: 1 }
        ));

        let err = Frame::from_named_arrays(vec![], vec![series(1, secs(0, 1))]).unwrap_err();
        assert!(matches!(err, FramerError::StructuralMismatch { .. }));
    }

    #[test]
    fn test_vertical_and_horizontal() {
        let vertical = Frame::from_keyed_arrays(
            vec![1, 2],
            vec![series(3, secs(0, 3)), series(3, secs(0, 3))],
        )
        .unwrap();
        assert!(vertical.is_vertical());
        assert!(!vertical.is_horizontal());

        let horizontal = Frame::from_keyed_arrays(
            vec![1, 1],
            vec![series(3, secs(0, 3)), series(3, secs(3, 6))],
        )
        .unwrap();
        assert!(!horizontal.is_vertical());
        assert!(horizontal.is_horizontal());

        let single = Frame::from_key(7, series(1, secs(0, 1)));
        assert!(single.is_vertical());
        assert!(single.is_horizontal());
    }

    #[test]
    fn test_weakly_aligned() {
        let aligned = Frame::from_keyed_arrays(
            vec![1, 2, 3],
            vec![
                series(3, secs(0, 3)),
                series(3, secs(0, 3)),
                series(2, secs(0, 3)),
            ],
        )
        .unwrap();
        assert!(aligned.is_weakly_aligned());

        let shifted = Frame::from_keyed_arrays(
            vec![1, 2, 3],
            vec![
                series(3, secs(0, 3)),
                series(3, TimeStamp::seconds(0).range(TimeStamp(TimeStamp::seconds(3).0 + 1))),
                series(3, secs(0, 3)),
            ],
        )
        .unwrap();
        assert!(!shifted.is_weakly_aligned());

        assert!(Frame::empty().is_weakly_aligned());
    }

    #[test]
    fn test_time_range() {
        let frame = Frame::from_keyed_arrays(
            vec![1, 2, 1],
            vec![
                series(2, secs(2, 4)),
                series(3, secs(1, 3)),
                series(2, secs(5, 7)),
            ],
        )
        .unwrap();

        assert_eq!(frame.time_range(), secs(1, 7));
        assert_eq!(frame.time_range_of(2u32), Some(secs(1, 3)));
        assert_eq!(frame.time_range_of(1u32), Some(secs(2, 7)));
        assert_eq!(frame.time_range_of(9u32), None);
        assert_eq!(Frame::empty().time_range(), TimeRange::ZERO);
    }

    #[test]
    fn test_filter_and_get() {
        let frame = Frame::from_keyed_arrays(
            vec![1, 2, 1],
            vec![
                series(2, secs(0, 2)),
                series(3, secs(0, 3)),
                series(4, secs(2, 6)),
            ],
        )
        .unwrap();

        let only_one = frame.filter(|l| *l == Label::Key(1));
        assert_eq!(only_one.unique_keys(), vec![1]);
        assert_eq!(only_one.series_count(), 2);
        assert_eq!(frame.get(1u32).len(), 6);
        assert!(frame.get(3u32).is_empty());

        // Original is untouched
        assert_eq!(frame.series_count(), 3);
    }

    #[test]
    fn test_push_appends() {
        let mut frame = Frame::empty();
        frame
            .push(Frame::from_key(1, series(2, secs(0, 2))))
            .unwrap();
        frame
            .push(Frame::from_key(1, series(3, secs(2, 5))))
            .unwrap();
        frame.push(Frame::empty()).unwrap();

        assert_eq!(frame.series_count(), 2);
        assert_eq!(frame.get(1u32).len(), 5);

        let err = frame
            .push(Frame::from_name("a", series(1, secs(0, 1))))
            .unwrap_err();
        assert!(matches!(err, FramerError::LabelMismatch { .. }));
    }

    #[test]
    fn test_push_series() {
        let mut frame = Frame::empty();
        frame.push_series("a", series(1, secs(0, 1))).unwrap();
        assert_eq!(frame.labeled_by(), LabeledBy::Name);

        assert!(frame.push_series(3u32, series(1, secs(0, 1))).is_err());
    }

    #[test]
    fn test_relabel() {
        let frame = Frame::from_keyed_arrays(
            vec![1, 2],
            vec![series(2, secs(0, 2)), series(3, secs(0, 3))],
        )
        .unwrap();
        let names = HashMap::from([(2, "b".to_string())]);

        let relabeled = frame.relabel(&names);
        assert_eq!(relabeled.labeled_by(), LabeledBy::Name);
        assert_eq!(relabeled.unique_labels(), vec![Label::Name("b".into())]);
        assert_eq!(relabeled.sample_count(), 3);
    }
}
