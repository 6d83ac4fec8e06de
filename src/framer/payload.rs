//! Frame wire payloads
//!
//! `FramePayload` is the flat, index-aligned serialization of a frame used on
//! the wire: one label per array, each array carrying its data type, raw
//! bytes, and optional time range.

use crate::channel::{ChannelKey, LabeledBy};
use crate::framer::error::{FramerError, FramerResult};
use crate::framer::frame::{Frame, Labels};
use crate::telem::{DataType, Series, TimeRange};
use serde::{Deserialize, Serialize};

/// A channel label as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadLabel {
    Key(ChannelKey),
    Name(String),
}

/// Wire form of a single series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPayload {
    pub data_type: DataType,
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub alignment: u64,
}

/// Wire form of a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    #[serde(default)]
    pub keys: Vec<PayloadLabel>,
    #[serde(default)]
    pub arrays: Vec<SeriesPayload>,
}

impl FramePayload {
    pub fn to_json(&self) -> FramerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> FramerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<&Series> for SeriesPayload {
    fn from(series: &Series) -> Self {
        Self {
            data_type: series.data_type(),
            data: series.data().to_vec(),
            time_range: Some(series.time_range()),
            alignment: series.alignment(),
        }
    }
}

impl TryFrom<SeriesPayload> for Series {
    type Error = FramerError;

    fn try_from(payload: SeriesPayload) -> FramerResult<Series> {
        Series::new(
            payload.data_type,
            payload.data,
            payload.time_range.unwrap_or(TimeRange::ZERO),
            payload.alignment,
        )
    }
}

impl Frame {
    /// Serialize into the wire form
    pub fn to_payload(&self) -> FramePayload {
        let keys = match self.labels() {
            Labels::Keys(keys) => keys.iter().map(|k| PayloadLabel::Key(*k)).collect(),
            Labels::Names(names) => names.iter().cloned().map(PayloadLabel::Name).collect(),
        };
        FramePayload {
            keys,
            arrays: self.series().iter().map(SeriesPayload::from).collect(),
        }
    }

    /// Rebuild a frame from its wire form.
    ///
    /// Fails with `StructuralMismatch` if the label and array counts differ and
    /// with `LabelMismatch` if keys and names are mixed.
    pub fn from_payload(payload: FramePayload) -> FramerResult<Self> {
        if payload.keys.len() != payload.arrays.len() {
            return Err(FramerError::StructuralMismatch {
                keys: payload.keys.len(),
                arrays: payload.arrays.len(),
            });
        }

        let labels = match payload.keys.first() {
            None | Some(PayloadLabel::Key(_)) => {
                let mut keys = Vec::with_capacity(payload.keys.len());
                for label in payload.keys {
                    match label {
                        PayloadLabel::Key(k) => keys.push(k),
                        PayloadLabel::Name(_) => return Err(mixed_labels(Labels::Keys(keys))),
                    }
                }
                Labels::Keys(keys)
            }
            Some(PayloadLabel::Name(_)) => {
                let mut names = Vec::with_capacity(payload.keys.len());
                for label in payload.keys {
                    match label {
                        PayloadLabel::Name(n) => names.push(n),
                        PayloadLabel::Key(_) => return Err(mixed_labels(Labels::Names(names))),
                    }
                }
                Labels::Names(names)
            }
        };

        let series = payload
            .arrays
            .into_iter()
            .map(Series::try_from)
            .collect::<FramerResult<Vec<_>>>()?;

        Frame::from_labels(labels, series)
    }
}

fn mixed_labels(partial: Labels) -> FramerError {
    let expected = partial.labeled_by();
    let actual = match expected {
        LabeledBy::Key => LabeledBy::Name,
        LabeledBy::Name => LabeledBy::Key,
    };
    FramerError::LabelMismatch { expected, actual }
}
