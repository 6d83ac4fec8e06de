//! Iterator Message Types
//!
//! Defines the request and response messages exchanged with a remote cursor.

use crate::channel::ChannelKey;
use crate::framer::{FramePayload, FramerError, FramerResult};
use crate::telem::{TimeRange, TimeSpan, TimeStamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Cursor commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Open = 0,
    Next = 1,
    Prev = 2,
    SeekFirst = 3,
    SeekLast = 4,
    SeekLE = 5,
    SeekGE = 6,
    Valid = 7,
    Error = 8,
}

impl Command {
    pub fn from_u8(value: u8) -> Option<Command> {
        Some(match value {
            0 => Command::Open,
            1 => Command::Next,
            2 => Command::Prev,
            3 => Command::SeekFirst,
            4 => Command::SeekLast,
            5 => Command::SeekLE,
            6 => Command::SeekGE,
            7 => Command::Valid,
            8 => Command::Error,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Kind of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseVariant {
    None = 0,
    Ack = 1,
    Data = 2,
}

impl ResponseVariant {
    pub fn from_u8(value: u8) -> Option<ResponseVariant> {
        match value {
            0 => Some(ResponseVariant::None),
            1 => Some(ResponseVariant::Ack),
            2 => Some(ResponseVariant::Data),
            _ => None,
        }
    }
}

// Both enums travel as their discriminant
macro_rules! impl_u8_serde {
    ($ty:ty, $what:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(*self as u8)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = u8::deserialize(deserializer)?;
                <$ty>::from_u8(value).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown {} {}", $what, value))
                })
            }
        }
    };
}

impl_u8_serde!(Command, "iterator command");
impl_u8_serde!(ResponseVariant, "response variant");

/// Request sent to the remote cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IteratorRequest {
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<TimeSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<TimeStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<ChannelKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

impl IteratorRequest {
    fn command(command: Command) -> Self {
        Self {
            command,
            span: None,
            bounds: None,
            stamp: None,
            keys: None,
            chunk_size: None,
        }
    }

    pub fn open(bounds: TimeRange, keys: Vec<ChannelKey>, chunk_size: u64) -> Self {
        Self {
            bounds: Some(bounds),
            keys: Some(keys),
            chunk_size: Some(chunk_size),
            ..Self::command(Command::Open)
        }
    }

    pub fn next(span: TimeSpan) -> Self {
        Self {
            span: Some(span),
            ..Self::command(Command::Next)
        }
    }

    pub fn prev(span: TimeSpan) -> Self {
        Self {
            span: Some(span),
            ..Self::command(Command::Prev)
        }
    }

    pub fn seek_first() -> Self {
        Self::command(Command::SeekFirst)
    }

    pub fn seek_last() -> Self {
        Self::command(Command::SeekLast)
    }

    pub fn seek_le(stamp: TimeStamp) -> Self {
        Self {
            stamp: Some(stamp),
            ..Self::command(Command::SeekLE)
        }
    }

    pub fn seek_ge(stamp: TimeStamp) -> Self {
        Self {
            stamp: Some(stamp),
            ..Self::command(Command::SeekGE)
        }
    }

    pub fn valid() -> Self {
        Self::command(Command::Valid)
    }
}

/// Error carried by a failed ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub kind: String,
    pub message: String,
}

impl From<ErrorPayload> for FramerError {
    fn from(err: ErrorPayload) -> Self {
        FramerError::Remote {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Response received from the remote cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IteratorResponse {
    pub variant: ResponseVariant,
    #[serde(default)]
    pub ack: bool,
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<FramePayload>,
}

impl IteratorResponse {
    pub fn ack(command: Command, ack: bool) -> Self {
        Self {
            variant: ResponseVariant::Ack,
            ack,
            command,
            error: None,
            frame: None,
        }
    }

    pub fn error(command: Command, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(ErrorPayload {
                kind: kind.into(),
                message: message.into(),
            }),
            ..Self::ack(command, false)
        }
    }

    pub fn data(command: Command, frame: FramePayload) -> Self {
        Self {
            variant: ResponseVariant::Data,
            ack: false,
            command,
            error: None,
            frame: Some(frame),
        }
    }

    /// Check that this response answers `sent`.
    ///
    /// Every variant must echo the in-flight command and data responses must
    /// carry a frame.
    pub fn validate(&self, sent: Command) -> FramerResult<()> {
        if self.command != sent {
            return Err(FramerError::Protocol(format!(
                "response echoes {} while {} is in flight",
                self.command, sent
            )));
        }
        if self.variant == ResponseVariant::Data && self.frame.is_none() {
            return Err(FramerError::Protocol(format!(
                "data response to {} has no frame",
                sent
            )));
        }
        Ok(())
    }
}
