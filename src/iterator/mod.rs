//! Iterator
//!
//! Drives a remote cursor over historical telemetry for a fixed channel set
//! and time bound:
//!
//! - **messages**: wire requests and responses
//! - **session**: `FrameIterator`, the command state machine
//! - **sequence**: `FrameSequence`, a lazily pulled sequence of frames that
//!   closes its iterator on every terminal path

pub mod messages;
pub mod sequence;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use messages::{Command, ErrorPayload, IteratorRequest, IteratorResponse, ResponseVariant};
pub use sequence::{FrameSequence, SequenceState};
pub use session::{FrameIterator, IteratorConfig, AUTO_SPAN};
