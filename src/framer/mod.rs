//! Framer
//!
//! Frames are the unit of exchange between the iterator, the cache, and the
//! caller:
//!
//! - **frame**: `Frame`, an ordered bundle of series keyed by channel
//! - **payload**: the flat wire form of a frame and its JSON codec
//! - **adapter**: channel resolution for inbound frames
//! - **error**: error types shared by the framer, transport, and iterator

pub mod adapter;
pub mod error;
pub mod frame;
pub mod payload;

pub use adapter::ReadAdapter;
pub use error::{FramerError, FramerResult};
pub use frame::{Frame, Label, Labels};
pub use payload::{FramePayload, PayloadLabel, SeriesPayload};
