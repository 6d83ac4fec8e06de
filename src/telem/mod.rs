//! Telemetry primitives
//!
//! - **types**: `TimeStamp`, `TimeSpan`, `TimeRange`, `DataType`
//! - **series**: `Series` (one typed, time-ranged sample buffer) and `MultiSeries`

pub mod series;
pub mod types;

pub use series::{MultiSeries, Sample, Series};
pub use types::{DataType, TimeRange, TimeSpan, TimeStamp};
