//! # Telem Client
//!
//! Client-side engine for consuming and locally caching multi-channel,
//! time-ordered telemetry from a remote store.
//!
//! ## Features
//!
//! - **Frames**: ordered bundles of typed, time-ranged series keyed by channel
//! - **Iterators**: a command state machine driving a remote cursor over a
//!   bidirectional stream, with a lazily pulled frame sequence on top
//! - **Static cache**: per-channel, gap-aware coverage of everything fetched so
//!   far, with reference-aware garbage collection
//!
//! ## Modules
//!
//! - [`telem`]: Time types and series
//! - [`channel`]: Channel definitions and name-to-key resolution
//! - [`framer`]: Frames, wire payloads, and errors
//! - [`transport`]: In-memory and WebSocket stream transports
//! - [`iterator`]: Remote cursor protocol and frame sequences
//! - [`cache`]: Gap-aware read cache
//! - [`client`]: High-level reads through iterators and the cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use telem_client::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = ChannelRegistry::new();
//!     let key = registry.register(Channel::new("pressure", DataType::Float64));
//!
//!     let config = Config::load_default();
//!     let client = FrameClient::connect(&config, Arc::new(registry));
//!     let cache = Cache::new();
//!
//!     let range = TimeStamp::seconds(0).range(TimeStamp::seconds(60));
//!     let read = client.read_cached(&cache, key, range).await?;
//!
//!     println!("{} samples, {} gaps", read.sample_count(), read.gaps.len());
//!
//!     cache.close();
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod channel;
pub mod client;
pub mod config;
pub mod framer;
pub mod iterator;
pub mod telem;
pub mod transport;

// Re-export top-level types for convenience
pub use telem::{DataType, MultiSeries, Series, TimeRange, TimeSpan, TimeStamp};

pub use channel::{Channel, ChannelKey, ChannelParams, ChannelRegistry, ChannelRetriever, LabeledBy};

pub use framer::{Frame, FramePayload, FramerError, FramerResult, Label, Labels, ReadAdapter};

pub use iterator::{
    Command, FrameIterator, FrameSequence, IteratorConfig, IteratorRequest, IteratorResponse,
    SequenceState, AUTO_SPAN,
};

pub use cache::{Cache, CacheStats, DirtyRead, GcResult, StaticCache};

pub use client::{ClientConfig, FrameClient};

pub use transport::{MemoryClient, Stream, StreamClient, WebSocketClient};

pub use config::{CacheConfig, ClientSettings, Config, ConfigError, IteratorSettings, LoggingConfig};
