//! Channels and channel resolution
//!
//! A channel is identified on the wire by a numeric [`ChannelKey`], while
//! callers usually think in names. [`ChannelRetriever`] is the seam through
//! which names are resolved to keys; [`ChannelRegistry`] is an in-memory
//! implementation.

use crate::framer::{FramerError, FramerResult};
use crate::telem::DataType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Numeric channel identifier
pub type ChannelKey = u32;

/// Definition of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Unique key, assigned by the registry when zero
    pub key: ChannelKey,
    /// Human-readable name (e.g., "pressure_1")
    pub name: String,
    /// Sample type
    pub data_type: DataType,
    /// Key of the index channel holding this channel's timestamps
    #[serde(default)]
    pub index: ChannelKey,
    /// Whether this channel is itself an index
    #[serde(default)]
    pub is_index: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            key: 0,
            name: name.into(),
            data_type,
            index: 0,
            is_index: false,
        }
    }

    /// Builder: set key
    pub fn key(mut self, key: ChannelKey) -> Self {
        self.key = key;
        self
    }

    /// Builder: set index channel
    pub fn index(mut self, index: ChannelKey) -> Self {
        self.index = index;
        self
    }
}

/// Whether a set of channels or a frame is labelled by key or by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabeledBy {
    Key,
    Name,
}

impl std::fmt::Display for LabeledBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabeledBy::Key => write!(f, "key"),
            LabeledBy::Name => write!(f, "name"),
        }
    }
}

/// Channels to open an iterator or a read over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelParams {
    Keys(Vec<ChannelKey>),
    Names(Vec<String>),
}

impl ChannelParams {
    pub fn labeled_by(&self) -> LabeledBy {
        match self {
            ChannelParams::Keys(_) => LabeledBy::Key,
            ChannelParams::Names(_) => LabeledBy::Name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChannelParams::Keys(keys) => keys.len(),
            ChannelParams::Names(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<ChannelKey> for ChannelParams {
    fn from(key: ChannelKey) -> Self {
        ChannelParams::Keys(vec![key])
    }
}

impl From<Vec<ChannelKey>> for ChannelParams {
    fn from(keys: Vec<ChannelKey>) -> Self {
        ChannelParams::Keys(keys)
    }
}

impl From<&[ChannelKey]> for ChannelParams {
    fn from(keys: &[ChannelKey]) -> Self {
        ChannelParams::Keys(keys.to_vec())
    }
}

impl From<&str> for ChannelParams {
    fn from(name: &str) -> Self {
        ChannelParams::Names(vec![name.to_string()])
    }
}

impl From<String> for ChannelParams {
    fn from(name: String) -> Self {
        ChannelParams::Names(vec![name])
    }
}

impl From<Vec<String>> for ChannelParams {
    fn from(names: Vec<String>) -> Self {
        ChannelParams::Names(names)
    }
}

impl From<&[&str]> for ChannelParams {
    fn from(names: &[&str]) -> Self {
        ChannelParams::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Resolves channel parameters to channel definitions
#[async_trait]
pub trait ChannelRetriever: Send + Sync {
    /// Retrieve channels in the order they were requested.
    ///
    /// Fails with [`FramerError::NotFound`] if any key or name is unknown.
    async fn retrieve(&self, params: &ChannelParams) -> FramerResult<Vec<Channel>>;
}

/// In-memory registry of channel definitions
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    /// Key to position in `channels`
    by_key: HashMap<ChannelKey, usize>,
    /// Name to key lookup
    name_to_key: HashMap<String, ChannelKey>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel, returning its key.
    ///
    /// A channel with a zero key is assigned the next free key. Registering a
    /// name twice returns the existing key.
    pub fn register(&mut self, mut channel: Channel) -> ChannelKey {
        if let Some(&key) = self.name_to_key.get(&channel.name) {
            return key;
        }

        if channel.key == 0 {
            channel.key = self.by_key.keys().copied().max().unwrap_or(0) + 1;
        }
        let key = channel.key;
        self.by_key.insert(key, self.channels.len());
        self.name_to_key.insert(channel.name.clone(), key);
        self.channels.push(channel);
        key
    }

    pub fn get_by_key(&self, key: ChannelKey) -> Option<&Channel> {
        self.by_key.get(&key).and_then(|&i| self.channels.get(i))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Channel> {
        self.name_to_key
            .get(name)
            .and_then(|&key| self.get_by_key(key))
    }

    pub fn all(&self) -> &[Channel] {
        &self.channels
    }
}

#[async_trait]
impl ChannelRetriever for ChannelRegistry {
    async fn retrieve(&self, params: &ChannelParams) -> FramerResult<Vec<Channel>> {
        match params {
            ChannelParams::Keys(keys) => keys
                .iter()
                .map(|&key| {
                    self.get_by_key(key)
                        .cloned()
                        .ok_or_else(|| FramerError::NotFound(format!("channel key {}", key)))
                })
                .collect(),
            ChannelParams::Names(names) => names
                .iter()
                .map(|name| {
                    self.get_by_name(name)
                        .cloned()
                        .ok_or_else(|| FramerError::NotFound(format!("channel {}", name)))
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        registry.register(Channel::new("time", DataType::Timestamp));
        registry.register(Channel::new("pressure", DataType::Float64).index(1));
        registry.register(Channel::new("valve", DataType::Uint8).key(40));
        registry
    }

    #[test]
    fn test_register_assigns_keys() {
        let mut registry = registry();

        assert_eq!(registry.get_by_name("time").unwrap().key, 1);
        assert_eq!(registry.get_by_name("pressure").unwrap().key, 2);
        assert_eq!(registry.get_by_name("valve").unwrap().key, 40);

        // Duplicate names keep their key
        assert_eq!(
            registry.register(Channel::new("pressure", DataType::Float32)),
            2
        );
        assert_eq!(registry.register(Channel::new("temp", DataType::Float32)), 41);
        assert_eq!(registry.all().len(), 4);
    }

    #[tokio::test]
    async fn test_retrieve_in_request_order() {
        let registry = registry();

        let params = ChannelParams::from(&["valve", "time"][..]);
        let channels = registry.retrieve(&params).await.unwrap();
        let keys: Vec<_> = channels.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec![40, 1]);

        let channels = registry.retrieve(&ChannelParams::from(2u32)).await.unwrap();
        assert_eq!(channels[0].name, "pressure");
    }

    #[tokio::test]
    async fn test_retrieve_missing() {
        let registry = registry();

        let err = registry
            .retrieve(&ChannelParams::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, FramerError::NotFound(_)));

        let err = registry
            .retrieve(&ChannelParams::Keys(vec![1, 99]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not found: channel key 99");
    }

    #[test]
    fn test_params_conversions() {
        assert_eq!(ChannelParams::from(3u32).labeled_by(), LabeledBy::Key);
        assert_eq!(ChannelParams::from("a").labeled_by(), LabeledBy::Name);
        assert_eq!(ChannelParams::from(vec![1u32, 2]).len(), 2);
        assert!(ChannelParams::Names(vec![]).is_empty());
    }
}
