//! Read adapter
//!
//! Resolves the channels an iterator was opened with to the keys sent on the
//! wire, and relabels inbound key-labelled frames with names when the caller
//! asked by name.

use crate::channel::{ChannelKey, ChannelParams, ChannelRetriever};
use crate::framer::error::{FramerError, FramerResult};
use crate::framer::frame::{Frame, Label};
use std::collections::{HashMap, HashSet};

/// Maps caller-facing channel labels to wire keys and back
#[derive(Debug, Clone)]
pub struct ReadAdapter {
    keys: Vec<ChannelKey>,
    /// Present when the caller opened by name
    names: Option<HashMap<ChannelKey, String>>,
}

impl ReadAdapter {
    /// Resolve `params` through `retriever`
    pub async fn open(
        retriever: &dyn ChannelRetriever,
        params: &ChannelParams,
    ) -> FramerResult<Self> {
        if params.is_empty() {
            return Err(FramerError::NotFound("no channels requested".to_string()));
        }
        let channels = retriever.retrieve(params).await?;
        let keys: Vec<ChannelKey> = channels.iter().map(|c| c.key).collect();
        let names = match params {
            ChannelParams::Keys(_) => None,
            ChannelParams::Names(_) => Some(
                channels
                    .into_iter()
                    .map(|c| (c.key, c.name))
                    .collect::<HashMap<_, _>>(),
            ),
        };
        tracing::debug!(keys = ?keys, by_name = names.is_some(), "Resolved channels");
        Ok(Self { keys, names })
    }

    /// Keys to send on the wire, in request order
    pub fn keys(&self) -> &[ChannelKey] {
        &self.keys
    }

    /// Adapt an inbound frame to the caller's labelling, dropping unknown keys
    pub fn adapt(&self, frame: Frame) -> Frame {
        match &self.names {
            Some(names) => frame.relabel(names),
            None => {
                let known: HashSet<ChannelKey> = self.keys.iter().copied().collect();
                frame.filter(|label| matches!(label, Label::Key(k) if known.contains(k)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelRegistry, LabeledBy};
    use crate::telem::{DataType, Series, TimeStamp};

    fn registry() -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        registry.register(Channel::new("a", DataType::Float64).key(10));
        registry.register(Channel::new("b", DataType::Float64).key(20));
        registry
    }

    fn inbound() -> Frame {
        let tr = TimeStamp::seconds(0).range(TimeStamp::seconds(1));
        Frame::from_keyed_arrays(
            vec![20, 10, 99],
            vec![
                Series::from_values(&[1.0f64], tr),
                Series::from_values(&[2.0f64], tr),
                Series::from_values(&[3.0f64], tr),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_adapt_by_name() {
        let registry = registry();
        let params = ChannelParams::from(&["b", "a"][..]);
        let adapter = ReadAdapter::open(&registry, &params).await.unwrap();

        assert_eq!(adapter.keys(), &[20, 10]);

        let frame = adapter.adapt(inbound());
        assert_eq!(frame.labeled_by(), LabeledBy::Name);
        assert_eq!(frame.series_count(), 2);
        assert_eq!(frame.get("a").series()[0].to_vec::<f64>().unwrap(), vec![2.0]);
    }

    #[tokio::test]
    async fn test_adapt_by_key() {
        let registry = registry();
        let adapter = ReadAdapter::open(&registry, &ChannelParams::from(10u32))
            .await
            .unwrap();

        let frame = adapter.adapt(inbound());
        assert_eq!(frame.labeled_by(), LabeledBy::Key);
        assert_eq!(frame.unique_keys(), vec![10]);
    }

    #[tokio::test]
    async fn test_open_unknown_channel() {
        let registry = registry();
        let err = ReadAdapter::open(&registry, &ChannelParams::from("zzz"))
            .await
            .unwrap_err();
        assert!(matches!(err, FramerError::NotFound(_)));

        let err = ReadAdapter::open(&registry, &ChannelParams::Keys(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, FramerError::NotFound(_)));
    }
}
