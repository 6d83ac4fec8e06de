//! Lazy frame sequence
//!
//! Wraps a [`FrameIterator`] as a pull-driven sequence: the first pull seeks
//! to the first segment, every pull then advances once. The iterator is closed
//! exactly once when the sequence ends, errors, or is closed early. Dropping
//! an unfinished sequence closes it in the background.

use crate::framer::{Frame, FramerResult};
use crate::iterator::session::FrameIterator;
use crate::telem::TimeSpan;

/// Lifecycle of a [`FrameSequence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    NotStarted,
    Open,
    /// The cursor ran out of segments
    Exhausted,
    /// Closed by the caller before exhaustion
    Closed,
    Errored,
}

impl SequenceState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SequenceState::Exhausted | SequenceState::Closed | SequenceState::Errored
        )
    }
}

pub struct FrameSequence {
    iter: FrameIterator,
    span: TimeSpan,
    state: SequenceState,
}

impl FrameSequence {
    pub fn new(iter: FrameIterator, span: TimeSpan) -> Self {
        Self {
            iter,
            span,
            state: SequenceState::NotStarted,
        }
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Next frame, or `None` once the sequence has ended.
    ///
    /// An error closes the iterator before it is returned; later pulls
    /// return `None`.
    pub async fn pull(&mut self) -> FramerResult<Option<Frame>> {
        match self.state {
            SequenceState::NotStarted => match self.iter.seek_first().await {
                Ok(true) => self.state = SequenceState::Open,
                Ok(false) => {
                    self.finish(SequenceState::Exhausted).await;
                    return Ok(None);
                }
                Err(e) => {
                    self.finish(SequenceState::Errored).await;
                    return Err(e);
                }
            },
            SequenceState::Open => {}
            _ => return Ok(None),
        }

        match self.iter.next(self.span).await {
            Ok(true) => Ok(Some(self.iter.take_value())),
            Ok(false) => {
                self.finish(SequenceState::Exhausted).await;
                Ok(None)
            }
            Err(e) => {
                self.finish(SequenceState::Errored).await;
                Err(e)
            }
        }
    }

    /// Stop early. No-op once the sequence has ended.
    pub async fn close(&mut self) {
        if !self.state.is_terminal() {
            self.finish(SequenceState::Closed).await;
        }
    }

    async fn finish(&mut self, state: SequenceState) {
        self.iter.close().await;
        self.state = state;
        tracing::debug!(session = %self.iter.session_id(), state = ?state, "Frame sequence ended");
    }

    /// Adapt into a `futures` stream of frames. The stream ends after the
    /// first error.
    pub fn into_stream(self) -> impl futures_util::Stream<Item = FramerResult<Frame>> {
        futures_util::stream::unfold(self, |mut seq| async move {
            match seq.pull().await {
                Ok(Some(frame)) => Some((Ok(frame), seq)),
                Ok(None) => None,
                Err(e) => Some((Err(e), seq)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::FramerError;
    use crate::iterator::messages::Command;
    use crate::iterator::session::{IteratorConfig, AUTO_SPAN};
    use crate::iterator::testutil::{
        registry, secs, segment, spawn_cursor, wait_for_closes, FakeCursor, Script,
    };
    use futures_util::StreamExt;

    async fn sequence(cursor: &FakeCursor) -> FrameSequence {
        let registry = registry();
        FrameIterator::open(
            cursor.client.as_ref(),
            registry.as_ref(),
            "/frame/iterate",
            IteratorConfig::new(secs(0, 10), vec![1u32, 2]),
        )
        .await
        .map_err(|e| e.to_string())
        .unwrap()
        .into_sequence(AUTO_SPAN)
    }

    #[tokio::test]
    async fn test_yields_all_then_closes_once() {
        let cursor = spawn_cursor(Script {
            segments: vec![segment(0, 2), segment(2, 5), segment(5, 6)],
            ..Default::default()
        });
        let mut seq = sequence(&cursor).await;
        assert_eq!(seq.state(), SequenceState::NotStarted);

        let mut ranges = Vec::new();
        while let Some(frame) = seq.pull().await.unwrap() {
            ranges.push(frame.time_range());
        }

        assert_eq!(ranges, vec![secs(0, 2), secs(2, 5), secs(5, 6)]);
        assert_eq!(seq.state(), SequenceState::Exhausted);
        assert_eq!(cursor.closes(), 1);

        // Not restartable
        assert!(seq.pull().await.unwrap().is_none());
        assert_eq!(cursor.closes(), 1);
        assert_eq!(
            cursor.commands(),
            vec![
                Command::Open,
                Command::SeekFirst,
                Command::Next,
                Command::Next,
                Command::Next,
                Command::Next,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_cursor() {
        let cursor = spawn_cursor(Script::default());
        let mut seq = sequence(&cursor).await;

        assert!(seq.pull().await.unwrap().is_none());
        assert_eq!(seq.state(), SequenceState::Exhausted);
        assert_eq!(cursor.closes(), 1);
        assert_eq!(cursor.commands(), vec![Command::Open, Command::SeekFirst]);
    }

    #[tokio::test]
    async fn test_error_closes_once() {
        let cursor = spawn_cursor(Script {
            segments: vec![segment(0, 2), segment(2, 4)],
            hang_up_on: Some((Command::Next, 1)),
            ..Default::default()
        });
        let mut seq = sequence(&cursor).await;

        assert!(seq.pull().await.unwrap().is_some());
        let err = seq.pull().await.unwrap_err();
        assert!(matches!(err, FramerError::Protocol(_)));
        assert_eq!(seq.state(), SequenceState::Errored);
        assert_eq!(cursor.closes(), 1);

        assert!(seq.pull().await.unwrap().is_none());
        assert_eq!(cursor.closes(), 1);
    }

    #[tokio::test]
    async fn test_early_close() {
        let cursor = spawn_cursor(Script {
            segments: vec![segment(0, 2), segment(2, 4)],
            ..Default::default()
        });
        let mut seq = sequence(&cursor).await;

        assert!(seq.pull().await.unwrap().is_some());
        seq.close().await;
        seq.close().await;

        assert_eq!(seq.state(), SequenceState::Closed);
        assert_eq!(cursor.closes(), 1);
        assert!(seq.pull().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_stream_closes_cursor() {
        let cursor = spawn_cursor(Script {
            segments: vec![segment(0, 2), segment(2, 4), segment(4, 6)],
            ..Default::default()
        });
        let frames: Vec<_> = sequence(&cursor)
            .await
            .into_stream()
            .take(1)
            .collect()
            .await;
        assert_eq!(frames.len(), 1);

        wait_for_closes(&cursor, 1).await;
        assert_eq!(cursor.closes(), 1);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let cursor = spawn_cursor(Script {
            segments: vec![segment(0, 2), segment(2, 4)],
            split_data: true,
            ..Default::default()
        });
        let frames: Vec<_> = sequence(&cursor).await.into_stream().collect().await;

        assert_eq!(frames.len(), 2);
        let samples: usize = frames
            .iter()
            .map(|f| f.as_ref().map(Frame::sample_count).unwrap_or(0))
            .sum();
        assert_eq!(samples, 8);
        assert_eq!(cursor.closes(), 1);
    }
}
