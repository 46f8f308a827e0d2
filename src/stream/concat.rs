//! Sequential stream concatenation.

use std::collections::VecDeque;

use tracing::debug;

use super::DataPointStream;
use crate::data::DataPoint;
use crate::error::FeedError;

/// Drains stages left to right. An exhausted stage is dropped, except the
/// last, the live tail, which is kept and drives the stream from then on.
/// Once the tail is reached concat never reverts to an earlier stage.
pub struct Concat {
    stages: VecDeque<Box<dyn DataPointStream>>,
    current: Option<DataPoint>,
}

impl Concat {
    /// `stages` must be non-empty; the final element is the live tail.
    pub fn new(stages: Vec<Box<dyn DataPointStream>>) -> Self {
        debug_assert!(!stages.is_empty(), "concat needs at least one stage");
        Self {
            stages: stages.into(),
            current: None,
        }
    }

    /// True once every stage before the live tail has been drained
    pub fn on_live_tail(&self) -> bool {
        self.stages.len() <= 1
    }
}

impl DataPointStream for Concat {
    fn move_next(&mut self) -> bool {
        self.current = None;
        loop {
            let is_tail = self.stages.len() <= 1;
            let Some(stage) = self.stages.front_mut() else {
                return false;
            };
            if stage.move_next() {
                self.current = stage.current().cloned();
                return true;
            }
            if is_tail {
                return false;
            }
            // Drop the exhausted prefix stage; ownership ends here
            self.stages.pop_front();
            debug!(remaining = self.stages.len(), "warmup stage exhausted");
        }
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn take_error(&mut self) -> Option<FeedError> {
        self.stages.iter_mut().find_map(|stage| stage.take_error())
    }
}
