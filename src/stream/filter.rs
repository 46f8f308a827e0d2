//! Predicate filtering.

use std::sync::Arc;

use super::DataPointStream;
use crate::data::DataPoint;
use crate::error::FeedError;

/// Predicate over a data point
pub type PointPredicate = Arc<dyn Fn(&DataPoint) -> bool + Send + Sync>;

/// Passes only points matching a predicate.
///
/// The warmup planner uses this to reject fill-forward and future data
/// coming out of file-based replay.
pub struct PredicateFilter {
    upstream: Box<dyn DataPointStream>,
    predicate: PointPredicate,
    current: Option<DataPoint>,
}

impl PredicateFilter {
    pub fn new(upstream: Box<dyn DataPointStream>, predicate: PointPredicate) -> Self {
        Self {
            upstream,
            predicate,
            current: None,
        }
    }
}

impl DataPointStream for PredicateFilter {
    fn move_next(&mut self) -> bool {
        self.current = None;
        loop {
            if !self.upstream.move_next() {
                return false;
            }
            match self.upstream.current() {
                None => return true,
                Some(point) if (self.predicate)(point) => {
                    self.current = Some(point.clone());
                    return true;
                }
                Some(_) => continue,
            }
        }
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn take_error(&mut self) -> Option<FeedError> {
        self.upstream.take_error()
    }
}
