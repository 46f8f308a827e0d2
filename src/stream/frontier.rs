//! Frontier-aware gate.

use std::sync::Arc;

use chrono_tz::Tz;

use super::DataPointStream;
use crate::data::DataPoint;
use crate::error::FeedError;
use crate::time::TimeProvider;

/// Suspends emission while the upstream's head is past the shared frontier
/// clock. Never blocks: a held-back point surfaces as "no data right now"
/// until the frontier advances past its end time.
pub struct FrontierGate {
    upstream: Box<dyn DataPointStream>,
    frontier: Arc<dyn TimeProvider>,
    data_time_zone: Tz,
    pending: Option<DataPoint>,
    current: Option<DataPoint>,
    exhausted: bool,
}

impl FrontierGate {
    pub fn new(
        upstream: Box<dyn DataPointStream>,
        frontier: Arc<dyn TimeProvider>,
        data_time_zone: Tz,
    ) -> Self {
        Self {
            upstream,
            frontier,
            data_time_zone,
            pending: None,
            current: None,
            exhausted: false,
        }
    }
}

impl DataPointStream for FrontierGate {
    fn move_next(&mut self) -> bool {
        self.current = None;

        if self.pending.is_none() && !self.exhausted {
            if self.upstream.move_next() {
                self.pending = self.upstream.current().cloned();
            } else {
                self.exhausted = true;
            }
        }

        match &self.pending {
            Some(point) => {
                if point.end_time_utc(self.data_time_zone) <= self.frontier.now_utc() {
                    self.current = self.pending.take();
                }
                true
            }
            None => !self.exhausted,
        }
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn take_error(&mut self) -> Option<FeedError> {
        self.upstream.take_error()
    }
}
