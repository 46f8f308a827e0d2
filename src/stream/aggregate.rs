//! Aggregation of simultaneous points into one collection.

use super::DataPointStream;
use crate::data::{DataPoint, DataValue, Symbol};
use crate::error::FeedError;

/// Packages consecutive points sharing one end time into a single
/// container-of-points keyed by the universe symbol.
///
/// Universe snapshots (coarse fundamentals, custom data batches) arrive as
/// runs of points with equal end times; selection wants them as one event.
/// Polled sources deliver at most one member per exchange cycle, so a run
/// routinely spans many "no data right now" ticks. A group therefore
/// closes only when a point with a *different* end time arrives or the
/// upstream is truly exhausted (the source signalled end-of-snapshot and
/// its queue stopped); a transient quiet tick leaves the group open.
pub struct CollectionAggregator {
    upstream: Box<dyn DataPointStream>,
    universe_symbol: Symbol,
    /// Open group, all members sharing one end time
    members: Vec<DataPoint>,
    /// First point of the next group, once a differing end time arrives
    pending: Option<DataPoint>,
    current: Option<DataPoint>,
    exhausted: bool,
}

impl CollectionAggregator {
    pub fn new(upstream: Box<dyn DataPointStream>, universe_symbol: Symbol) -> Self {
        Self {
            upstream,
            universe_symbol,
            members: Vec::new(),
            pending: None,
            current: None,
            exhausted: false,
        }
    }

    fn package(&self, members: Vec<DataPoint>) -> DataPoint {
        let start_time = members
            .iter()
            .map(|p| p.start_time)
            .min()
            .expect("non-empty collection");
        let end_time = members[0].end_time;
        DataPoint::new(
            self.universe_symbol.clone(),
            start_time,
            end_time,
            DataValue::Collection(members),
        )
    }

    fn close_group(&mut self) -> bool {
        let members = std::mem::take(&mut self.members);
        self.current = Some(self.package(members));
        true
    }
}

impl DataPointStream for CollectionAggregator {
    fn move_next(&mut self) -> bool {
        self.current = None;

        if let Some(head) = self.pending.take() {
            debug_assert!(self.members.is_empty());
            self.members.push(head);
        }

        loop {
            if self.exhausted {
                if !self.members.is_empty() {
                    return self.close_group();
                }
                return false;
            }
            if !self.upstream.move_next() {
                self.exhausted = true;
                continue;
            }
            match self.upstream.current() {
                Some(point) => {
                    if self.members.is_empty() || point.end_time == self.members[0].end_time {
                        self.members.push(point.clone());
                    } else {
                        // A differing end time closes the open group
                        self.pending = Some(point.clone());
                        return self.close_group();
                    }
                }
                // No data right now: the group stays open for the next cycle
                None => return true,
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
