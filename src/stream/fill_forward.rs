//! Fill-forward bar synthesis.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use chrono_tz::Tz;

use super::DataPointStream;
use crate::data::{local_to_utc, DataPoint};
use crate::error::FeedError;
use crate::hours::MarketHours;
use crate::time::TimeProvider;

/// Synthesizes bars during gaps by repeating the last known point.
///
/// When the upstream has no new point by the next expected bar boundary
/// (computed from the bar increment, the exchange hours, the extended-hours
/// flag, and the data time zone), a copy of the last real point is emitted
/// with the new bar's timestamps and `is_fill_forward` set. Boundaries
/// outside tradable hours are skipped, so no filler appears while the
/// market is closed (unless extended hours are on). Synthesis stops at the
/// subscription's local end time.
///
/// Sits *after* price scaling so synthetic points inherit scaled prices,
/// and *before* the market-hours filter and frontier gate.
pub struct FillForward {
    upstream: Box<dyn DataPointStream>,
    hours: Arc<MarketHours>,
    increment: Duration,
    extended_hours: bool,
    data_time_zone: Tz,
    /// Reference clock for live synthesis while the upstream is quiet
    clock: Arc<dyn TimeProvider>,
    /// No synthetic bar starts at or after this local time
    local_end_time: NaiveDateTime,
    last: Option<DataPoint>,
    buffered: Option<DataPoint>,
    upstream_done: bool,
    current: Option<DataPoint>,
}

impl FillForward {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        upstream: Box<dyn DataPointStream>,
        hours: Arc<MarketHours>,
        increment: Duration,
        extended_hours: bool,
        data_time_zone: Tz,
        clock: Arc<dyn TimeProvider>,
        local_end_time: NaiveDateTime,
    ) -> Self {
        debug_assert!(increment > Duration::zero(), "tick data cannot fill forward");
        Self {
            upstream,
            hours,
            increment,
            extended_hours,
            data_time_zone,
            clock,
            local_end_time,
            last: None,
            buffered: None,
            upstream_done: false,
            current: None,
        }
    }

    /// Data-local naive time -> exchange-local naive time
    fn to_exchange_local(&self, local: NaiveDateTime) -> NaiveDateTime {
        local_to_utc(local, self.data_time_zone)
            .with_timezone(&self.hours.timezone)
            .naive_local()
    }

    /// Exchange-local naive time -> data-local naive time
    fn to_data_local(&self, exchange_local: NaiveDateTime) -> NaiveDateTime {
        local_to_utc(exchange_local, self.hours.timezone)
            .with_timezone(&self.data_time_zone)
            .naive_local()
    }

    /// Start of the next tradable bar after the last emitted point
    fn next_expected_start(&self, last: &DataPoint) -> NaiveDateTime {
        let exchange_start = self.to_exchange_local(last.start_time);
        let next =
            self.hours
                .next_bar_start(exchange_start, self.increment, self.extended_hours);
        self.to_data_local(next)
    }

    fn emit(&mut self, point: DataPoint) -> bool {
        self.last = Some(point.clone());
        self.current = Some(point);
        true
    }
}

impl DataPointStream for FillForward {
    fn move_next(&mut self) -> bool {
        self.current = None;

        if self.buffered.is_none() && !self.upstream_done {
            if self.upstream.move_next() {
                self.buffered = self.upstream.current().cloned();
            } else {
                self.upstream_done = true;
            }
        }

        let last = match &self.last {
            Some(last) => last.clone(),
            None => {
                // Nothing to repeat yet; pass the first point through
                return match self.buffered.take() {
                    Some(point) => self.emit(point),
                    None => !self.upstream_done,
                };
            }
        };

        let next_start = self.next_expected_start(&last);
        let next_end = next_start + self.increment;

        if let Some(real) = &self.buffered {
            if real.start_time <= next_start || next_start >= self.local_end_time {
                let point = self.buffered.take().expect("buffered point present");
                return self.emit(point);
            }
            // Gap before the buffered point: synthesize the missing bar
            let synthetic = last.fill_forward_to(next_start, next_end);
            return self.emit(synthetic);
        }

        if self.upstream_done {
            return false;
        }

        // Upstream quiet: synthesize only once the boundary is knowable
        let now_local = self
            .clock
            .now_utc()
            .with_timezone(&self.data_time_zone)
            .naive_local();
        if next_end <= now_local && next_start < self.local_end_time {
            let synthetic = last.fill_forward_to(next_start, next_end);
            return self.emit(synthetic);
        }

        true
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn take_error(&mut self) -> Option<FeedError> {
        self.upstream.take_error()
    }
}
