//! Market-hours filtering.

use std::sync::Arc;

use chrono_tz::Tz;

use super::DataPointStream;
use crate::data::{local_to_utc, DataPoint};
use crate::error::FeedError;
use crate::hours::MarketHours;

/// Drops points whose bar start falls outside the security's tradable
/// hours. Auxiliary events (splits, dividends, delistings) always pass;
/// corporate actions matter whether or not the market is open.
pub struct MarketHoursFilter {
    upstream: Box<dyn DataPointStream>,
    hours: Arc<MarketHours>,
    extended_hours: bool,
    data_time_zone: Tz,
    current: Option<DataPoint>,
}

impl MarketHoursFilter {
    pub fn new(
        upstream: Box<dyn DataPointStream>,
        hours: Arc<MarketHours>,
        extended_hours: bool,
        data_time_zone: Tz,
    ) -> Self {
        Self {
            upstream,
            hours,
            extended_hours,
            data_time_zone,
            current: None,
        }
    }

    fn passes(&self, point: &DataPoint) -> bool {
        if point.value.is_auxiliary() {
            return true;
        }
        let utc = local_to_utc(point.start_time, self.data_time_zone);
        self.hours.is_open_utc(utc, self.extended_hours)
    }
}

impl DataPointStream for MarketHoursFilter {
    fn move_next(&mut self) -> bool {
        self.current = None;
        loop {
            if !self.upstream.move_next() {
                return false;
            }
            match self.upstream.current() {
                None => return true,
                Some(point) if self.passes(point) => {
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
