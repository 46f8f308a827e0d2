//! Factor-file price scaling.

use std::sync::Arc;

use super::DataPointStream;
use crate::data::DataPoint;
use crate::error::FeedError;
use crate::providers::FactorFile;

/// Multiplies price fields by the factor-file value at each point's end
/// time. Sits **before** fill-forward so synthetic points inherit scaled
/// prices. Non-price payloads pass through untouched.
pub struct PriceScaleAdjuster {
    upstream: Box<dyn DataPointStream>,
    factor_file: Arc<FactorFile>,
    current: Option<DataPoint>,
}

impl PriceScaleAdjuster {
    pub fn new(upstream: Box<dyn DataPointStream>, factor_file: Arc<FactorFile>) -> Self {
        Self {
            upstream,
            factor_file,
            current: None,
        }
    }
}

impl DataPointStream for PriceScaleAdjuster {
    fn move_next(&mut self) -> bool {
        self.current = None;
        if !self.upstream.move_next() {
            return false;
        }
        if let Some(point) = self.upstream.current() {
            let mut point = point.clone();
            if point.value.has_prices() {
                let factor = self.factor_file.factor_at(point.end_time);
                point.value.scale_prices(factor);
            }
            self.current = Some(point);
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
