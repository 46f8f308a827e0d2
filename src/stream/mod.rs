//! Pull-based data-point streams and their composable transformers.
//!
//! Every stage of a subscription pipeline exposes the same capability:
//! [`DataPointStream`]. `move_next` returns `false` only when the stream is
//! permanently exhausted; `true` with an empty `current` means *no data
//! right now*, and the caller re-polls on its own schedule. This single
//! convention lets push-fed queues, historical replays, and live
//! transformers compose in any order without blocking the consumer.

mod aggregate;
mod concat;
mod fill_forward;
mod filter;
mod frontier;
mod hours_filter;
mod scale;
mod sync;

pub use aggregate::CollectionAggregator;
pub use concat::Concat;
pub use fill_forward::FillForward;
pub use filter::PredicateFilter;
pub use frontier::FrontierGate;
pub use hours_filter::MarketHoursFilter;
pub use scale::PriceScaleAdjuster;
pub use sync::SynchronizedMerge;

use crate::data::DataPoint;
use crate::error::FeedError;

/// Uniform pull capability over a stream of data points.
pub trait DataPointStream: Send {
    /// Advance the stream. Returns `false` only when permanently exhausted;
    /// `true` with no `current` means no data is available right now.
    fn move_next(&mut self) -> bool;

    /// The point produced by the last `move_next`, if any.
    fn current(&self) -> Option<&DataPoint>;

    /// One-shot producer error stashed in the source, if any.
    ///
    /// A failed producer stops its queue and records the error; the owning
    /// subscription retrieves it through this hook once the stream goes
    /// quiet and logs it. Transformers forward the query upstream; sources
    /// that cannot fail keep the default.
    fn take_error(&mut self) -> Option<FeedError> {
        None
    }
}

impl DataPointStream for Box<dyn DataPointStream> {
    fn move_next(&mut self) -> bool {
        (**self).move_next()
    }

    fn current(&self) -> Option<&DataPoint> {
        (**self).current()
    }

    fn take_error(&mut self) -> Option<FeedError> {
        (**self).take_error()
    }
}

/// A stream that is exhausted from the start.
///
/// Stands in for the live branch of an expired symbol.
#[derive(Debug, Default)]
pub struct EmptyStream;

impl DataPointStream for EmptyStream {
    fn move_next(&mut self) -> bool {
        false
    }

    fn current(&self) -> Option<&DataPoint> {
        None
    }
}

/// Finite stream over an in-memory, time-ordered vector of points.
///
/// Used for history-provider warmup slices and in tests.
#[derive(Debug)]
pub struct VecStream {
    points: std::vec::IntoIter<DataPoint>,
    current: Option<DataPoint>,
}

impl VecStream {
    pub fn new(points: Vec<DataPoint>) -> Self {
        Self {
            points: points.into_iter(),
            current: None,
        }
    }
}

impl DataPointStream for VecStream {
    fn move_next(&mut self) -> bool {
        self.current = self.points.next();
        self.current.is_some()
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }
}

/// Drain a stream to a vector, treating the first "no data right now" tick
/// as the end. Test helper for finite pipelines.
#[cfg(test)]
pub(crate) fn drain(stream: &mut dyn DataPointStream) -> Vec<DataPoint> {
    let mut out = Vec::new();
    while stream.move_next() {
        match stream.current() {
            Some(point) => out.push(point.clone()),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataValue, Symbol};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_stream() {
        let mut stream = EmptyStream;
        assert!(!stream.move_next());
        assert!(stream.current().is_none());
        assert!(!stream.move_next());
    }

    #[test]
    fn test_take_error_threads_through_wrappers() {
        use crate::queue::BoundedDataQueue;
        use crate::time::ManualTimeProvider;
        use chrono::TimeZone;
        use std::sync::Arc;

        let (producer, queue) = BoundedDataQueue::new(4, None);
        producer.fail(crate::error::FeedError::Producer {
            symbol: Symbol::equity("SPY"),
            reason: "socket closed".to_string(),
        });

        let frontier = Arc::new(ManualTimeProvider::new(
            chrono::Utc.with_ymd_and_hms(2020, 8, 31, 16, 0, 0).unwrap(),
        ));
        let mut gate = FrontierGate::new(Box::new(queue), frontier, chrono_tz::UTC);

        assert!(!gate.move_next());
        assert!(gate.take_error().is_some(), "error surfaces through the wrapper");
        assert!(gate.take_error().is_none(), "error record is one-shot");
    }

    #[test]
    fn test_vec_stream_in_order() {
        let time = NaiveDate::from_ymd_opt(2020, 8, 31)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let points = vec![
            DataPoint::instantaneous(
                Symbol::equity("A"),
                time,
                DataValue::Tick {
                    price: dec!(1),
                    quantity: dec!(1),
                },
            ),
            DataPoint::instantaneous(
                Symbol::equity("B"),
                time,
                DataValue::Tick {
                    price: dec!(2),
                    quantity: dec!(1),
                },
            ),
        ];
        let mut stream = VecStream::new(points.clone());
        assert_eq!(drain(&mut stream), points);
        assert!(!stream.move_next());
    }
}
