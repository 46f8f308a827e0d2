//! Consumed provider interfaces.
//!
//! Everything the feed core depends on but does not implement: symbol map
//! files, price-adjustment factor files, the history provider, the channel
//! provider deciding push vs. poll per configuration, raw byte sources, and
//! the algorithm facade. Broker- and vendor-specific implementations live
//! outside this crate.

use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::data::{DataPoint, Resolution, SubscriptionConfig, Symbol};
use crate::error::FeedResult;
use crate::exchange::CustomDataSource;
use crate::stream::DataPointStream;

/// Symbol map file: delisting date and historical ticker renames.
#[derive(Debug, Clone, Default)]
pub struct MapFile {
    /// Date the symbol stopped trading, if it has
    pub delisting_date: Option<NaiveDate>,
    /// Ticker renames as (effective_date, ticker), oldest first
    pub renames: Vec<(NaiveDate, String)>,
}

impl MapFile {
    /// A map file for a symbol delisted on `date`
    pub fn delisted(date: NaiveDate) -> Self {
        Self {
            delisting_date: Some(date),
            renames: Vec::new(),
        }
    }

    /// True when the symbol was delisted strictly before `date`
    pub fn is_delisted_before(&self, date: NaiveDate) -> bool {
        self.delisting_date.map(|d| d < date).unwrap_or(false)
    }

    /// Ticker in effect on `date`
    pub fn ticker_on(&self, date: NaiveDate) -> Option<&str> {
        self.renames
            .iter()
            .rev()
            .find(|(effective, _)| *effective <= date)
            .map(|(_, ticker)| ticker.as_str())
    }
}

/// Resolves map files per configuration
pub trait MapFileProvider: Send + Sync {
    fn resolve(&self, config: &SubscriptionConfig) -> Option<MapFile>;
}

/// Price-adjustment factor file.
///
/// Rows are (date, factor) pairs sorted ascending; the factor of a row
/// applies to data dated at or before its date. Past the last row the
/// factor is 1 (unadjusted).
#[derive(Debug, Clone, Default)]
pub struct FactorFile {
    rows: Vec<(NaiveDate, Decimal)>,
}

impl FactorFile {
    pub fn new(mut rows: Vec<(NaiveDate, Decimal)>) -> Self {
        rows.sort_by_key(|(date, _)| *date);
        Self { rows }
    }

    /// Identity factor file (no adjustments)
    pub fn identity() -> Self {
        Self::default()
    }

    /// Price factor in effect at `time`
    pub fn factor_at(&self, time: NaiveDateTime) -> Decimal {
        let date = time.date();
        match self.rows.iter().find(|(row_date, _)| date <= *row_date) {
            Some((_, factor)) => *factor,
            None => Decimal::ONE,
        }
    }
}

/// Resolves factor files per configuration
pub trait FactorFileProvider: Send + Sync {
    fn resolve(&self, config: &SubscriptionConfig) -> Option<Arc<FactorFile>>;
}

/// One request against the history provider
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub resolution: Resolution,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// Time zone the returned points' timestamps are expressed in
    pub data_time_zone: Tz,
}

impl HistoryRequest {
    pub fn new(
        symbol: Symbol,
        resolution: Resolution,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
        data_time_zone: Tz,
    ) -> Self {
        Self {
            symbol,
            resolution,
            start_utc,
            end_utc,
            data_time_zone,
        }
    }
}

/// Historical data provider (consumed)
pub trait HistoryProvider: Send + Sync {
    /// Time-ordered points for the requested ranges. Point timestamps use
    /// each request's data time zone; `algo_time_zone` aligns slice
    /// boundaries for the algorithm's clock.
    fn get_history(
        &self,
        requests: &[HistoryRequest],
        algo_time_zone: Tz,
    ) -> FeedResult<Vec<DataPoint>>;
}

/// Raw byte source for file-based data (consumed).
///
/// Open errors surface to callers as end-of-stream plus a logged warning.
pub trait DataProvider: Send + Sync {
    fn open(&self, key: &str) -> FeedResult<Box<dyn Read + Send>>;
}

/// Decides, per configuration, whether the symbol is streamed by the queue
/// handler or polled through the custom-data exchange.
pub trait ChannelProvider: Send + Sync {
    fn should_stream(&self, config: &SubscriptionConfig) -> bool;
}

/// The algorithm facade the feed consults during assembly
pub trait Algorithm: Send + Sync {
    /// True while historical warmup is still replaying
    fn is_warming_up(&self) -> bool;

    /// History provider used for warmup, when available
    fn history_provider(&self) -> Option<Arc<dyn HistoryProvider>>;

    /// The algorithm's time zone
    fn time_zone(&self) -> Tz;
}

/// Builds historical-feed streams for file-based warmup.
///
/// The live factory invokes this recursively with the live configuration
/// over `[start_utc, now_utc]`.
pub trait HistoricalFeedFactory: Send + Sync {
    fn create(
        &self,
        config: &SubscriptionConfig,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> FeedResult<Box<dyn DataPointStream>>;
}

/// Builds pollable sources for custom and universe-snapshot data.
///
/// `as_of` carries the snapshot date for daily universe files (the
/// previous trading day, not today). Implementations refresh their backing
/// file on their declared period (ten minutes for coarse snapshots).
pub trait CustomDataSourceFactory: Send + Sync {
    fn create(
        &self,
        config: &SubscriptionConfig,
        start_utc: DateTime<Utc>,
        as_of: Option<NaiveDate>,
    ) -> FeedResult<Box<dyn CustomDataSource>>;

    /// Vendor auth token, handed over once at feed initialization.
    /// Factories without authenticated sources ignore it.
    fn set_auth_token(&self, _token: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_map_file_delisting() {
        let map = MapFile::delisted(date(2013, 1, 1));
        assert!(map.is_delisted_before(date(2020, 6, 1)));
        assert!(!map.is_delisted_before(date(2013, 1, 1)));
        assert!(!MapFile::default().is_delisted_before(date(2020, 6, 1)));
    }

    #[test]
    fn test_map_file_renames() {
        let map = MapFile {
            delisting_date: None,
            renames: vec![
                (date(2000, 1, 1), "FOO".to_string()),
                (date(2015, 6, 1), "FOOX".to_string()),
            ],
        };
        assert_eq!(map.ticker_on(date(2010, 1, 1)), Some("FOO"));
        assert_eq!(map.ticker_on(date(2016, 1, 1)), Some("FOOX"));
        assert_eq!(map.ticker_on(date(1999, 1, 1)), None);
    }

    #[test]
    fn test_factor_file_lookup() {
        let file = FactorFile::new(vec![
            (date(2020, 8, 30), dec!(0.25)),
            (date(2014, 6, 6), dec!(0.0357)),
        ]);

        let t = |y, m, d| date(y, m, d).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(file.factor_at(t(2014, 1, 1)), dec!(0.0357));
        assert_eq!(file.factor_at(t(2015, 1, 1)), dec!(0.25));
        assert_eq!(file.factor_at(t(2020, 8, 30)), dec!(0.25));
        assert_eq!(file.factor_at(t(2020, 8, 31)), Decimal::ONE);
    }

    #[test]
    fn test_identity_factor_file() {
        let file = FactorFile::identity();
        assert_eq!(
            file.factor_at(date(2020, 1, 1).and_hms_opt(0, 0, 0).unwrap()),
            Decimal::ONE
        );
    }
}
