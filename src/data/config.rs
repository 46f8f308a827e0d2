//! Subscription configuration and request records.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::point::{DataPoint, Resolution, SecurityType, Symbol};
use crate::hours::MarketHours;

/// The kind of data a subscription delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    TradeBar,
    QuoteBar,
    Tick,
    Split,
    Dividend,
    Delisting,
    Universe,
    Custom,
}

impl DataKind {
    /// True for kinds whose payloads carry scalable prices
    pub fn has_prices(&self) -> bool {
        matches!(self, DataKind::TradeBar | DataKind::QuoteBar | DataKind::Tick)
    }

    /// True for corporate-action kinds
    pub fn is_auxiliary(&self) -> bool {
        matches!(self, DataKind::Split | DataKind::Dividend | DataKind::Delisting)
    }
}

/// Immutable subscription configuration.
///
/// Equality and hashing are structural over every field except the
/// market-hours schedule, which is a shared reference to the exchange's
/// schedule rather than part of the subscription's identity.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub symbol: Symbol,
    pub data_kind: DataKind,
    pub resolution: Resolution,
    pub exchange_time_zone: Tz,
    pub data_time_zone: Tz,
    /// Market-hours schedule reference (excluded from Eq/Hash)
    pub hours: Arc<MarketHours>,
    pub fill_forward: bool,
    pub extended_hours: bool,
    pub is_internal_feed: bool,
    pub is_filtered: bool,
}

impl SubscriptionConfig {
    /// New configuration with both time zones taken from the schedule
    pub fn new(
        symbol: Symbol,
        data_kind: DataKind,
        resolution: Resolution,
        hours: Arc<MarketHours>,
    ) -> Self {
        let tz = hours.timezone;
        Self {
            symbol,
            data_kind,
            resolution,
            exchange_time_zone: tz,
            data_time_zone: tz,
            hours,
            fill_forward: false,
            extended_hours: false,
            is_internal_feed: false,
            is_filtered: false,
        }
    }

    pub fn with_fill_forward(mut self, fill_forward: bool) -> Self {
        self.fill_forward = fill_forward;
        self
    }

    pub fn with_extended_hours(mut self, extended_hours: bool) -> Self {
        self.extended_hours = extended_hours;
        self
    }

    pub fn with_internal_feed(mut self, internal: bool) -> Self {
        self.is_internal_feed = internal;
        self
    }

    pub fn with_filtered(mut self, filtered: bool) -> Self {
        self.is_filtered = filtered;
        self
    }

    pub fn with_data_time_zone(mut self, tz: Tz) -> Self {
        self.data_time_zone = tz;
        self
    }

    /// Whether the pipeline applies factor-file price scaling.
    ///
    /// Internal feeds carry raw prices; only externally visible equity
    /// price streams are adjusted.
    pub fn prices_should_be_scaled(&self, live_mode: bool) -> bool {
        live_mode
            && self.symbol.security_type == SecurityType::Equity
            && self.data_kind.has_prices()
            && !self.is_internal_feed
    }

    /// Derive the split/dividend configuration that rides along an equity
    /// primary subscription.
    pub fn derive_auxiliary(&self, kind: DataKind) -> SubscriptionConfig {
        debug_assert!(kind.is_auxiliary());
        SubscriptionConfig {
            symbol: self.symbol.clone(),
            data_kind: kind,
            resolution: self.resolution,
            exchange_time_zone: self.exchange_time_zone,
            data_time_zone: self.data_time_zone,
            hours: Arc::clone(&self.hours),
            fill_forward: false,
            extended_hours: self.extended_hours,
            is_internal_feed: true,
            is_filtered: false,
        }
    }

    /// Bar period for this configuration
    pub fn increment(&self) -> Duration {
        self.resolution.increment()
    }
}

impl PartialEq for SubscriptionConfig {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.data_kind == other.data_kind
            && self.resolution == other.resolution
            && self.exchange_time_zone == other.exchange_time_zone
            && self.data_time_zone == other.data_time_zone
            && self.fill_forward == other.fill_forward
            && self.extended_hours == other.extended_hours
            && self.is_internal_feed == other.is_internal_feed
            && self.is_filtered == other.is_filtered
    }
}

impl Eq for SubscriptionConfig {}

impl Hash for SubscriptionConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.data_kind.hash(state);
        self.resolution.hash(state);
        self.exchange_time_zone.hash(state);
        self.data_time_zone.hash(state);
        self.fill_forward.hash(state);
        self.extended_hours.hash(state);
        self.is_internal_feed.hash(state);
        self.is_filtered.hash(state);
    }
}

/// Last-point cache shared with the security object
#[derive(Debug, Default)]
pub struct SecurityCache {
    last: RwLock<Option<DataPoint>>,
}

impl SecurityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the most recent point emitted to the algorithm
    pub fn store(&self, point: &DataPoint) {
        *self.last.write() = Some(point.clone());
    }

    /// Most recent point, if any
    pub fn last(&self) -> Option<DataPoint> {
        self.last.read().clone()
    }
}

/// Security handle: exchange hours plus the shared data cache
#[derive(Debug, Clone)]
pub struct SecurityHandle {
    pub hours: Arc<MarketHours>,
    pub cache: Arc<SecurityCache>,
}

impl SecurityHandle {
    pub fn new(hours: Arc<MarketHours>) -> Self {
        Self {
            hours,
            cache: Arc::new(SecurityCache::new()),
        }
    }
}

/// Universe subscription kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniverseKind {
    /// Spoofed selection-interval ticks in the configuration's data zone
    TimeTriggered { interval: Duration },
    /// Daily fundamental snapshot of the whole market
    Coarse,
    /// Daily constituents of one ETF
    EtfConstituent,
    /// Option contracts of an underlying
    OptionChain,
    /// Futures contracts of a root
    FuturesChain,
    /// Polled custom data aggregated per snapshot
    Custom,
}

/// A subscription request: configuration plus the time range and security
/// context needed to assemble its pipeline.
#[derive(Clone)]
pub struct SubscriptionRequest {
    pub config: SubscriptionConfig,
    pub security: SecurityHandle,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub universe: Option<UniverseKind>,
}

impl SubscriptionRequest {
    pub fn new(
        config: SubscriptionConfig,
        security: SecurityHandle,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            security,
            start_utc,
            end_utc,
            universe: None,
        }
    }

    pub fn universe(
        config: SubscriptionConfig,
        security: SecurityHandle,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
        kind: UniverseKind,
    ) -> Self {
        Self {
            config,
            security,
            start_utc,
            end_utc,
            universe: Some(kind),
        }
    }

    pub fn is_universe_subscription(&self) -> bool {
        self.universe.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hours::presets;
    use std::collections::hash_map::DefaultHasher;

    fn config(ticker: &str) -> SubscriptionConfig {
        SubscriptionConfig::new(
            Symbol::equity(ticker),
            DataKind::TradeBar,
            Resolution::Minute,
            Arc::new(presets::us_equity()),
        )
    }

    fn hash_of(config: &SubscriptionConfig) -> u64 {
        let mut hasher = DefaultHasher::new();
        config.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality_ignores_schedule_reference() {
        let a = config("AAPL");
        let mut b = config("AAPL");
        // Same structure, different schedule allocation
        b.hours = Arc::new(presets::us_equity().with_holiday(
            chrono::NaiveDate::from_ymd_opt(2020, 12, 25).unwrap(),
            "Christmas",
        ));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_inequality_on_flags() {
        let a = config("AAPL");
        let b = config("AAPL").with_fill_forward(true);
        assert_ne!(a, b);
    }

    #[test]
    fn test_prices_should_be_scaled() {
        let equity = config("AAPL");
        assert!(equity.prices_should_be_scaled(true));
        assert!(!equity.prices_should_be_scaled(false));
        assert!(!equity.clone().with_internal_feed(true).prices_should_be_scaled(true));

        let custom = SubscriptionConfig::new(
            Symbol::base("WEATHER"),
            DataKind::Custom,
            Resolution::Daily,
            Arc::new(presets::always_open()),
        );
        assert!(!custom.prices_should_be_scaled(true));
    }

    #[test]
    fn test_derive_auxiliary() {
        let primary = config("AAPL").with_fill_forward(true);
        let split = primary.derive_auxiliary(DataKind::Split);
        assert_eq!(split.symbol, primary.symbol);
        assert_eq!(split.data_kind, DataKind::Split);
        assert!(!split.fill_forward);
        assert!(split.is_internal_feed);
    }

    #[test]
    fn test_security_cache() {
        let cache = SecurityCache::new();
        assert!(cache.last().is_none());

        let point = DataPoint::instantaneous(
            Symbol::equity("SPY"),
            chrono::NaiveDate::from_ymd_opt(2020, 8, 31)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            crate::data::DataValue::Tick {
                price: rust_decimal::Decimal::ONE_HUNDRED,
                quantity: rust_decimal::Decimal::ONE,
            },
        );
        cache.store(&point);
        assert_eq!(cache.last().unwrap().symbol, Symbol::equity("SPY"));
    }
}
