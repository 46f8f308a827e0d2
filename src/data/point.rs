//! Timestamped data points and their payloads.
//!
//! A [`DataPoint`] carries local timestamps in the symbol's *data time
//! zone*; UTC conversion happens in exactly one place
//! ([`DataPoint::end_time_utc`]) so frontier comparisons cannot drift.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::auxiliary::AuxiliaryEvent;

/// Security type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityType {
    Equity,
    Option,
    Future,
    Forex,
    Crypto,
    /// Custom data registered under a user-defined type
    Base,
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityType::Equity => write!(f, "EQUITY"),
            SecurityType::Option => write!(f, "OPTION"),
            SecurityType::Future => write!(f, "FUTURE"),
            SecurityType::Forex => write!(f, "FOREX"),
            SecurityType::Crypto => write!(f, "CRYPTO"),
            SecurityType::Base => write!(f, "BASE"),
        }
    }
}

/// Ticker plus security type; the identity of everything the feed routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub ticker: String,
    pub security_type: SecurityType,
}

impl Symbol {
    pub fn new(ticker: impl Into<String>, security_type: SecurityType) -> Self {
        Self {
            ticker: ticker.into(),
            security_type,
        }
    }

    pub fn equity(ticker: impl Into<String>) -> Self {
        Self::new(ticker, SecurityType::Equity)
    }

    pub fn option(ticker: impl Into<String>) -> Self {
        Self::new(ticker, SecurityType::Option)
    }

    pub fn future(ticker: impl Into<String>) -> Self {
        Self::new(ticker, SecurityType::Future)
    }

    pub fn base(ticker: impl Into<String>) -> Self {
        Self::new(ticker, SecurityType::Base)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker)
    }
}

/// Data resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// Bar period for this resolution. Tick data has no period.
    pub fn increment(&self) -> Duration {
        match self {
            Resolution::Tick => Duration::zero(),
            Resolution::Second => Duration::seconds(1),
            Resolution::Minute => Duration::minutes(1),
            Resolution::Hour => Duration::hours(1),
            Resolution::Daily => Duration::days(1),
        }
    }

    pub fn is_tick(&self) -> bool {
        matches!(self, Resolution::Tick)
    }
}

/// Point payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    /// OHLC trade bar
    TradeBar {
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    },
    /// Best bid/ask bar
    QuoteBar { bid: Decimal, ask: Decimal },
    /// Single trade or spoofed universe trigger
    Tick { price: Decimal, quantity: Decimal },
    /// Corporate action
    Auxiliary(AuxiliaryEvent),
    /// Container of points sharing one end time (universe snapshots)
    Collection(Vec<DataPoint>),
}

impl DataValue {
    /// Flat trade bar where O=H=L=C, used for snapshots and tests
    pub fn flat_bar(price: Decimal) -> Self {
        DataValue::TradeBar {
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
        }
    }

    pub fn is_auxiliary(&self) -> bool {
        matches!(self, DataValue::Auxiliary(_))
    }

    /// True when the payload carries prices a factor can scale
    pub fn has_prices(&self) -> bool {
        matches!(
            self,
            DataValue::TradeBar { .. } | DataValue::QuoteBar { .. } | DataValue::Tick { .. }
        )
    }

    /// Multiply every price field by `factor`. Non-price payloads are
    /// untouched.
    pub fn scale_prices(&mut self, factor: Decimal) {
        match self {
            DataValue::TradeBar {
                open,
                high,
                low,
                close,
                ..
            } => {
                *open *= factor;
                *high *= factor;
                *low *= factor;
                *close *= factor;
            }
            DataValue::QuoteBar { bid, ask } => {
                *bid *= factor;
                *ask *= factor;
            }
            DataValue::Tick { price, .. } => {
                *price *= factor;
            }
            DataValue::Auxiliary(_) | DataValue::Collection(_) => {}
        }
    }

    /// Most recent price of this payload, if any
    pub fn last_price(&self) -> Option<Decimal> {
        match self {
            DataValue::TradeBar { close, .. } => Some(*close),
            DataValue::QuoteBar { bid, ask } => Some((*bid + *ask) / Decimal::TWO),
            DataValue::Tick { price, .. } => Some(*price),
            DataValue::Auxiliary(_) | DataValue::Collection(_) => None,
        }
    }
}

/// A timestamped record in the symbol's data time zone.
///
/// `end_time` is the instant the point becomes knowable; the frontier gate
/// compares it (in UTC) against the shared frontier clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub symbol: Symbol,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub value: DataValue,
    pub is_fill_forward: bool,
}

impl DataPoint {
    /// New point spanning `[start_time, end_time]`. `end_time` must not
    /// precede `start_time`.
    pub fn new(
        symbol: Symbol,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        value: DataValue,
    ) -> Self {
        debug_assert!(end_time >= start_time, "end_time precedes start_time");
        Self {
            symbol,
            start_time,
            end_time,
            value,
            is_fill_forward: false,
        }
    }

    /// Instantaneous point (ticks, auxiliary events): start == end
    pub fn instantaneous(symbol: Symbol, time: NaiveDateTime, value: DataValue) -> Self {
        Self::new(symbol, time, time, value)
    }

    /// Bar starting at `start_time` with the given period
    pub fn bar(symbol: Symbol, start_time: NaiveDateTime, period: Duration, value: DataValue) -> Self {
        Self::new(symbol, start_time, start_time + period, value)
    }

    /// UTC instant at which this point becomes knowable
    pub fn end_time_utc(&self, data_time_zone: Tz) -> DateTime<Utc> {
        local_to_utc(self.end_time, data_time_zone)
    }

    /// Clone this point onto a new bar with the fill-forward flag set
    pub fn fill_forward_to(&self, start_time: NaiveDateTime, end_time: NaiveDateTime) -> Self {
        Self {
            symbol: self.symbol.clone(),
            start_time,
            end_time,
            value: self.value.clone(),
            is_fill_forward: true,
        }
    }
}

/// Resolve a naive local timestamp to UTC.
///
/// DST fold picks the earlier instant; a spring-forward gap shifts ahead to
/// the first representable local time.
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => Utc.from_utc_datetime(&local),
            }
        }
    }
}
