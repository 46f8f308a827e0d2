//! Market hours and trading calendars.
//!
//! Schedules are defined in exchange-local time using `chrono_tz`; DST
//! transitions are handled by the timezone database. The feed consults a
//! schedule for three things: whether a bar's start is tradable (market
//! hours filter and fill-forward suppression), where the next bar boundary
//! after a gap falls, and trading-day arithmetic for warmup and universe
//! snapshots.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::local_to_utc;

/// One trading session within a day.
///
/// If `close < open` the session crosses midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSession {
    /// Days this session is active
    pub days: Vec<Weekday>,
    /// Session open (exchange-local)
    #[serde(with = "time_serde")]
    pub open: NaiveTime,
    /// Session close (exchange-local, exclusive)
    #[serde(with = "time_serde")]
    pub close: NaiveTime,
}

impl MarketSession {
    pub fn new(days: Vec<Weekday>, open: NaiveTime, close: NaiveTime) -> Self {
        Self { days, open, close }
    }

    /// Check if this session is active at the given day and time
    pub fn is_active(&self, weekday: Weekday, time: NaiveTime) -> bool {
        if !self.days.contains(&weekday) {
            return false;
        }
        if self.close < self.open {
            time >= self.open || time < self.close
        } else {
            time >= self.open && time < self.close
        }
    }
}

/// Holiday calendar with full closures and early closes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    /// Dates the market is closed all day
    #[serde(default)]
    pub holidays: HashMap<NaiveDate, String>,
    /// Dates with an early close time
    #[serde(default)]
    pub early_closes: HashMap<NaiveDate, NaiveTime>,
}

impl HolidayCalendar {
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains_key(&date)
    }

    pub fn early_close(&self, date: NaiveDate) -> Option<NaiveTime> {
        self.early_closes.get(&date).copied()
    }
}

/// Market-hours schedule for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketHours {
    /// Exchange timezone (e.g. "America/New_York")
    #[serde(with = "tz_serde")]
    pub timezone: Tz,

    /// Regular trading sessions
    #[serde(default)]
    pub regular: Vec<MarketSession>,

    /// Extended hours sessions (pre-market, after-hours)
    #[serde(default)]
    pub extended: Vec<MarketSession>,

    /// Holidays and early closes
    #[serde(default)]
    pub calendar: HolidayCalendar,
}

/// Custom serde module for chrono_tz::Tz
mod tz_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Custom serde module for NaiveTime
mod time_serde {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M:%S").map_err(serde::de::Error::custom)
    }
}

impl MarketHours {
    /// New empty schedule in the given timezone
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            regular: Vec::new(),
            extended: Vec::new(),
            calendar: HolidayCalendar::default(),
        }
    }

    /// Add a regular session
    pub fn with_regular(mut self, session: MarketSession) -> Self {
        self.regular.push(session);
        self
    }

    /// Add an extended-hours session
    pub fn with_extended(mut self, session: MarketSession) -> Self {
        self.extended.push(session);
        self
    }

    /// Add a holiday
    pub fn with_holiday(mut self, date: NaiveDate, description: impl Into<String>) -> Self {
        self.calendar.holidays.insert(date, description.into());
        self
    }

    /// Add an early close
    pub fn with_early_close(mut self, date: NaiveDate, close: NaiveTime) -> Self {
        self.calendar.early_closes.insert(date, close);
        self
    }

    /// Check if the market is open at an exchange-local instant.
    /// `extended` includes pre-market and after-hours sessions.
    pub fn is_open_local(&self, local: NaiveDateTime, extended: bool) -> bool {
        let date = local.date();
        let time = local.time();
        let weekday = date.weekday();

        if self.calendar.is_holiday(date) {
            return false;
        }
        if let Some(early) = self.calendar.early_close(date) {
            if time >= early {
                return false;
            }
        }

        if self.regular.iter().any(|s| s.is_active(weekday, time)) {
            return true;
        }
        extended && self.extended.iter().any(|s| s.is_active(weekday, time))
    }

    /// Check if the market is open at a UTC instant
    pub fn is_open_utc(&self, utc: DateTime<Utc>, extended: bool) -> bool {
        let local = utc.with_timezone(&self.timezone).naive_local();
        self.is_open_local(local, extended)
    }

    /// Check if the date has any regular session
    pub fn is_date_open(&self, date: NaiveDate) -> bool {
        if self.calendar.is_holiday(date) {
            return false;
        }
        let weekday = date.weekday();
        self.regular.iter().any(|s| s.days.contains(&weekday))
    }

    /// Most recent trading day strictly before `date`, skipping weekends
    /// and holidays. Universe snapshot files are read for this day.
    pub fn previous_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut candidate = date - Duration::days(1);
        // A schedule with no open days would loop forever; bail after a year
        for _ in 0..366 {
            if self.is_date_open(candidate) {
                return candidate;
            }
            candidate -= Duration::days(1);
        }
        candidate
    }

    /// True when `[start, end)` contains at least one trading day
    pub fn has_trading_days(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let mut date = start;
        while date < end {
            if self.is_date_open(date) {
                return true;
            }
            date += Duration::days(1);
        }
        false
    }

    /// First bar start strictly after `start` that falls inside tradable
    /// hours, stepping on the bar grid defined by `increment`.
    ///
    /// Daily bars only require the date to be open; intraday bars require
    /// the bar's start instant to be inside a session.
    pub fn next_bar_start(
        &self,
        start: NaiveDateTime,
        increment: Duration,
        extended: bool,
    ) -> NaiveDateTime {
        debug_assert!(increment > Duration::zero());
        let daily = increment >= Duration::days(1);
        let mut candidate = start + increment;
        // Bounded walk: a week of minute steps covers any weekend + holiday run
        let max_steps = 366.max(Duration::days(9).num_seconds() / increment.num_seconds().max(1));
        for _ in 0..max_steps {
            let open = if daily {
                self.is_date_open(candidate.date())
            } else {
                self.is_open_local(candidate, extended)
            };
            if open {
                return candidate;
            }
            candidate += increment;
        }
        candidate
    }

    /// Convert an exchange-local naive timestamp to UTC
    pub fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        local_to_utc(local, self.timezone)
    }
}

/// Predefined schedules for common markets.
pub mod presets {
    use super::*;

    fn weekdays() -> Vec<Weekday> {
        vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]
    }

    /// NYSE/NASDAQ schedule: 9:30-16:00 regular, 4:00-9:30 pre-market,
    /// 16:00-20:00 after-hours
    pub fn us_equity() -> MarketHours {
        MarketHours::new(chrono_tz::America::New_York)
            .with_regular(MarketSession::new(
                weekdays(),
                NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            ))
            .with_extended(MarketSession::new(
                weekdays(),
                NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            ))
            .with_extended(MarketSession::new(
                weekdays(),
                NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            ))
    }

    /// 24/7 schedule (crypto, custom data)
    pub fn always_open() -> MarketHours {
        MarketHours::new(chrono_tz::UTC).with_regular(MarketSession::new(
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        ))
    }
}
