//! Time providers.
//!
//! The feed's shared "now" is an injected [`TimeProvider`], never a direct
//! system-clock read. One provider instance, the **frontier**, is shared
//! across every subscription: a point whose UTC end time is past the
//! frontier must not be emitted.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use parking_lot::RwLock;

/// Supplies the current UTC instant.
pub trait TimeProvider: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock provider
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Externally advanced clock, for tests and simulated frontiers.
pub struct ManualTimeProvider {
    now: RwLock<DateTime<Utc>>,
}

impl ManualTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Set the clock to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Advance the clock by a duration
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Predicate on a proposed instant
pub type TimeGate = Arc<dyn Fn(DateTime<Utc>) -> bool + Send + Sync>;

/// Wraps another provider and refuses to advance past instants the gate
/// rejects: while the predicate returns false for the wrapped value, the
/// last allowed instant is returned instead.
///
/// Used to keep universe-selection ticks out of illegal hours.
pub struct GatedTimeProvider {
    inner: Arc<dyn TimeProvider>,
    gate: TimeGate,
    last_allowed: RwLock<DateTime<Utc>>,
}

impl GatedTimeProvider {
    pub fn new(inner: Arc<dyn TimeProvider>, gate: TimeGate) -> Self {
        // Starting inside an illegal window must not leak the illegal
        // instant as the floor
        let start = inner.now_utc();
        let last_allowed = if (gate)(start) {
            start
        } else {
            DateTime::<Utc>::MIN_UTC
        };
        Self {
            inner,
            gate,
            last_allowed: RwLock::new(last_allowed),
        }
    }

    /// Gate allowing only hours strictly between 5 and 23, never Saturday.
    /// This is the window in which daily universe selection may fire.
    pub fn selection_hours(inner: Arc<dyn TimeProvider>) -> Self {
        Self::new(
            inner,
            Arc::new(|t: DateTime<Utc>| {
                t.weekday() != Weekday::Sat && t.hour() > 5 && t.hour() < 23
            }),
        )
    }
}

impl TimeProvider for GatedTimeProvider {
    fn now_utc(&self) -> DateTime<Utc> {
        let proposed = self.inner.now_utc();
        if (self.gate)(proposed) {
            *self.last_allowed.write() = proposed;
            proposed
        } else {
            *self.last_allowed.read()
        }
    }
}
