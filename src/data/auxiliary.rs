//! Corporate actions delivered alongside price data.
//!
//! Auxiliary events bypass market-hours filtering and win end-time ties
//! against price points, so a split or dividend takes effect on the bar
//! where it applies.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Corporate action event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuxiliaryEvent {
    /// Share split. `split_factor` is the price multiplier: a 4:1 split
    /// carries 0.25.
    Split { split_factor: Decimal },
    /// Cash dividend per share
    Dividend { distribution: Decimal },
    /// The symbol stops trading on `date`
    Delisting { date: NaiveDate },
}

impl fmt::Display for AuxiliaryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxiliaryEvent::Split { split_factor } => write!(f, "split {}", split_factor),
            AuxiliaryEvent::Dividend { distribution } => write!(f, "dividend {}", distribution),
            AuxiliaryEvent::Delisting { date } => write!(f, "delisting {}", date),
        }
    }
}
