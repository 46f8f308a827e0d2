//! Core data model: points, payloads, symbols, and subscription records.

mod auxiliary;
mod config;
mod point;

pub use auxiliary::AuxiliaryEvent;
pub use config::{
    DataKind, SecurityHandle, SecurityCache, SubscriptionConfig, SubscriptionRequest, UniverseKind,
};
pub use point::{
    local_to_utc, DataPoint, DataValue, Resolution, SecurityType, Symbol,
};
