//! Feed error taxonomy and classification.
//!
//! Errors local to one subscription never abort the feed: construction
//! failures are reported to the caller of `create_subscription`, producer
//! failures stop that producer's queue, and warmup failures skip the failing
//! branch. Only initialize-time errors are fatal. Every variant carries
//! enough of the offending configuration for diagnosis.

use thiserror::Error;

use crate::data::{SecurityType, Symbol};

/// Warmup stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupStage {
    /// File-based replay of the feed's own historical sources
    File,
    /// History-provider request over the clamped look-back window
    History,
}

impl std::fmt::Display for WarmupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarmupStage::File => write!(f, "file"),
            WarmupStage::History => write!(f, "history"),
        }
    }
}

/// Feed error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FeedError {
    /// The feed was initialized with something other than a live job
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// A universe subscription was requested against a queue handler that
    /// does not implement the universe-provider capability
    #[error("Universe subscriptions are not supported for security type {security_type}")]
    UnsupportedSecurityType { security_type: SecurityType },

    /// Pipeline assembly failed for one subscription
    #[error("Failed to build subscription for {symbol}: {reason}")]
    SubscriptionConstruction { symbol: Symbol, reason: String },

    /// An upstream producer failed during a pull or callback
    #[error("Producer error for {symbol}: {reason}")]
    Producer { symbol: Symbol, reason: String },

    /// One warmup branch failed; the remaining branches continue
    #[error("Warmup {stage} source failed for {symbol}: {reason}")]
    WarmupSource {
        stage: WarmupStage,
        symbol: Symbol,
        reason: String,
    },

    /// Settings were missing or inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A file-based source could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// May resolve on a later poll cycle (producer hiccups, slow sources)
    Transient,
    /// Won't resolve by retrying (bad request, unsupported capability)
    Permanent,
    /// Settings problem; fix the configuration, not the retry count
    Configuration,
}

/// Trait for errors that can classify themselves.
///
/// The custom-data exchange uses this to decide whether a failing polled
/// source is retained for the next cycle or dropped from the registry.
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if a later attempt may succeed
    fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Returns true if the error ends the source for good
    fn is_terminal(&self) -> bool {
        !self.is_transient()
    }
}

impl ErrorClassification for FeedError {
    fn category(&self) -> ErrorCategory {
        match self {
            FeedError::Producer { .. } => ErrorCategory::Transient,
            FeedError::WarmupSource { .. } => ErrorCategory::Transient,
            FeedError::Io(_) => ErrorCategory::Transient,
            FeedError::InvalidJob(_) => ErrorCategory::Configuration,
            FeedError::Configuration(_) => ErrorCategory::Configuration,
            FeedError::UnsupportedSecurityType { .. } => ErrorCategory::Permanent,
            FeedError::SubscriptionConstruction { .. } => ErrorCategory::Permanent,
        }
    }
}
