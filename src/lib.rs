//! # Live Feed
//!
//! Live market-data feed core for an algorithmic trading engine.
//!
//! ## Features
//!
//! - **Per-subscription pipelines**: composable pull-based transformers
//!   (price scaling, fill-forward, market-hours filtering, frontier gating)
//! - **Push/pull bridging**: bounded queues adapt broker callbacks to the
//!   algorithm's synchronous time-slice loop without reordering
//! - **Frontier clock**: a shared monotonic UTC frontier guarantees no
//!   subscription ever emits a point from the future
//! - **Warmup replay**: file-based and history-provider warmup spliced in
//!   front of each live stream with a seamless handoff
//!
//! ## Architecture
//!
//! External producers (queue handlers) or polled custom sources feed bounded
//! queues; the subscription factory assembles the transformer chain per
//! request and the feed lifecycle owns the subscription set. Universe
//! subscriptions (time-triggered, coarse snapshot, option/futures chains,
//! custom) reuse the same machinery and always terminate in a frontier gate.

pub mod data;
pub mod error;
pub mod exchange;
pub mod factory;
pub mod feed;
pub mod handler;
pub mod hours;
pub mod logging;
pub mod providers;
pub mod queue;
pub mod settings;
pub mod stream;
pub mod time;
pub mod warmup;

// Re-export commonly used types
pub use data::{
    AuxiliaryEvent, DataKind, DataPoint, DataValue, Resolution, SecurityHandle, SecurityType,
    SubscriptionConfig, SubscriptionRequest, Symbol, UniverseKind,
};
pub use error::{ErrorCategory, ErrorClassification, FeedError, FeedResult, WarmupStage};
pub use exchange::{CustomDataExchange, CustomDataSource, SourcePoll};
pub use factory::{SubscriptionFactory, SubscriptionOutcome};
pub use feed::{
    FeedContext, FeedState, LiveDataFeed, NotifierSlot, SourceKind, Subscription,
    TimeZoneOffsetProvider,
};
pub use handler::{DataQueueHandler, QueueHandlerSubscriber, UniverseProvider};
pub use hours::MarketHours;
pub use queue::{BoundedDataQueue, DataNotifier, QueueProducer};
pub use settings::FeedSettings;
pub use stream::DataPointStream;
pub use time::{GatedTimeProvider, ManualTimeProvider, RealTimeProvider, TimeProvider};
pub use warmup::WarmupPlanner;
