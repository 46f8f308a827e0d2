//! Feed lifecycle: subscriptions, the subscription set, and the live feed
//! state machine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::data::{DataPoint, SecurityHandle, SubscriptionConfig, SubscriptionRequest};
use crate::error::{FeedError, FeedResult};
use crate::exchange::CustomDataExchange;
use crate::factory::{SubscriptionFactory, SubscriptionOutcome};
use crate::handler::{DataQueueHandler, QueueHandlerSubscriber};
use crate::providers::{
    Algorithm, ChannelProvider, CustomDataSourceFactory, FactorFileProvider, HistoricalFeedFactory,
    MapFileProvider,
};
use crate::queue::DataNotifier;
use crate::settings::FeedSettings;
use crate::stream::DataPointStream;
use crate::time::TimeProvider;
use crate::warmup::WarmupPlanner;

/// Feed lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    New,
    Initialized,
    Active,
    Stopping,
    Stopped,
}

/// Late-bound new-data notifier.
///
/// The bounded queue is built before its subscription exists, so the queue
/// fires through this slot and the subscription's handler is installed
/// afterwards. The slot never owns the subscription, only the callback,
/// so a dropped subscription cannot be kept alive by its queue.
#[derive(Clone, Default)]
pub struct NotifierSlot {
    inner: Arc<Mutex<Option<DataNotifier>>>,
}

impl NotifierSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that forwards to whatever handler is installed
    pub fn notifier(&self) -> DataNotifier {
        let inner = Arc::clone(&self.inner);
        Arc::new(move || {
            let handler = inner.lock().clone();
            if let Some(handler) = handler {
                handler();
            }
        })
    }

    /// Install the handler fired on new data
    pub fn set(&self, handler: DataNotifier) {
        *self.inner.lock() = Some(handler);
    }

    /// Remove the handler
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }
}

/// Precomputed exchange-time-zone offset lookups for one subscription
#[derive(Debug, Clone, Copy)]
pub struct TimeZoneOffsetProvider {
    time_zone: Tz,
}

impl TimeZoneOffsetProvider {
    pub fn new(time_zone: Tz) -> Self {
        Self { time_zone }
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Offset from UTC, in seconds, at the given instant
    pub fn offset_seconds_at(&self, utc: DateTime<Utc>) -> i32 {
        self.time_zone
            .offset_from_utc_datetime(&utc.naive_utc())
            .fix()
            .local_minus_utc()
    }

    /// Exchange-local naive time for a UTC instant
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.time_zone).naive_local()
    }
}

/// Which source a subscription must be detached from on removal
#[derive(Clone)]
pub enum SourceKind {
    /// Queue handler (plus derived auxiliary configs for equities)
    Streamed,
    /// Queue handler, one subscription per chain contract
    StreamedChain(Vec<SubscriptionConfig>),
    /// Custom-data exchange, keyed by symbol
    Polled,
    /// Expired symbol: nothing live to detach
    WarmupOnly,
}

/// One live subscription: the configuration plus exclusive ownership of its
/// assembled pull chain.
pub struct Subscription {
    config: SubscriptionConfig,
    security: SecurityHandle,
    source: SourceKind,
    stream: Mutex<Box<dyn DataPointStream>>,
    current: RwLock<Option<DataPoint>>,
    offset_provider: TimeZoneOffsetProvider,
    notifier: NotifierSlot,
    disposed: AtomicBool,
}

impl Subscription {
    pub fn new(
        config: SubscriptionConfig,
        security: SecurityHandle,
        source: SourceKind,
        stream: Box<dyn DataPointStream>,
        notifier: NotifierSlot,
    ) -> Self {
        let offset_provider = TimeZoneOffsetProvider::new(config.exchange_time_zone);
        Self {
            config,
            security,
            source,
            stream: Mutex::new(stream),
            current: RwLock::new(None),
            offset_provider,
            notifier,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    pub fn offset_provider(&self) -> &TimeZoneOffsetProvider {
        &self.offset_provider
    }

    pub(crate) fn source(&self) -> &SourceKind {
        &self.source
    }

    /// Install the callback fired when the producer delivers new data
    pub fn set_on_new_data(&self, handler: DataNotifier) {
        self.notifier.set(handler);
    }

    /// Advance the pipeline. `false` only once the stream is exhausted or
    /// the subscription is disposed; `true` with no `current` means no data
    /// is knowable yet.
    pub fn move_next(&self) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        let mut stream = self.stream.lock();
        // Disposal may have raced the lock
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        let alive = stream.move_next();
        let point = if alive { stream.current().cloned() } else { None };
        if point.is_none() {
            // A quiet or ended stream may be hiding a failed producer
            if let Some(err) = stream.take_error() {
                warn!(
                    symbol = %self.config.symbol,
                    error = %err,
                    "producer error stopped this subscription's source"
                );
            }
        }
        if !alive {
            *self.current.write() = None;
            return false;
        }
        if let Some(point) = &point {
            self.security.cache.store(point);
        }
        *self.current.write() = point;
        true
    }

    /// The point produced by the last `move_next`, if any
    pub fn current(&self) -> Option<DataPoint> {
        self.current.read().clone()
    }

    /// Tear down: no further points are emitted. Safe to call while a
    /// producer callback is in flight; idempotent. Returns true on the
    /// first call.
    pub fn dispose(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::AcqRel);
        if first {
            self.notifier.clear();
            *self.current.write() = None;
            debug!(symbol = %self.config.symbol, "subscription disposed");
        }
        first
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Everything `initialize` needs: the job descriptor, the external
/// collaborators, and the settings record.
#[derive(Clone)]
pub struct FeedContext {
    /// Job name, for logs
    pub job_name: String,
    /// Only live job descriptors are accepted
    pub is_live: bool,
    pub queue_handler: Arc<dyn DataQueueHandler>,
    pub channel_provider: Arc<dyn ChannelProvider>,
    pub map_files: Arc<dyn MapFileProvider>,
    pub factor_files: Arc<dyn FactorFileProvider>,
    pub custom_sources: Arc<dyn CustomDataSourceFactory>,
    pub historical_feed: Option<Arc<dyn HistoricalFeedFactory>>,
    pub algorithm: Arc<dyn Algorithm>,
    /// Shared frontier clock
    pub frontier: Arc<dyn TimeProvider>,
    pub settings: FeedSettings,
}

struct FeedRuntime {
    factory: SubscriptionFactory,
    exchange: CustomDataExchange,
    subscriber: QueueHandlerSubscriber,
}

/// The live data feed: owns the subscription set and coordinates startup
/// and teardown.
///
/// Lifecycle: New -> Initialized -> Active -> Stopping -> Stopped.
/// `initialize` must be called exactly once, with a live job descriptor,
/// from within a tokio runtime (the custom-data exchange spawns its
/// worker there).
pub struct LiveDataFeed {
    state: Mutex<FeedState>,
    subscriptions: RwLock<HashMap<SubscriptionConfig, Arc<Subscription>>>,
    runtime: RwLock<Option<FeedRuntime>>,
}

impl LiveDataFeed {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FeedState::New),
            subscriptions: RwLock::new(HashMap::new()),
            runtime: RwLock::new(None),
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == FeedState::Active
    }

    /// Resolve the queue handler, start the custom-data exchange, and
    /// activate the feed. Fails with `InvalidJob` unless this is the first
    /// call and the descriptor is live.
    pub fn initialize(&self, context: FeedContext) -> FeedResult<()> {
        {
            let mut state = self.state.lock();
            if *state != FeedState::New {
                return Err(FeedError::InvalidJob(format!(
                    "feed already initialized (state {:?})",
                    *state
                )));
            }
            if !context.is_live {
                return Err(FeedError::InvalidJob(format!(
                    "'{}' is not a live job descriptor",
                    context.job_name
                )));
            }
            *state = FeedState::Initialized;
        }

        if let Some(token) = &context.settings.tiingo_auth_token {
            context.custom_sources.set_auth_token(token);
        }

        let exchange = CustomDataExchange::new(context.settings.custom_exchange.sleep_interval());
        exchange.start();
        let subscriber = QueueHandlerSubscriber::new(Arc::clone(&context.queue_handler));
        let warmup = WarmupPlanner::new(
            context.settings.clone(),
            Arc::clone(&context.algorithm),
            context.historical_feed.clone(),
        );
        let factory = SubscriptionFactory::new(
            subscriber.clone(),
            exchange.clone(),
            Arc::clone(&context.channel_provider),
            Arc::clone(&context.map_files),
            Arc::clone(&context.factor_files),
            Arc::clone(&context.custom_sources),
            warmup,
            Arc::clone(&context.frontier),
        );

        *self.runtime.write() = Some(FeedRuntime {
            factory,
            exchange,
            subscriber,
        });
        *self.state.lock() = FeedState::Active;
        info!(job = %context.job_name, "live data feed initialized");
        Ok(())
    }

    /// Build and register a subscription. Only callable while Active.
    ///
    /// Returns `Created` or `Expired` (both registered); construction
    /// failures are logged and returned; the feed itself continues.
    pub fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> FeedResult<SubscriptionOutcome> {
        if !self.is_active() {
            return Err(FeedError::Configuration(
                "create_subscription requires an active feed".to_string(),
            ));
        }
        let runtime = self.runtime.read();
        let runtime = runtime.as_ref().expect("active feed has a runtime");

        match runtime.factory.create(request) {
            Ok(outcome) => {
                let subscription = Arc::clone(outcome.subscription());
                self.subscriptions
                    .write()
                    .insert(subscription.config().clone(), subscription);
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    symbol = %request.config.symbol,
                    error = %err,
                    "subscription construction failed"
                );
                Err(err)
            }
        }
    }

    /// Detach a subscription from its source and dispose it. Returns false
    /// when the configuration is unknown.
    pub fn remove_subscription(&self, config: &SubscriptionConfig) -> bool {
        let Some(subscription) = self.subscriptions.write().remove(config) else {
            return false;
        };
        if let Some(runtime) = self.runtime.read().as_ref() {
            Self::detach(runtime, config, &subscription);
        }
        subscription.dispose();
        info!(symbol = %config.symbol, "subscription removed");
        true
    }

    fn detach(runtime: &FeedRuntime, config: &SubscriptionConfig, subscription: &Subscription) {
        match subscription.source() {
            SourceKind::Streamed => runtime.subscriber.unsubscribe(config),
            SourceKind::StreamedChain(contracts) => {
                for contract in contracts {
                    runtime.subscriber.handler().unsubscribe(contract);
                }
            }
            SourceKind::Polled => {
                runtime.exchange.remove(&config.symbol);
            }
            SourceKind::WarmupOnly => {}
        }
    }

    /// Look up a subscription by configuration
    pub fn subscription(&self, config: &SubscriptionConfig) -> Option<Arc<Subscription>> {
        self.subscriptions.read().get(config).cloned()
    }

    /// All registered subscriptions
    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.subscriptions.read().values().cloned().collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Stop the custom-data exchange, tear down every subscription, and
    /// transition to Stopped. Idempotent.
    pub fn exit(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                FeedState::Stopping | FeedState::Stopped => return,
                _ => *state = FeedState::Stopping,
            }
        }
        info!("live data feed exiting");

        let drained: Vec<(SubscriptionConfig, Arc<Subscription>)> =
            self.subscriptions.write().drain().collect();
        if let Some(runtime) = self.runtime.read().as_ref() {
            runtime.exchange.stop();
            for (config, subscription) in &drained {
                Self::detach(runtime, config, subscription);
            }
        }
        for (_, subscription) in drained {
            subscription.dispose();
        }

        *self.state.lock() = FeedState::Stopped;
        info!("live data feed stopped");
    }
}

impl Default for LiveDataFeed {
    fn default() -> Self {
        Self::new()
    }
}
