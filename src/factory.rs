//! Subscription factory: assembles the per-request pipeline.
//!
//! The transformer order is load-bearing and fixed:
//!
//! ```text
//! raw -> [price-scale] -> [fill-forward] -> [market-hours filter] -> [frontier gate]
//! ```
//!
//! Scaling runs first so fill-forward copies scaled values; fill-forward
//! runs before the hours filter so synthetic bars outside trading hours are
//! dropped rather than emitted; the frontier gate runs last so no
//! transformer ever sees a future instant. Universe subscriptions branch by
//! kind but every branch terminates in a frontier gate.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::data::{
    DataKind, DataPoint, DataValue, SubscriptionConfig, SubscriptionRequest, Symbol, UniverseKind,
};
use crate::error::{FeedError, FeedResult};
use crate::exchange::{
    CustomDataExchange, CustomDataSource, FinishedNotifier, PointHandler, SourcePoll,
};
use crate::feed::{NotifierSlot, SourceKind, Subscription};
use crate::handler::QueueHandlerSubscriber;
use crate::providers::{
    ChannelProvider, CustomDataSourceFactory, FactorFileProvider, MapFileProvider,
};
use crate::queue::{BoundedDataQueue, DataNotifier};
use crate::stream::{
    CollectionAggregator, DataPointStream, EmptyStream, FillForward, FrontierGate,
    MarketHoursFilter, PriceScaleAdjuster, SynchronizedMerge,
};
use crate::time::{GatedTimeProvider, TimeProvider};
use crate::warmup::WarmupPlanner;

/// Bridge queue capacity between producers and the pull chain
const BRIDGE_CAPACITY: usize = 1024;

/// Result of creating a subscription.
///
/// `Expired` is not a failure: the symbol was delisted before today, so the
/// live branch is an empty stream and only warmup data (if any) flows.
/// Assembly failures are the `Err` arm of [`SubscriptionFactory::create`].
pub enum SubscriptionOutcome {
    Created(Arc<Subscription>),
    Expired(Arc<Subscription>),
}

impl SubscriptionOutcome {
    pub fn subscription(&self) -> &Arc<Subscription> {
        match self {
            SubscriptionOutcome::Created(sub) | SubscriptionOutcome::Expired(sub) => sub,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, SubscriptionOutcome::Expired(_))
    }
}

/// Builds subscriptions: resolves the data source, composes the transformer
/// chain, and splices the warmup prefix.
pub struct SubscriptionFactory {
    subscriber: QueueHandlerSubscriber,
    exchange: CustomDataExchange,
    channel: Arc<dyn ChannelProvider>,
    map_files: Arc<dyn MapFileProvider>,
    factor_files: Arc<dyn FactorFileProvider>,
    custom_sources: Arc<dyn CustomDataSourceFactory>,
    warmup: WarmupPlanner,
    frontier: Arc<dyn TimeProvider>,
}

impl SubscriptionFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscriber: QueueHandlerSubscriber,
        exchange: CustomDataExchange,
        channel: Arc<dyn ChannelProvider>,
        map_files: Arc<dyn MapFileProvider>,
        factor_files: Arc<dyn FactorFileProvider>,
        custom_sources: Arc<dyn CustomDataSourceFactory>,
        warmup: WarmupPlanner,
        frontier: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            subscriber,
            exchange,
            channel,
            map_files,
            factor_files,
            custom_sources,
            warmup,
            frontier,
        }
    }

    /// Assemble the subscription for a request
    pub fn create(&self, request: &SubscriptionRequest) -> FeedResult<SubscriptionOutcome> {
        if request.is_universe_subscription() {
            self.create_universe(request)
        } else {
            self.create_data(request)
        }
    }

    fn create_data(&self, request: &SubscriptionRequest) -> FeedResult<SubscriptionOutcome> {
        let config = &request.config;
        let slot = NotifierSlot::new();
        let notifier = slot.notifier();

        let today = self.frontier.now_utc().date_naive();
        let expired = self
            .map_files
            .resolve(config)
            .map(|map| map.is_delisted_before(today))
            .unwrap_or(false);

        let (live, source_kind) = if expired {
            info!(
                symbol = %config.symbol,
                "symbol delisted before today, bypassing the live branch"
            );
            (
                Box::new(EmptyStream) as Box<dyn DataPointStream>,
                SourceKind::WarmupOnly,
            )
        } else if self.channel.should_stream(config) {
            debug!(symbol = %config.symbol, "streaming via queue handler");
            let raw = self.subscriber.subscribe(config, Arc::clone(&notifier));
            (self.compose_pipeline(request, raw), SourceKind::Streamed)
        } else {
            debug!(symbol = %config.symbol, "polling via custom data exchange");
            let source = self
                .custom_sources
                .create(config, request.start_utc, None)
                .map_err(|err| construction_error(config, err))?;
            let raw = self.register_polled(config.symbol.clone(), source, notifier);
            (self.compose_pipeline(request, raw), SourceKind::Polled)
        };

        let now_utc = self.frontier.now_utc();
        let stream = self.warmup.attach(request, now_utc, live);

        let subscription = Arc::new(Subscription::new(
            config.clone(),
            request.security.clone(),
            source_kind,
            stream,
            slot,
        ));
        Ok(if expired {
            SubscriptionOutcome::Expired(subscription)
        } else {
            SubscriptionOutcome::Created(subscription)
        })
    }

    /// Fixed-order transformer composition over a raw live stream
    fn compose_pipeline(
        &self,
        request: &SubscriptionRequest,
        raw: Box<dyn DataPointStream>,
    ) -> Box<dyn DataPointStream> {
        let config = &request.config;
        let mut stream = raw;

        if config.prices_should_be_scaled(true) {
            if let Some(factors) = self.factor_files.resolve(config) {
                stream = Box::new(PriceScaleAdjuster::new(stream, factors));
            }
        }

        if config.fill_forward && !config.resolution.is_tick() {
            let local_end = request
                .end_utc
                .with_timezone(&config.data_time_zone)
                .naive_local();
            stream = Box::new(FillForward::new(
                stream,
                Arc::clone(&request.security.hours),
                config.increment(),
                config.extended_hours,
                config.data_time_zone,
                Arc::clone(&self.frontier),
                local_end,
            ));
        }

        if config.is_filtered {
            stream = Box::new(MarketHoursFilter::new(
                stream,
                Arc::clone(&request.security.hours),
                config.extended_hours,
                config.data_time_zone,
            ));
        }

        Box::new(FrontierGate::new(
            stream,
            Arc::clone(&self.frontier),
            config.data_time_zone,
        ))
    }

    /// Register a pollable source on the exchange, bridged through a
    /// bounded queue into the pull chain
    fn register_polled(
        &self,
        symbol: Symbol,
        source: Box<dyn CustomDataSource>,
        notifier: DataNotifier,
    ) -> Box<dyn DataPointStream> {
        let (producer, queue) = BoundedDataQueue::new(BRIDGE_CAPACITY, Some(notifier));
        let enqueue = producer.clone();
        let on_data: PointHandler = Arc::new(move |point| enqueue.enqueue(point));
        let on_finished: FinishedNotifier = Arc::new(move || producer.stop());
        self.exchange.add(symbol, source, on_data, on_finished);
        Box::new(queue)
    }

    fn create_universe(&self, request: &SubscriptionRequest) -> FeedResult<SubscriptionOutcome> {
        let kind = request
            .universe
            .clone()
            .expect("universe request carries a kind");
        let config = &request.config;
        let slot = NotifierSlot::new();
        let notifier = slot.notifier();
        let data_tz = config.data_time_zone;

        let (stream, source_kind): (Box<dyn DataPointStream>, SourceKind) = match kind {
            UniverseKind::TimeTriggered { interval } => {
                let source = Box::new(IntervalTickSource::new(
                    config.symbol.clone(),
                    interval,
                    data_tz,
                    Arc::clone(&self.frontier),
                    request.start_utc,
                ));
                let queue = self.register_polled(config.symbol.clone(), source, notifier);
                (
                    Box::new(FrontierGate::new(queue, Arc::clone(&self.frontier), data_tz)),
                    SourceKind::Polled,
                )
            }
            UniverseKind::Coarse | UniverseKind::EtfConstituent => {
                // Snapshot files cover the previous trading day
                let today = self.frontier.now_utc().date_naive();
                let as_of = request.security.hours.previous_trading_day(today);
                let source = self
                    .custom_sources
                    .create(config, request.start_utc, Some(as_of))
                    .map_err(|err| construction_error(config, err))?;
                let queue = self.register_polled(config.symbol.clone(), source, notifier);
                let aggregated = CollectionAggregator::new(queue, config.symbol.clone());
                // Selection must not fire during illegal hours
                let gated: Arc<dyn TimeProvider> = Arc::new(GatedTimeProvider::selection_hours(
                    Arc::clone(&self.frontier),
                ));
                (
                    Box::new(FrontierGate::new(Box::new(aggregated), gated, data_tz)),
                    SourceKind::Polled,
                )
            }
            UniverseKind::OptionChain => self.create_chain(request, true, notifier)?,
            UniverseKind::FuturesChain => self.create_chain(request, false, notifier)?,
            UniverseKind::Custom => {
                let source = self
                    .custom_sources
                    .create(config, request.start_utc, None)
                    .map_err(|err| construction_error(config, err))?;
                let queue = self.register_polled(config.symbol.clone(), source, notifier);
                let aggregated = CollectionAggregator::new(queue, config.symbol.clone());
                (
                    Box::new(FrontierGate::new(
                        Box::new(aggregated),
                        Arc::clone(&self.frontier),
                        data_tz,
                    )),
                    SourceKind::Polled,
                )
            }
        };

        let subscription = Arc::new(Subscription::new(
            config.clone(),
            request.security.clone(),
            source_kind,
            stream,
            slot,
        ));
        Ok(SubscriptionOutcome::Created(subscription))
    }

    /// Chain universes: one stream per contract (subscribe, plus
    /// fill-forward for options), merged by end time and aggregated into a
    /// collection keyed by the universe symbol.
    fn create_chain(
        &self,
        request: &SubscriptionRequest,
        fill_forward: bool,
        notifier: DataNotifier,
    ) -> FeedResult<(Box<dyn DataPointStream>, SourceKind)> {
        let config = &request.config;
        let provider = self
            .subscriber
            .handler()
            .universe_provider()
            .ok_or(FeedError::UnsupportedSecurityType {
                security_type: config.symbol.security_type,
            })?;
        if !provider.supports(config.symbol.security_type) {
            return Err(FeedError::UnsupportedSecurityType {
                security_type: config.symbol.security_type,
            });
        }

        let contracts = provider.members(&config.symbol, self.frontier.now_utc());
        if contracts.is_empty() {
            warn!(symbol = %config.symbol, "universe provider returned no contracts");
        }

        let mut streams: Vec<Box<dyn DataPointStream>> = Vec::with_capacity(contracts.len());
        let mut contract_configs = Vec::with_capacity(contracts.len());
        for contract in contracts {
            let mut contract_config = config.clone();
            contract_config.symbol = contract;
            contract_config.data_kind = DataKind::TradeBar;
            contract_config.fill_forward = fill_forward;

            let mut stream = self
                .subscriber
                .subscribe(&contract_config, Arc::clone(&notifier));
            if fill_forward && !contract_config.resolution.is_tick() {
                let local_end = request
                    .end_utc
                    .with_timezone(&config.data_time_zone)
                    .naive_local();
                stream = Box::new(FillForward::new(
                    stream,
                    Arc::clone(&request.security.hours),
                    contract_config.increment(),
                    contract_config.extended_hours,
                    config.data_time_zone,
                    Arc::clone(&self.frontier),
                    local_end,
                ));
            }
            streams.push(stream);
            contract_configs.push(contract_config);
        }

        let merged = SynchronizedMerge::balanced(streams, config.data_time_zone);
        let aggregated = CollectionAggregator::new(Box::new(merged), config.symbol.clone());
        let gated = FrontierGate::new(
            Box::new(aggregated),
            Arc::clone(&self.frontier),
            config.data_time_zone,
        );
        Ok((Box::new(gated), SourceKind::StreamedChain(contract_configs)))
    }
}

fn construction_error(config: &SubscriptionConfig, err: FeedError) -> FeedError {
    FeedError::SubscriptionConstruction {
        symbol: config.symbol.clone(),
        reason: err.to_string(),
    }
}

/// Spoofs selection-interval ticks in the universe's data time zone.
///
/// The clock handed in is the shared frontier, so a tick is produced only
/// once the frontier reaches its timestamp.
pub struct IntervalTickSource {
    symbol: Symbol,
    interval: Duration,
    data_time_zone: Tz,
    clock: Arc<dyn TimeProvider>,
    next_local: NaiveDateTime,
}

impl IntervalTickSource {
    pub fn new(
        symbol: Symbol,
        interval: Duration,
        data_time_zone: Tz,
        clock: Arc<dyn TimeProvider>,
        start_utc: DateTime<Utc>,
    ) -> Self {
        let next_local = start_utc.with_timezone(&data_time_zone).naive_local() + interval;
        Self {
            symbol,
            interval,
            data_time_zone,
            clock,
            next_local,
        }
    }
}

impl CustomDataSource for IntervalTickSource {
    fn pull(&mut self) -> FeedResult<SourcePoll> {
        let now_local = self
            .clock
            .now_utc()
            .with_timezone(&self.data_time_zone)
            .naive_local();
        if self.next_local <= now_local {
            let tick = DataPoint::instantaneous(
                self.symbol.clone(),
                self.next_local,
                DataValue::Tick {
                    price: rust_decimal::Decimal::ZERO,
                    quantity: rust_decimal::Decimal::ZERO,
                },
            );
            self.next_local += self.interval;
            Ok(SourcePoll::Point(tick))
        } else {
            Ok(SourcePoll::Pending)
        }
    }
}
