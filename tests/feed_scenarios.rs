//! End-to-end feed scenarios: warmup splicing, fill-forward, corporate
//! actions, frontier gating, universe selection windows, and teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use live_feed::providers::{
    Algorithm, ChannelProvider, CustomDataSourceFactory, FactorFile, FactorFileProvider,
    HistoricalFeedFactory, HistoryProvider, HistoryRequest, MapFile, MapFileProvider,
};
use live_feed::{
    AuxiliaryEvent, BoundedDataQueue, CustomDataSource, DataKind, DataNotifier, DataPoint,
    DataPointStream, DataQueueHandler, DataValue, FeedContext, FeedError, FeedResult, FeedSettings,
    FeedState, LiveDataFeed, ManualTimeProvider, QueueProducer, Resolution, SecurityHandle,
    SourcePoll, Subscription, SubscriptionConfig, SubscriptionRequest, Symbol, TimeProvider,
    UniverseKind,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Queue handler backed by in-memory bounded queues, one per configuration
#[derive(Default)]
struct FakeQueueHandler {
    producers: Mutex<HashMap<SubscriptionConfig, QueueProducer>>,
}

impl FakeQueueHandler {
    fn producer(&self, config: &SubscriptionConfig) -> QueueProducer {
        self.producers
            .lock()
            .get(config)
            .cloned()
            .expect("configuration subscribed")
    }
}

impl DataQueueHandler for FakeQueueHandler {
    fn subscribe(
        &self,
        config: &SubscriptionConfig,
        notifier: DataNotifier,
    ) -> Box<dyn DataPointStream> {
        let (producer, queue) = BoundedDataQueue::new(256, Some(notifier));
        self.producers.lock().insert(config.clone(), producer);
        Box::new(queue)
    }

    fn unsubscribe(&self, config: &SubscriptionConfig) {
        if let Some(producer) = self.producers.lock().remove(config) {
            producer.stop();
        }
    }
}

struct StaticChannel {
    stream: bool,
}

impl ChannelProvider for StaticChannel {
    fn should_stream(&self, _config: &SubscriptionConfig) -> bool {
        self.stream
    }
}

#[derive(Default)]
struct StaticMapFiles {
    files: HashMap<Symbol, MapFile>,
}

impl MapFileProvider for StaticMapFiles {
    fn resolve(&self, config: &SubscriptionConfig) -> Option<MapFile> {
        self.files.get(&config.symbol).cloned()
    }
}

#[derive(Default)]
struct StaticFactorFiles {
    files: HashMap<Symbol, Arc<FactorFile>>,
}

impl FactorFileProvider for StaticFactorFiles {
    fn resolve(&self, config: &SubscriptionConfig) -> Option<Arc<FactorFile>> {
        self.files.get(&config.symbol).cloned()
    }
}

struct TestAlgorithm {
    warming_up: bool,
    history: Option<Arc<dyn HistoryProvider>>,
}

impl Algorithm for TestAlgorithm {
    fn is_warming_up(&self) -> bool {
        self.warming_up
    }
    fn history_provider(&self) -> Option<Arc<dyn HistoryProvider>> {
        self.history.clone()
    }
    fn time_zone(&self) -> Tz {
        chrono_tz::America::New_York
    }
}

/// Returns the configured points clipped to the requested window
struct FixedHistory {
    points: Vec<DataPoint>,
}

impl HistoryProvider for FixedHistory {
    fn get_history(
        &self,
        requests: &[HistoryRequest],
        _algo_time_zone: Tz,
    ) -> FeedResult<Vec<DataPoint>> {
        let request = &requests[0];
        Ok(self
            .points
            .iter()
            .filter(|p| {
                let end = p.end_time_utc(request.data_time_zone);
                end > request.start_utc && end <= request.end_utc
            })
            .cloned()
            .collect())
    }
}

/// Custom source that replays a script, then stays pending
struct ScriptedSource {
    script: std::vec::IntoIter<SourcePoll>,
}

impl CustomDataSource for ScriptedSource {
    fn pull(&mut self) -> FeedResult<SourcePoll> {
        Ok(self.script.next().unwrap_or(SourcePoll::Pending))
    }
}

#[derive(Default)]
struct ScriptedSourceFactory {
    scripts: Mutex<HashMap<Symbol, Vec<SourcePoll>>>,
}

impl ScriptedSourceFactory {
    fn script(self, symbol: Symbol, polls: Vec<SourcePoll>) -> Self {
        self.scripts.lock().insert(symbol, polls);
        self
    }
}

impl CustomDataSourceFactory for ScriptedSourceFactory {
    fn create(
        &self,
        config: &SubscriptionConfig,
        _start_utc: DateTime<Utc>,
        _as_of: Option<NaiveDate>,
    ) -> FeedResult<Box<dyn CustomDataSource>> {
        let script = self
            .scripts
            .lock()
            .remove(&config.symbol)
            .ok_or_else(|| FeedError::Configuration(format!("no source for {}", config.symbol)))?;
        Ok(Box::new(ScriptedSource {
            script: script.into_iter(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

fn minute_bar(symbol: &Symbol, start: NaiveDateTime, close: Decimal) -> DataPoint {
    DataPoint::bar(
        symbol.clone(),
        start,
        Duration::minutes(1),
        DataValue::flat_bar(close),
    )
}

struct Fixture {
    handler: Arc<FakeQueueHandler>,
    frontier: Arc<ManualTimeProvider>,
    feed: LiveDataFeed,
}

fn build_feed(
    stream: bool,
    frontier_start: DateTime<Utc>,
    map_files: StaticMapFiles,
    factor_files: StaticFactorFiles,
    custom_sources: ScriptedSourceFactory,
    algorithm: TestAlgorithm,
    historical: Option<Arc<dyn HistoricalFeedFactory>>,
) -> Fixture {
    let handler = Arc::new(FakeQueueHandler::default());
    let frontier = Arc::new(ManualTimeProvider::new(frontier_start));
    let feed = LiveDataFeed::new();
    feed.initialize(FeedContext {
        job_name: "live-test".to_string(),
        is_live: true,
        queue_handler: handler.clone(),
        channel_provider: Arc::new(StaticChannel { stream }),
        map_files: Arc::new(map_files),
        factor_files: Arc::new(factor_files),
        custom_sources: Arc::new(custom_sources),
        historical_feed: historical,
        algorithm: Arc::new(algorithm),
        frontier: frontier.clone(),
        settings: FeedSettings::default().with_sleep_interval(StdDuration::from_millis(5)),
    })
    .expect("initialize succeeds");

    Fixture {
        handler,
        frontier,
        feed,
    }
}

fn equity_request(
    ticker: &str,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
) -> SubscriptionRequest {
    let hours = Arc::new(live_feed::hours::presets::us_equity());
    let config = SubscriptionConfig::new(
        Symbol::equity(ticker),
        DataKind::TradeBar,
        Resolution::Minute,
        Arc::clone(&hours),
    );
    SubscriptionRequest::new(config, SecurityHandle::new(hours), start_utc, end_utc)
}

/// Pump a subscription until it goes quiet or exhausts, collecting points
fn pump(subscription: &Subscription) -> Vec<DataPoint> {
    let mut out = Vec::new();
    for _ in 0..10_000 {
        if !subscription.move_next() {
            break;
        }
        match subscription.current() {
            Some(point) => out.push(point),
            None => break,
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Scenario 1: expired equity warmup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expired_equity_gets_history_warmup_and_empty_live_branch() {
    let symbol = Symbol::equity("DELISTED");
    let now = utc(2020, 6, 1, 14, 0, 0);

    // Daily history bars: one inside the 7-day look-back, one outside
    let old_bar = DataPoint::bar(
        symbol.clone(),
        local(2020, 5, 10, 0, 0),
        Duration::days(1),
        DataValue::flat_bar(dec!(9)),
    );
    let recent_bar = DataPoint::bar(
        symbol.clone(),
        local(2020, 5, 28, 0, 0),
        Duration::days(1),
        DataValue::flat_bar(dec!(10)),
    );

    let mut map_files = StaticMapFiles::default();
    map_files.files.insert(
        symbol.clone(),
        MapFile::delisted(NaiveDate::from_ymd_opt(2013, 1, 1).unwrap()),
    );

    let fixture = build_feed(
        true,
        now,
        map_files,
        StaticFactorFiles::default(),
        ScriptedSourceFactory::default(),
        TestAlgorithm {
            warming_up: true,
            history: Some(Arc::new(FixedHistory {
                points: vec![old_bar, recent_bar],
            })),
        },
        None,
    );

    let mut request = equity_request("DELISTED", utc(2020, 5, 1, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));
    request.config.resolution = Resolution::Daily;

    let outcome = fixture.feed.create_subscription(&request).unwrap();
    assert!(outcome.is_expired(), "delisted symbol takes the expired path");

    let points = pump(outcome.subscription());
    // Exactly the bar inside the look-back window, and nothing from live
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value.last_price(), Some(dec!(10)));
    assert!(
        points[0].end_time_utc(request.config.data_time_zone) <= fixture.frontier.now_utc(),
        "warmup must not violate the frontier"
    );

    // Live branch is empty: the stream is exhausted for good
    assert!(!outcome.subscription().move_next());

    fixture.feed.exit();
}

// ---------------------------------------------------------------------------
// Scenario 2: fill-forward across a five-minute gap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn minute_gap_is_filled_with_synthetic_bars() {
    let now = utc(2020, 8, 31, 20, 0, 0);
    let fixture = build_feed(
        true,
        now,
        StaticMapFiles::default(),
        StaticFactorFiles::default(),
        ScriptedSourceFactory::default(),
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    let mut request = equity_request("SPY", utc(2020, 8, 31, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));
    request.config.fill_forward = true;

    let outcome = fixture.feed.create_subscription(&request).unwrap();
    let subscription = outcome.subscription();

    let producer = fixture.handler.producer(&request.config);
    let symbol = Symbol::equity("SPY");
    producer.enqueue(minute_bar(&symbol, local(2020, 8, 31, 9, 30), dec!(330)));
    producer.enqueue(minute_bar(&symbol, local(2020, 8, 31, 9, 35), dec!(331)));
    // End all three producer streams so the pipeline exhausts
    producer.stop();
    for kind in [DataKind::Split, DataKind::Dividend] {
        fixture
            .handler
            .producer(&request.config.derive_auxiliary(kind))
            .stop();
    }

    let points = pump(subscription);
    assert_eq!(points.len(), 6);

    let synthetic: Vec<_> = points.iter().filter(|p| p.is_fill_forward).collect();
    assert_eq!(synthetic.len(), 4);
    for (i, point) in synthetic.iter().enumerate() {
        assert_eq!(point.start_time, local(2020, 8, 31, 9, 31 + i as u32));
        assert_eq!(point.value.last_price(), Some(dec!(330)));
    }

    fixture.feed.exit();
}

// ---------------------------------------------------------------------------
// Scenario 3: equity split mid-stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn split_is_delivered_before_same_bar_trade_and_scaling_applies() {
    let now = utc(2020, 8, 31, 20, 0, 0);
    let symbol = Symbol::equity("AAPL");

    // 4:1 split effective with the 2020-08-31 open
    let mut factor_files = StaticFactorFiles::default();
    factor_files.files.insert(
        symbol.clone(),
        Arc::new(FactorFile::new(vec![(
            NaiveDate::from_ymd_opt(2020, 8, 30).unwrap(),
            dec!(0.25),
        )])),
    );

    let fixture = build_feed(
        true,
        now,
        StaticMapFiles::default(),
        factor_files,
        ScriptedSourceFactory::default(),
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    let request = equity_request("AAPL", utc(2020, 8, 31, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));
    let outcome = fixture.feed.create_subscription(&request).unwrap();
    let subscription = outcome.subscription();

    // A pre-split bar, then a split and a post-split bar sharing an end time
    let main = fixture.handler.producer(&request.config);
    main.enqueue(minute_bar(&symbol, local(2020, 8, 28, 9, 29), dec!(500)));
    main.enqueue(minute_bar(&symbol, local(2020, 8, 31, 9, 29), dec!(125)));
    fixture
        .handler
        .producer(&request.config.derive_auxiliary(DataKind::Split))
        .enqueue(DataPoint::instantaneous(
            symbol.clone(),
            local(2020, 8, 31, 9, 30),
            DataValue::Auxiliary(AuxiliaryEvent::Split {
                split_factor: dec!(0.25),
            }),
        ));

    // Pre-split close 500 scaled by the 0.25 factor
    assert!(subscription.move_next());
    let first = subscription.current().unwrap();
    assert_eq!(first.value.last_price(), Some(dec!(125)));

    // Split precedes the trade bar that shares its end time
    assert!(subscription.move_next());
    let second = subscription.current().unwrap();
    assert!(second.value.is_auxiliary(), "split precedes the trade bar");

    // Post-split bar arrives already adjusted; factor is 1 from here on
    assert!(subscription.move_next());
    let third = subscription.current().unwrap();
    assert_eq!(third.value.last_price(), Some(dec!(125)));

    fixture.feed.exit();
}

// ---------------------------------------------------------------------------
// Scenario 4: frontier lag
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consumer_sees_no_data_until_frontier_passes_end_time() {
    let frozen = utc(2020, 8, 31, 13, 31, 0);
    let fixture = build_feed(
        true,
        frozen,
        StaticMapFiles::default(),
        StaticFactorFiles::default(),
        ScriptedSourceFactory::default(),
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    let request = equity_request("SPY", utc(2020, 8, 31, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));
    let outcome = fixture.feed.create_subscription(&request).unwrap();
    let subscription = outcome.subscription();

    // Bar end 09:31 NY = 13:31 UTC; frontier frozen one second earlier
    fixture.frontier.set(frozen - Duration::seconds(1));
    fixture
        .handler
        .producer(&request.config)
        .enqueue(minute_bar(&Symbol::equity("SPY"), local(2020, 8, 31, 9, 30), dec!(330)));

    for _ in 0..3 {
        assert!(subscription.move_next());
        assert!(subscription.current().is_none(), "bar is still in the future");
    }

    fixture.frontier.set(frozen);
    assert!(subscription.move_next());
    let point = subscription.current().expect("bar becomes knowable");
    assert_eq!(point.value.last_price(), Some(dec!(330)));

    fixture.feed.exit();
}

// ---------------------------------------------------------------------------
// Scenario 5: coarse universe outside the selection window
// ---------------------------------------------------------------------------

#[tokio::test]
async fn coarse_selection_waits_for_legal_hours() {
    // Monday 2020-06-01 01:00 UTC: inside the illegal window
    let one_am = utc(2020, 6, 1, 1, 0, 0);
    let universe_symbol = Symbol::base("COARSE");

    let snapshot = |ticker: &str, price: Decimal| {
        DataPoint::instantaneous(
            Symbol::equity(ticker),
            local(2020, 6, 1, 0, 0),
            DataValue::flat_bar(price),
        )
    };
    let custom_sources = ScriptedSourceFactory::default().script(
        universe_symbol.clone(),
        vec![
            SourcePoll::Point(snapshot("AAPL", dec!(320))),
            SourcePoll::Point(snapshot("MSFT", dec!(180))),
            // End-of-snapshot: closes the group on the aggregator side
            SourcePoll::Done,
        ],
    );

    let fixture = build_feed(
        false,
        one_am,
        StaticMapFiles::default(),
        StaticFactorFiles::default(),
        custom_sources,
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    let hours = Arc::new(live_feed::hours::presets::always_open());
    let config = SubscriptionConfig::new(
        universe_symbol,
        DataKind::Universe,
        Resolution::Daily,
        Arc::clone(&hours),
    );
    let request = SubscriptionRequest::universe(
        config,
        SecurityHandle::new(hours),
        utc(2020, 5, 31, 0, 0, 0),
        utc(2020, 12, 31, 0, 0, 0),
        UniverseKind::Coarse,
    );

    let outcome = fixture.feed.create_subscription(&request).unwrap();
    let subscription = outcome.subscription();

    // Let the exchange worker replay the source: one member per cycle,
    // then end-of-snapshot, which stops the bridge queue
    tokio::time::sleep(StdDuration::from_millis(50)).await;

    // 01:00 is outside (5, 23): no selection event
    assert!(subscription.move_next());
    assert!(subscription.current().is_none());

    // Saturday noon is also rejected
    fixture.frontier.set(utc(2020, 6, 6, 12, 0, 0));
    assert!(subscription.move_next());
    assert!(subscription.current().is_none());

    // Sunday 05:01 onwards is eligible: the whole snapshot fires as one
    // event, however many poll cycles its delivery took
    fixture.frontier.set(utc(2020, 6, 7, 5, 1, 0));
    let mut event = None;
    for _ in 0..200 {
        assert!(subscription.move_next());
        if let Some(point) = subscription.current() {
            event = Some(point);
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    let event = event.expect("selection fires");
    match event.value {
        DataValue::Collection(ref members) => assert_eq!(members.len(), 2),
        ref other => panic!("expected collection, got {:?}", other),
    }

    fixture.feed.exit();
}

// ---------------------------------------------------------------------------
// Scenario 6: exit with active custom-data iterators
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exit_stops_worker_and_ends_polled_subscriptions() {
    let now = utc(2020, 6, 1, 12, 0, 0);
    let a = Symbol::base("CUSTOM-A");
    let b = Symbol::base("CUSTOM-B");
    let custom_sources = ScriptedSourceFactory::default()
        .script(a.clone(), vec![])
        .script(b.clone(), vec![]);

    let fixture = build_feed(
        false,
        now,
        StaticMapFiles::default(),
        StaticFactorFiles::default(),
        custom_sources,
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    let hours = Arc::new(live_feed::hours::presets::always_open());
    let make_request = |symbol: &Symbol| {
        let config = SubscriptionConfig::new(
            symbol.clone(),
            DataKind::Custom,
            Resolution::Daily,
            Arc::clone(&hours),
        );
        SubscriptionRequest::new(
            config,
            SecurityHandle::new(Arc::clone(&hours)),
            utc(2020, 5, 31, 0, 0, 0),
            utc(2020, 12, 31, 0, 0, 0),
        )
    };

    let sub_a = Arc::clone(
        fixture
            .feed
            .create_subscription(&make_request(&a))
            .unwrap()
            .subscription(),
    );
    let sub_b = Arc::clone(
        fixture
            .feed
            .create_subscription(&make_request(&b))
            .unwrap()
            .subscription(),
    );
    assert_eq!(fixture.feed.subscription_count(), 2);

    fixture.feed.exit();
    assert_eq!(fixture.feed.state(), FeedState::Stopped);
    assert_eq!(fixture.feed.subscription_count(), 0);

    // Both bridge queues were stopped: no further points, ever
    assert!(!sub_a.move_next());
    assert!(!sub_b.move_next());

    // Exit is idempotent
    fixture.feed.exit();
    assert_eq!(fixture.feed.state(), FeedState::Stopped);
}

// ---------------------------------------------------------------------------
// Removal and error-path checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn removed_subscription_emits_nothing_further() {
    let now = utc(2020, 8, 31, 20, 0, 0);
    let fixture = build_feed(
        true,
        now,
        StaticMapFiles::default(),
        StaticFactorFiles::default(),
        ScriptedSourceFactory::default(),
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    let request = equity_request("SPY", utc(2020, 8, 31, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));
    let outcome = fixture.feed.create_subscription(&request).unwrap();
    let subscription = Arc::clone(outcome.subscription());
    let producer = fixture.handler.producer(&request.config);

    producer.enqueue(minute_bar(&Symbol::equity("SPY"), local(2020, 8, 31, 9, 30), dec!(330)));
    assert!(subscription.move_next());
    assert!(subscription.current().is_some());

    assert!(fixture.feed.remove_subscription(&request.config));
    // Producer callbacks still in flight are harmless no-ops
    producer.enqueue(minute_bar(&Symbol::equity("SPY"), local(2020, 8, 31, 9, 31), dec!(331)));
    assert!(!subscription.move_next());
    assert!(subscription.current().is_none());

    assert!(!fixture.feed.remove_subscription(&request.config));
    fixture.feed.exit();
}

#[tokio::test]
async fn producer_failure_stops_one_subscription_only() {
    let now = utc(2020, 8, 31, 20, 0, 0);
    let fixture = build_feed(
        true,
        now,
        StaticMapFiles::default(),
        StaticFactorFiles::default(),
        ScriptedSourceFactory::default(),
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    // Internal feed: one queue, no derived auxiliary streams
    let mut failing = equity_request("BAD", utc(2020, 8, 31, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));
    failing.config.is_internal_feed = true;
    let healthy = equity_request("SPY", utc(2020, 8, 31, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));

    let bad = fixture.feed.create_subscription(&failing).unwrap();
    let good = fixture.feed.create_subscription(&healthy).unwrap();

    fixture
        .handler
        .producer(&failing.config)
        .fail(FeedError::Producer {
            symbol: Symbol::equity("BAD"),
            reason: "socket closed".to_string(),
        });

    // The failed producer's queue is stopped; its subscription ends and
    // the stashed error is surfaced on the way out
    assert!(!bad.subscription().move_next());

    // The neighbouring subscription is unaffected
    fixture
        .handler
        .producer(&healthy.config)
        .enqueue(minute_bar(&Symbol::equity("SPY"), local(2020, 8, 31, 9, 30), dec!(330)));
    assert!(good.subscription().move_next());
    assert!(good.subscription().current().is_some());
    assert!(fixture.feed.is_active());

    fixture.feed.exit();
}

#[tokio::test]
async fn construction_failure_leaves_feed_active() {
    let now = utc(2020, 6, 1, 12, 0, 0);
    // Polled subscription with no registered source: construction fails
    let fixture = build_feed(
        false,
        now,
        StaticMapFiles::default(),
        StaticFactorFiles::default(),
        ScriptedSourceFactory::default(),
        TestAlgorithm {
            warming_up: false,
            history: None,
        },
        None,
    );

    let request = equity_request("SPY", utc(2020, 5, 31, 0, 0, 0), utc(2020, 12, 31, 0, 0, 0));
    let result = fixture.feed.create_subscription(&request);
    assert!(matches!(
        result,
        Err(FeedError::SubscriptionConstruction { .. })
    ));

    // The feed carries on and can create other subscriptions
    assert!(fixture.feed.is_active());
    assert_eq!(fixture.feed.subscription_count(), 0);
    fixture.feed.exit();
}

#[tokio::test]
async fn non_live_job_is_rejected() {
    let handler = Arc::new(FakeQueueHandler::default());
    let feed = LiveDataFeed::new();
    let result = feed.initialize(FeedContext {
        job_name: "backtest".to_string(),
        is_live: false,
        queue_handler: handler,
        channel_provider: Arc::new(StaticChannel { stream: true }),
        map_files: Arc::new(StaticMapFiles::default()),
        factor_files: Arc::new(StaticFactorFiles::default()),
        custom_sources: Arc::new(ScriptedSourceFactory::default()),
        historical_feed: None,
        algorithm: Arc::new(TestAlgorithm {
            warming_up: false,
            history: None,
        }),
        frontier: Arc::new(ManualTimeProvider::new(utc(2020, 6, 1, 0, 0, 0))),
        settings: FeedSettings::default(),
    });
    assert!(matches!(result, Err(FeedError::InvalidJob(_))));
    assert_eq!(feed.state(), FeedState::New);
}
