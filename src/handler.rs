//! Queue-handler contract and the subscriber adapter over it.
//!
//! The queue handler is the external push producer (broker or exchange
//! connection). `subscribe` hands back a pull stream whose upstream is the
//! producer's own bounded queue; the adapter here layers the equity
//! auxiliary streams (splits, dividends) on top and keeps unsubscription
//! symmetric with what was subscribed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::data::{DataKind, SecurityType, SubscriptionConfig, Symbol};
use crate::queue::DataNotifier;
use crate::stream::{DataPointStream, SynchronizedMerge};

/// External push producer (consumed contract).
pub trait DataQueueHandler: Send + Sync {
    /// Subscribe a configuration; the returned stream pulls from the
    /// producer's internal queue. `notifier` fires on new-data availability.
    fn subscribe(
        &self,
        config: &SubscriptionConfig,
        notifier: DataNotifier,
    ) -> Box<dyn DataPointStream>;

    /// Unsubscribe a configuration
    fn unsubscribe(&self, config: &SubscriptionConfig);

    /// Universe lookup capability, when the producer has one
    fn universe_provider(&self) -> Option<Arc<dyn UniverseProvider>> {
        None
    }
}

/// Chain/membership lookups for universe subscriptions (consumed contract).
pub trait UniverseProvider: Send + Sync {
    /// True when this provider can enumerate universes of the given type
    fn supports(&self, security_type: SecurityType) -> bool;

    /// Current members (contracts, constituents) of the universe symbol
    fn members(&self, symbol: &Symbol, at: DateTime<Utc>) -> Vec<Symbol>;
}

/// True for configurations that ride with derived split/dividend streams
fn wants_auxiliary(config: &SubscriptionConfig) -> bool {
    config.symbol.security_type == SecurityType::Equity && !config.is_internal_feed
}

/// Adapter over a [`DataQueueHandler`] that wires equity auxiliary streams
/// and mirrors them on unsubscribe.
#[derive(Clone)]
pub struct QueueHandlerSubscriber {
    handler: Arc<dyn DataQueueHandler>,
}

impl QueueHandlerSubscriber {
    pub fn new(handler: Arc<dyn DataQueueHandler>) -> Self {
        Self { handler }
    }

    /// The wrapped handler
    pub fn handler(&self) -> &Arc<dyn DataQueueHandler> {
        &self.handler
    }

    /// Subscribe the primary configuration; equity non-internal feeds also
    /// subscribe derived dividend and split configurations, merged so
    /// corporate actions precede same-bar price data.
    pub fn subscribe(
        &self,
        config: &SubscriptionConfig,
        notifier: DataNotifier,
    ) -> Box<dyn DataPointStream> {
        let main = self.handler.subscribe(config, Arc::clone(&notifier));
        if !wants_auxiliary(config) {
            return main;
        }

        debug!(symbol = %config.symbol, "subscribing derived split/dividend streams");
        let dividends = self
            .handler
            .subscribe(&config.derive_auxiliary(DataKind::Dividend), Arc::clone(&notifier));
        let splits = self
            .handler
            .subscribe(&config.derive_auxiliary(DataKind::Split), notifier);

        Box::new(SynchronizedMerge::with_auxiliary(
            main,
            vec![dividends, splits],
            config.data_time_zone,
        ))
    }

    /// Unsubscribe the primary configuration and any derived auxiliaries
    pub fn unsubscribe(&self, config: &SubscriptionConfig) {
        self.handler.unsubscribe(config);
        if wants_auxiliary(config) {
            self.handler
                .unsubscribe(&config.derive_auxiliary(DataKind::Dividend));
            self.handler
                .unsubscribe(&config.derive_auxiliary(DataKind::Split));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataKind, DataPoint, DataValue, Resolution, Symbol};
    use crate::hours::presets;
    use crate::queue::{BoundedDataQueue, QueueProducer};
    use chrono::{Duration, NaiveDate};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    /// In-memory handler: one bounded queue per subscribed configuration
    #[derive(Default)]
    struct FakeHandler {
        producers: Mutex<HashMap<SubscriptionConfig, QueueProducer>>,
        unsubscribed: Mutex<Vec<SubscriptionConfig>>,
    }

    impl FakeHandler {
        fn producer(&self, config: &SubscriptionConfig) -> QueueProducer {
            self.producers.lock().get(config).cloned().unwrap()
        }
    }

    impl DataQueueHandler for FakeHandler {
        fn subscribe(
            &self,
            config: &SubscriptionConfig,
            notifier: DataNotifier,
        ) -> Box<dyn DataPointStream> {
            let (producer, queue) = BoundedDataQueue::new(64, Some(notifier));
            self.producers.lock().insert(config.clone(), producer);
            Box::new(queue)
        }

        fn unsubscribe(&self, config: &SubscriptionConfig) {
            self.unsubscribed.lock().push(config.clone());
        }
    }

    fn equity_config() -> SubscriptionConfig {
        SubscriptionConfig::new(
            Symbol::equity("AAPL"),
            DataKind::TradeBar,
            Resolution::Minute,
            Arc::new(presets::us_equity()),
        )
    }

    fn noop_notifier() -> DataNotifier {
        Arc::new(|| {})
    }

    #[test]
    fn test_equity_subscribes_three_streams() {
        let handler = Arc::new(FakeHandler::default());
        let subscriber = QueueHandlerSubscriber::new(handler.clone());
        let _stream = subscriber.subscribe(&equity_config(), noop_notifier());
        assert_eq!(handler.producers.lock().len(), 3);
    }

    #[test]
    fn test_internal_feed_skips_auxiliary() {
        let handler = Arc::new(FakeHandler::default());
        let subscriber = QueueHandlerSubscriber::new(handler.clone());
        let config = equity_config().with_internal_feed(true);
        let _stream = subscriber.subscribe(&config, noop_notifier());
        assert_eq!(handler.producers.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_mirrors_derivation() {
        let handler = Arc::new(FakeHandler::default());
        let subscriber = QueueHandlerSubscriber::new(handler.clone());
        let config = equity_config();
        let _stream = subscriber.subscribe(&config, noop_notifier());

        subscriber.unsubscribe(&config);
        let unsubscribed = handler.unsubscribed.lock();
        assert_eq!(unsubscribed.len(), 3);
        assert!(unsubscribed.iter().any(|c| c.data_kind == DataKind::Split));
        assert!(unsubscribed.iter().any(|c| c.data_kind == DataKind::Dividend));
    }

    #[test]
    fn test_split_precedes_same_bar_trade() {
        let handler = Arc::new(FakeHandler::default());
        let subscriber = QueueHandlerSubscriber::new(handler.clone());
        let config = equity_config();
        let mut stream = subscriber.subscribe(&config, noop_notifier());

        let start = NaiveDate::from_ymd_opt(2020, 8, 31)
            .unwrap()
            .and_hms_opt(9, 29, 0)
            .unwrap();
        let bar = DataPoint::bar(
            Symbol::equity("AAPL"),
            start,
            Duration::minutes(1),
            DataValue::flat_bar(dec!(500)),
        );
        let split = DataPoint::instantaneous(
            Symbol::equity("AAPL"),
            start + Duration::minutes(1),
            DataValue::Auxiliary(crate::data::AuxiliaryEvent::Split {
                split_factor: dec!(0.25),
            }),
        );

        handler.producer(&config).enqueue(bar);
        handler
            .producer(&config.derive_auxiliary(DataKind::Split))
            .enqueue(split);

        assert!(stream.move_next());
        assert!(stream.current().unwrap().value.is_auxiliary());
        assert!(stream.move_next());
        assert!(!stream.current().unwrap().value.is_auxiliary());
    }
}
