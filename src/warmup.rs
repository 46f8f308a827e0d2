//! Warmup planning: bounded historical replay spliced ahead of live data.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::data::{DataPoint, SubscriptionRequest};
use crate::providers::{Algorithm, HistoricalFeedFactory, HistoryRequest};
use crate::settings::FeedSettings;
use crate::stream::{Concat, DataPointStream, PredicateFilter, VecStream};

/// Splices warmup replay in front of a live stream.
///
/// Stage order is file-based replay, then the history provider, then the
/// live tail; concat disposes each finished stage and never reverts once
/// the tail drives the stream. The history-provider window is clamped to
/// the configured look-back; file-based replay is unclamped. A failing
/// branch is skipped with a warning; warmup is best-effort and the live
/// tail always survives.
pub struct WarmupPlanner {
    settings: FeedSettings,
    algorithm: Arc<dyn Algorithm>,
    historical_feed: Option<Arc<dyn HistoricalFeedFactory>>,
}

impl WarmupPlanner {
    pub fn new(
        settings: FeedSettings,
        algorithm: Arc<dyn Algorithm>,
        historical_feed: Option<Arc<dyn HistoricalFeedFactory>>,
    ) -> Self {
        Self {
            settings,
            algorithm,
            historical_feed,
        }
    }

    /// Attach warmup stages ahead of `live` if the algorithm is warming up
    /// and the request covers at least one tradable day; otherwise the live
    /// stream is returned unchanged.
    pub fn attach(
        &self,
        request: &SubscriptionRequest,
        now_utc: DateTime<Utc>,
        live: Box<dyn DataPointStream>,
    ) -> Box<dyn DataPointStream> {
        if !self.algorithm.is_warming_up() {
            return live;
        }

        let hours = &request.security.hours;
        let start_date = request.start_utc.date_naive();
        let end_date = now_utc.min(request.end_utc).date_naive() + Duration::days(1);
        if !hours.has_trading_days(start_date, end_date) {
            debug!(
                symbol = %request.config.symbol,
                "warmup window has no tradable days, returning live stream unchanged"
            );
            return live;
        }

        let data_tz = request.config.data_time_zone;
        let mut stages: Vec<Box<dyn DataPointStream>> = Vec::new();

        if let Some(stage) = self.file_stage(request, now_utc, data_tz) {
            stages.push(stage);
        }
        if let Some(stage) = self.history_stage(request, now_utc, data_tz) {
            stages.push(stage);
        }

        if stages.is_empty() {
            return live;
        }
        stages.push(live);
        Box::new(Concat::new(stages))
    }

    /// File-based replay over the full request window, filtered against
    /// fill-forward and future points.
    fn file_stage(
        &self,
        request: &SubscriptionRequest,
        now_utc: DateTime<Utc>,
        data_tz: Tz,
    ) -> Option<Box<dyn DataPointStream>> {
        let factory = self.historical_feed.as_ref()?;
        match factory.create(&request.config, request.start_utc, now_utc) {
            Ok(stream) => Some(Box::new(PredicateFilter::new(
                stream,
                Arc::new(move |point: &DataPoint| {
                    !point.is_fill_forward && point.end_time_utc(data_tz) <= now_utc
                }),
            ))),
            Err(err) => {
                warn!(
                    symbol = %request.config.symbol,
                    error = %err,
                    "file-based warmup failed, skipping that branch"
                );
                None
            }
        }
    }

    /// History-provider replay over the clamped look-back window, filtered
    /// against future points.
    fn history_stage(
        &self,
        request: &SubscriptionRequest,
        now_utc: DateTime<Utc>,
        data_tz: Tz,
    ) -> Option<Box<dyn DataPointStream>> {
        let provider = self.algorithm.history_provider()?;
        let look_back = Duration::days(self.settings.max_warmup_history_days_look_back);
        let clamped_start = request.start_utc.max(now_utc - look_back);
        if clamped_start >= now_utc {
            return None;
        }

        let history_request = HistoryRequest::new(
            request.config.symbol.clone(),
            request.config.resolution,
            clamped_start,
            now_utc,
            data_tz,
        );
        match provider.get_history(&[history_request], self.algorithm.time_zone()) {
            Ok(points) => {
                debug!(
                    symbol = %request.config.symbol,
                    count = points.len(),
                    "history warmup fetched"
                );
                Some(Box::new(PredicateFilter::new(
                    Box::new(VecStream::new(points)),
                    Arc::new(move |point: &DataPoint| point.end_time_utc(data_tz) <= now_utc),
                )))
            }
            Err(err) => {
                warn!(
                    symbol = %request.config.symbol,
                    error = %err,
                    "history warmup failed, skipping that branch"
                );
                None
            }
        }
    }
}
