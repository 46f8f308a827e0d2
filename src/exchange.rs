//! Custom-data exchange: cooperative polling of slow or file-backed
//! sources on one shared worker.
//!
//! Sources that cannot push (periodic files, rate-limited vendor APIs,
//! spoofed universe tick generators) register here. A single tokio worker
//! pulls each registered source at most once per sleep cycle and hands
//! produced points to the entry's `on_data` callback, which typically
//! enqueues into that subscription's bounded queue. Individual pulls must
//! not block indefinitely; a failing source is logged and retried next
//! cycle unless its error is terminal.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::data::{DataPoint, Symbol};
use crate::error::{ErrorClassification, FeedResult};

/// Result of pulling a custom data source once
pub enum SourcePoll {
    /// A point was produced
    Point(DataPoint),
    /// Nothing available this cycle
    Pending,
    /// The source is finished for good
    Done,
}

/// A pollable producer of data points.
///
/// `pull` is invoked from the shared exchange worker; implementations must
/// return promptly (read a file, check a clock, drain an internal buffer)
/// rather than block on I/O for the whole cycle.
pub trait CustomDataSource: Send {
    fn pull(&mut self) -> FeedResult<SourcePoll>;
}

/// Receives points produced by a registered source
pub type PointHandler = Arc<dyn Fn(DataPoint) + Send + Sync>;

/// Fired once when a registered source finishes
pub type FinishedNotifier = Arc<dyn Fn() + Send + Sync>;

struct ExchangeEntry {
    source: Mutex<Box<dyn CustomDataSource>>,
    on_data: PointHandler,
    on_finished: FinishedNotifier,
}

struct ExchangeInner {
    entries: DashMap<Symbol, ExchangeEntry>,
    sleep_interval: Duration,
    shutdown: Mutex<Option<broadcast::Sender<()>>>,
}

impl ExchangeInner {
    /// Pull every registered source at most once
    fn poll_cycle(&self) {
        let symbols: Vec<Symbol> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut finished: Vec<Symbol> = Vec::new();

        for symbol in symbols {
            let Some(entry) = self.entries.get(&symbol) else {
                continue;
            };
            let result = entry.source.lock().pull();
            match result {
                Ok(SourcePoll::Point(point)) => (entry.on_data)(point),
                Ok(SourcePoll::Pending) => {}
                Ok(SourcePoll::Done) => {
                    debug!(%symbol, "custom data source finished");
                    (entry.on_finished)();
                    finished.push(symbol);
                }
                Err(err) if err.is_terminal() => {
                    warn!(%symbol, error = %err, "custom data source failed terminally");
                    (entry.on_finished)();
                    finished.push(symbol);
                }
                Err(err) => {
                    warn!(%symbol, error = %err, "custom data source pull failed, will retry");
                }
            }
        }

        for symbol in finished {
            self.entries.remove(&symbol);
        }
    }
}

/// Shared background poller for custom data sources.
///
/// Cloning is cheap and shares the registry and worker.
#[derive(Clone)]
pub struct CustomDataExchange {
    inner: Arc<ExchangeInner>,
}

impl CustomDataExchange {
    pub fn new(sleep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ExchangeInner {
                entries: DashMap::new(),
                sleep_interval,
                shutdown: Mutex::new(None),
            }),
        }
    }

    /// Register a source. `on_data` receives produced points; `on_finished`
    /// fires once when the source ends (or fails terminally).
    pub fn add(
        &self,
        symbol: Symbol,
        source: Box<dyn CustomDataSource>,
        on_data: PointHandler,
        on_finished: FinishedNotifier,
    ) {
        debug!(%symbol, "registering custom data source");
        self.inner.entries.insert(
            symbol,
            ExchangeEntry {
                source: Mutex::new(source),
                on_data,
                on_finished,
            },
        );
    }

    /// Remove a source without firing its finished hook
    pub fn remove(&self, symbol: &Symbol) -> bool {
        self.inner.entries.remove(symbol).is_some()
    }

    /// True while the worker task is running
    pub fn is_running(&self) -> bool {
        self.inner.shutdown.lock().is_some()
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// True when no sources are registered
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Spawn the worker task. Idempotent; requires a tokio runtime.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let mut shutdown = self.inner.shutdown.lock();
        if shutdown.is_some() {
            return None;
        }
        let (tx, mut rx) = broadcast::channel(1);
        *shutdown = Some(tx);
        drop(shutdown);

        let inner = Arc::clone(&self.inner);
        info!(
            interval_ms = inner.sleep_interval.as_millis() as u64,
            "custom data exchange worker started"
        );
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tokio::time::sleep(inner.sleep_interval) => inner.poll_cycle(),
                }
            }
            info!("custom data exchange worker stopped");
        }))
    }

    /// Signal every registered source to finish and stop the worker.
    /// Drains no data. Idempotent.
    pub fn stop(&self) {
        let sender = self.inner.shutdown.lock().take();
        if sender.is_none() && self.inner.entries.is_empty() {
            return;
        }

        let symbols: Vec<Symbol> = self.inner.entries.iter().map(|e| e.key().clone()).collect();
        for symbol in symbols {
            if let Some((_, entry)) = self.inner.entries.remove(&symbol) {
                (entry.on_finished)();
            }
        }

        if let Some(sender) = sender {
            // Worker may have already exited; nothing to do then
            let _ = sender.send(());
        }
    }
}
