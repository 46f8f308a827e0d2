//! Bounded push-to-pull queue bridge.
//!
//! Producer callbacks enqueue on one side; the subscription's pull chain
//! drains the other. Buffering is bounded: a full queue blocks the producer
//! briefly, then drops the newest point with a warning. Accepted points are
//! never reordered. A stop sentinel ends the stream: pushes after `stop`
//! are silent no-ops and `move_next` returns `false` once drained.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::data::DataPoint;
use crate::error::FeedError;
use crate::stream::DataPointStream;

/// Fired after each successful enqueue to wake the owning subscription
pub type DataNotifier = Arc<dyn Fn() + Send + Sync>;

/// How long a producer blocks on a full queue before dropping the new point
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(100);

struct QueueState {
    items: VecDeque<DataPoint>,
    stopped: bool,
    error: Option<FeedError>,
}

struct QueueShared {
    state: Mutex<QueueState>,
    space: Condvar,
    capacity: usize,
    on_data: Option<DataNotifier>,
}

/// Producer side of the bridge. Clone freely into callbacks.
#[derive(Clone)]
pub struct QueueProducer {
    shared: Arc<QueueShared>,
}

impl QueueProducer {
    /// Append a point. Blocks briefly on backpressure; drops the point with
    /// a warning if the queue is still full. No-op after `stop`.
    pub fn enqueue(&self, point: DataPoint) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        if state.items.len() >= self.shared.capacity {
            self.shared.space.wait_for(&mut state, BACKPRESSURE_WAIT);
            if state.stopped {
                return;
            }
            if state.items.len() >= self.shared.capacity {
                warn!(
                    symbol = %point.symbol,
                    capacity = self.shared.capacity,
                    "bounded queue full, dropping newest point"
                );
                return;
            }
        }
        state.items.push_back(point);
        drop(state);
        if let Some(on_data) = &self.shared.on_data {
            on_data();
        }
    }

    /// Mark the end of the stream. Idempotent.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        drop(state);
        self.shared.space.notify_all();
        debug!("bounded queue stopped");
        if let Some(on_data) = &self.shared.on_data {
            on_data();
        }
    }

    /// Record a producer failure: stops the queue, fires the notifier, and
    /// stashes a one-shot error record the consumer side surfaces through
    /// [`DataPointStream::take_error`].
    pub fn fail(&self, error: FeedError) {
        {
            let mut state = self.shared.state.lock();
            if state.error.is_none() {
                state.error = Some(error);
            }
        }
        self.stop();
    }

    /// True once the stream has been stopped
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }
}

/// Consumer side of the bridge; a [`DataPointStream`] over the queue.
pub struct BoundedDataQueue {
    shared: Arc<QueueShared>,
    current: Option<DataPoint>,
}

impl BoundedDataQueue {
    /// Create a bridge with the given capacity; the notifier fires after
    /// each successful enqueue.
    pub fn new(capacity: usize, on_data: Option<DataNotifier>) -> (QueueProducer, Self) {
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                stopped: false,
                error: None,
            }),
            space: Condvar::new(),
            capacity,
            on_data,
        });
        (
            QueueProducer {
                shared: Arc::clone(&shared),
            },
            Self {
                shared,
                current: None,
            },
        )
    }

}

impl DataPointStream for BoundedDataQueue {
    fn move_next(&mut self) -> bool {
        let mut state = self.shared.state.lock();
        match state.items.pop_front() {
            Some(point) => {
                drop(state);
                self.shared.space.notify_one();
                self.current = Some(point);
                true
            }
            None => {
                self.current = None;
                !state.stopped
            }
        }
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn take_error(&mut self) -> Option<FeedError> {
        self.shared.state.lock().error.take()
    }
}
