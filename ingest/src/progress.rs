//! Rate-limited progress reporting.
//!
//! Workers never run the caller's callback. They publish the latest counts
//! into a `watch` channel, at most once per interval, and a forwarding task
//! hands them to the callback. A slow callback only makes updates coalesce.
//! One final report is delivered when the run ends.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Files scheduled so far and files finished so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub files_found: usize,
    pub files_processed: usize,
}

type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Caller-supplied progress callback plus its throttle interval.
///
/// The callback runs on a dedicated forwarding task, never on an ingestion worker.
#[derive(Clone)]
pub struct ProgressSink {
    callback: ProgressCallback,
    interval: Duration,
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ProgressSink {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(callback: impl Fn(ProgressSnapshot) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    /// Sink that publishes into a `watch` channel; sending never blocks.
    #[must_use]
    pub fn watch() -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let sink = Self::new(move |snapshot| {
            tx.send_replace(snapshot);
        });
        (sink, rx)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

const NEVER: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, Default)]
struct Emission {
    snapshot: ProgressSnapshot,
    last: bool,
}

/// Channel from the workers to the task that runs the callback.
#[derive(Debug)]
struct Delivery {
    tx: watch::Sender<Emission>,
    interval: Duration,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl Delivery {
    /// Spawns the forwarding task. Must be called inside a tokio runtime.
    fn spawn(sink: ProgressSink) -> Self {
        let ProgressSink { callback, interval } = sink;
        let (tx, mut rx) = watch::channel(Emission::default());
        let forwarder = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let emission = *rx.borrow_and_update();
                callback(emission.snapshot);
                if emission.last {
                    break;
                }
            }
        });
        Self {
            tx,
            interval,
            forwarder: Mutex::new(Some(forwarder)),
        }
    }
}

/// Per-run counters feeding an optional [`ProgressSink`].
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    delivery: Option<Delivery>,
    started: Instant,
    last_emit_ms: AtomicU64,
    found: AtomicUsize,
    processed: AtomicUsize,
}

impl ProgressTracker {
    pub(crate) fn new(sink: Option<ProgressSink>) -> Self {
        Self {
            delivery: sink.map(Delivery::spawn),
            started: Instant::now(),
            last_emit_ms: AtomicU64::new(NEVER),
            found: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn file_found(&self) {
        self.found.fetch_add(1, Ordering::Relaxed);
        self.maybe_emit();
    }

    pub(crate) fn file_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.maybe_emit();
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_found: self.found.load(Ordering::Relaxed),
            files_processed: self.processed.load(Ordering::Relaxed),
        }
    }

    fn maybe_emit(&self) {
        let Some(delivery) = &self.delivery else {
            return;
        };
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_emit_ms.load(Ordering::Relaxed);
        if last != NEVER && now.saturating_sub(last) < delivery.interval.as_millis() as u64 {
            return;
        }
        // Only the worker that wins the swap publishes for this window.
        if self
            .last_emit_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            delivery.tx.send_replace(Emission {
                snapshot: self.snapshot(),
                last: false,
            });
        }
    }

    /// Publishes the final counts and waits until the callback has seen them.
    pub(crate) async fn finish(&self) {
        let Some(delivery) = &self.delivery else {
            return;
        };
        delivery.tx.send_replace(Emission {
            snapshot: self.snapshot(),
            last: true,
        });
        let forwarder = delivery
            .forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(forwarder) = forwarder
            && let Err(err) = forwarder.await
        {
            tracing::warn!(error = %err, "Progress callback task failed");
        }
    }
}
