use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use tracing::{debug, info};

/// Run events emitted by the dispatcher.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted { total: u64 },
    ItemStarted { source_path: PathBuf },
    ItemFinished {
        source_path: PathBuf,
        succeeded: bool,
        rows: u64,
        completed: u64,
        total: u64,
    },
    RunFinished { summary: RunSummary },
}

/// Observer hook for run events. Called on worker threads; must not block.
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Logs an `n/N` progress line per finished item at info level, other run events at debug.
#[derive(Debug, Default)]
pub struct LogRunObserver;

impl RunObserver for LogRunObserver {
    fn on_event(&self, event: &RunEvent) {
        match ProgressUpdate::from_event(event) {
            Some(update) => info!(
                path = %update.source_path.display(),
                succeeded = update.succeeded,
                "progress {}/{}",
                update.completed,
                update.total
            ),
            None => debug!(?event, "run event"),
        }
    }
}

/// One progress tick, published once per finished work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub source_path: PathBuf,
    pub succeeded: bool,
    pub completed: u64,
    pub total: u64,
}

impl ProgressUpdate {
    /// The progress tick carried by `event`, if it is an `ItemFinished`.
    pub fn from_event(event: &RunEvent) -> Option<Self> {
        match event {
            RunEvent::ItemFinished {
                source_path,
                succeeded,
                completed,
                total,
                ..
            } => Some(Self {
                source_path: source_path.clone(),
                succeeded: *succeeded,
                completed: *completed,
                total: *total,
            }),
            _ => None,
        }
    }
}

/// Publishes [`ProgressUpdate`]s to a bounded channel.
///
/// Sends never block: when the subscriber is slow and the channel is full, or when the
/// receiver is gone, the update is dropped. [`RunMetrics`] stays authoritative.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    tx: Sender<ProgressUpdate>,
}

impl ProgressChannel {
    /// Create the observer and its receiving end with room for `capacity` pending updates.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProgressUpdate>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl RunObserver for ProgressChannel {
    fn on_event(&self, event: &RunEvent) {
        if let Some(update) = ProgressUpdate::from_event(event) {
            // Full or disconnected: drop the tick.
            let _ = self.tx.try_send(update);
        }
    }
}

/// Live counters for a run.
///
/// Workers update these as items finish; callers can snapshot them at any time. `completed`
/// is the progress counter: it moves by exactly one per work item, success or failure.
pub struct RunMetrics {
    elapsed_ns: AtomicU64,

    total: AtomicU64,
    completed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rows_loaded: AtomicU64,
    tables_created: AtomicU64,

    active_items: AtomicUsize,
    max_active_items: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            elapsed_ns: AtomicU64::new(0),
            total: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rows_loaded: AtomicU64::new(0),
            tables_created: AtomicU64::new(0),
            active_items: AtomicUsize::new(0),
            max_active_items: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self, total: u64) {
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.succeeded.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.rows_loaded.store(0, Ordering::SeqCst);
        self.tables_created.store(0, Ordering::SeqCst);
        self.active_items.store(0, Ordering::SeqCst);
        self.max_active_items.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_item_start(&self) {
        let now = self.active_items.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_items, now);
    }

    /// Record a loaded file. Returns the new progress count.
    pub fn on_item_success(&self, rows: u64, table_created: bool) -> u64 {
        let _ = self.succeeded.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_loaded.fetch_add(rows, Ordering::SeqCst);
        if table_created {
            let _ = self.tables_created.fetch_add(1, Ordering::SeqCst);
        }
        self.finish_item()
    }

    /// Record a failed file. Returns the new progress count.
    pub fn on_item_failure(&self) -> u64 {
        let _ = self.failed.fetch_add(1, Ordering::SeqCst);
        self.finish_item()
    }

    fn finish_item(&self) -> u64 {
        let _ = self.active_items.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Work items finished so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Work items in this run.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RunSummary {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        RunSummary {
            total: self.total.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            rows_loaded: self.rows_loaded.load(Ordering::SeqCst),
            tables_created: self.tables_created.load(Ordering::SeqCst),
            max_active_items: self.max_active_items.load(Ordering::SeqCst),
            elapsed,
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`RunMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rows_loaded: u64,
    pub tables_created: u64,
    pub max_active_items: usize,
    pub elapsed: Option<Duration>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={}/{}, succeeded={}, failed={}, rows_loaded={}, tables_created={}, max_active_items={}, elapsed={:?}",
            self.completed,
            self.total,
            self.succeeded,
            self.failed,
            self.rows_loaded,
            self.tables_created,
            self.max_active_items,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_channel_drops_updates_instead_of_blocking() {
        let (observer, rx) = ProgressChannel::bounded(1);
        for completed in 1..=3 {
            observer.on_event(&RunEvent::ItemFinished {
                source_path: PathBuf::from("a.csv"),
                succeeded: true,
                rows: 1,
                completed,
                total: 3,
            });
        }
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].completed, 1);

        drop(rx);
        observer.on_event(&RunEvent::ItemFinished {
            source_path: PathBuf::from("b.csv"),
            succeeded: false,
            rows: 0,
            completed: 4,
            total: 4,
        });
    }

    #[test]
    fn only_finished_items_produce_progress_ticks() {
        let finished = RunEvent::ItemFinished {
            source_path: PathBuf::from("c.csv"),
            succeeded: false,
            rows: 0,
            completed: 2,
            total: 3,
        };
        assert_eq!(
            ProgressUpdate::from_event(&finished),
            Some(ProgressUpdate {
                source_path: PathBuf::from("c.csv"),
                succeeded: false,
                completed: 2,
                total: 3,
            })
        );
        assert_eq!(ProgressUpdate::from_event(&RunEvent::RunStarted { total: 3 }), None);
        assert_eq!(
            ProgressUpdate::from_event(&RunEvent::ItemStarted {
                source_path: PathBuf::from("c.csv"),
            }),
            None
        );
        // Logs at info without panicking for every event kind.
        LogRunObserver.on_event(&finished);
        LogRunObserver.on_event(&RunEvent::RunStarted { total: 3 });
    }

    #[test]
    fn metrics_count_every_item_once() {
        let m = RunMetrics::new();
        m.begin_run(3);
        m.on_item_start();
        m.on_item_start();
        assert_eq!(m.on_item_success(50, true), 1);
        assert_eq!(m.on_item_failure(), 2);
        m.on_item_start();
        assert_eq!(m.on_item_success(0, false), 3);
        m.end_run(Duration::from_millis(5));

        let s = m.snapshot();
        assert_eq!((s.total, s.completed, s.succeeded, s.failed), (3, 3, 2, 1));
        assert_eq!(s.rows_loaded, 50);
        assert_eq!(s.tables_created, 1);
        assert_eq!(s.max_active_items, 2);
        assert!(s.elapsed.is_some());
    }
}
