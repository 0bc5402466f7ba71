//! Concurrent execution of a download set.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::progress::{ProgressCounters, ProgressSummary};
use super::retry::RetryPolicy;
use super::state::{TransferReport, TransferState, TransferStatus};
use super::transport::Transport;
use super::worker::run_worker;
use crate::selection::DownloadSet;

/// Default concurrency when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tunables for a transfer run.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub retry: RetryPolicy,
    /// A body that yields nothing for this long counts as a transient failure.
    pub idle_timeout: Duration,
    /// How long cancelled workers get to flush before they are aborted.
    pub cancel_grace: Duration,
    /// Minimum bytes between two in-flight progress snapshots of one entry.
    pub progress_step_bytes: u64,
    /// Capacity of the snapshot channel.
    pub update_buffer: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            idle_timeout: Duration::from_secs(60),
            cancel_grace: Duration::from_secs(5),
            progress_step_bytes: 1024 * 1024,
            update_buffer: 64,
        }
    }
}

/// State shared by the coordinator and its workers for one run.
pub(super) struct RunContext<T> {
    pub(super) transport: Arc<T>,
    pub(super) set: Arc<DownloadSet>,
    pub(super) dest_root: PathBuf,
    pub(super) config: TransferConfig,
    pub(super) cancel: CancellationToken,
    queue: Mutex<VecDeque<usize>>,
    counters: Arc<ProgressCounters>,
    updates: mpsc::Sender<TransferState>,
}

impl<T> RunContext<T> {
    /// Next entry to work on, in set order; `None` once drained or cancelled.
    pub(super) fn next_index(&self) -> Option<usize> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.queue.lock().pop_front()
    }

    /// Record a snapshot and hand it to the consumer.
    ///
    /// Waits while the channel is full. A consumer that went away is not an
    /// error; the run winds down through cancellation instead.
    pub(super) async fn publish(&self, state: &TransferState) {
        self.counters.observe(state);
        let _ = self.updates.send(state.clone()).await;
    }
}

/// Runs download sets with a bounded pool of workers.
///
/// ```text
/// execute() ──► coordinator task
///                 ├── JoinSet of workers ◄── intake queue (entry indices)
///                 │        │
///                 │        └── TransferState ──► bounded channel ──► TransferStream
///                 └── on cancel: grace period, abort, report unfinished as pending
/// ```
pub struct DownloadOrchestrator<T> {
    transport: Arc<T>,
    config: TransferConfig,
}

impl<T: Transport> DownloadOrchestrator<T> {
    pub fn new(transport: T, config: TransferConfig) -> Self {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    pub fn with_shared_transport(transport: Arc<T>, config: TransferConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Start fetching `set` into `dest_root` with at most `concurrency` workers.
    ///
    /// Must be called inside a Tokio runtime. Work starts immediately; the
    /// returned stream yields a snapshot whenever an entry makes progress and
    /// ends once every worker has stopped. Dropping the stream cancels the run.
    pub fn execute(
        &self,
        set: DownloadSet,
        dest_root: impl Into<PathBuf>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> TransferStream {
        let set = Arc::new(set);
        let run_token = cancel.child_token();
        let counters = Arc::new(ProgressCounters::new(
            set.entries().iter().map(|e| e.object.size_bytes),
        ));
        let (updates, receiver) = mpsc::channel(self.config.update_buffer.max(1));

        let workers = concurrency.max(1).min(set.len());
        info!(
            target = %set.target(),
            entries = set.len(),
            bytes = set.total_bytes(),
            workers,
            "Starting transfer run"
        );

        let ctx = Arc::new(RunContext {
            transport: Arc::clone(&self.transport),
            set: Arc::clone(&set),
            dest_root: dest_root.into(),
            config: self.config.clone(),
            cancel: run_token.clone(),
            queue: Mutex::new((0..set.len()).collect()),
            counters: Arc::clone(&counters),
            updates,
        });
        tokio::spawn(coordinate(ctx, workers));

        TransferStream {
            receiver,
            set,
            counters,
            run_token,
        }
    }
}

async fn coordinate<T: Transport>(ctx: Arc<RunContext<T>>, workers: usize) {
    let mut pool = JoinSet::new();
    for _ in 0..workers {
        pool.spawn(run_worker(Arc::clone(&ctx)));
    }

    let cancelled = loop {
        tokio::select! {
            joined = pool.join_next() => match joined {
                None => break false,
                Some(Err(e)) if e.is_panic() => error!(error = %e, "Transfer worker panicked"),
                Some(_) => {}
            },
            _ = ctx.cancel.cancelled() => break true,
        }
    };

    if cancelled {
        let grace = tokio::time::sleep(ctx.config.cancel_grace);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                joined = pool.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
                _ = &mut grace => {
                    warn!(remaining = pool.len(), "Workers did not stop within the grace period, aborting");
                    pool.abort_all();
                    while pool.join_next().await.is_some() {}
                    break;
                }
            }
        }

        // Entries never started, or whose worker was aborted mid-transfer.
        for entry in ctx.set.entries() {
            match ctx.counters.status_of(entry.index) {
                None | Some(TransferStatus::InFlight) | Some(TransferStatus::Verifying) => {
                    let mut state = TransferState::pending(entry);
                    state.bytes_transferred = ctx.counters.bytes_of(entry.index);
                    ctx.publish(&state).await;
                }
                Some(_) => {}
            }
        }
    }

    let summary = ctx.counters.snapshot();
    info!(
        cancelled,
        done = summary.entries_done,
        failed = summary.entries_failed,
        total = summary.total_entries,
        bytes = summary.bytes_transferred,
        "Transfer run finished"
    );
}

/// Pull-based stream of [`TransferState`] snapshots for one run.
///
/// The stream is finite: it ends when every worker has stopped. Snapshots
/// of one entry arrive in the order they happened.
pub struct TransferStream {
    receiver: mpsc::Receiver<TransferState>,
    set: Arc<DownloadSet>,
    counters: Arc<ProgressCounters>,
    run_token: CancellationToken,
}

impl TransferStream {
    /// Ask workers to stop at the next chunk boundary.
    pub fn cancel(&self) {
        self.run_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.run_token.is_cancelled()
    }

    /// Aggregate progress right now, independent of consumed snapshots.
    pub fn progress(&self) -> ProgressSummary {
        self.counters.snapshot()
    }

    pub fn set(&self) -> &DownloadSet {
        &self.set
    }

    /// Consume the remaining snapshots and return the final state of every entry.
    pub async fn into_report(mut self) -> TransferReport {
        let mut states: Vec<TransferState> =
            self.set.entries().iter().map(TransferState::pending).collect();
        while let Some(state) = self.next().await {
            if let Some(slot) = states.get_mut(state.index) {
                *slot = state;
            }
        }
        TransferReport {
            states,
            cancelled: self.run_token.is_cancelled(),
        }
    }
}

impl Stream for TransferStream {
    type Item = TransferState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for TransferStream {
    fn drop(&mut self) {
        self.run_token.cancel();
    }
}
