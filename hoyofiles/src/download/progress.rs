//! Aggregate progress shared between workers and the stream consumer.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use super::state::{TransferState, TransferStatus};

/// Point-in-time totals for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSummary {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub entries_done: usize,
    pub entries_failed: usize,
    pub total_entries: usize,
}

impl ProgressSummary {
    pub fn entries_finished(&self) -> usize {
        self.entries_done + self.entries_failed
    }
}

/// Status value of an entry no snapshot has been published for yet.
const UNREPORTED: u8 = u8::MAX;

/// Lock-free per-entry counters.
///
/// Each entry is written only by the worker that owns it; readers may see
/// a slightly stale mix of entries but never a torn value.
#[derive(Debug)]
pub struct ProgressCounters {
    entry_bytes: Vec<AtomicU64>,
    entry_status: Vec<AtomicU8>,
    total_bytes: u64,
    done: AtomicUsize,
    failed: AtomicUsize,
}

impl ProgressCounters {
    pub fn new(entry_sizes: impl IntoIterator<Item = u64>) -> Self {
        let sizes: Vec<u64> = entry_sizes.into_iter().collect();
        Self {
            entry_bytes: sizes.iter().map(|_| AtomicU64::new(0)).collect(),
            entry_status: sizes
                .iter()
                .map(|_| AtomicU8::new(UNREPORTED))
                .collect(),
            total_bytes: sizes.iter().sum(),
            done: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Record a snapshot published by the owning worker.
    pub fn observe(&self, state: &TransferState) {
        let Some(bytes) = self.entry_bytes.get(state.index) else {
            return;
        };
        bytes.store(state.bytes_transferred, Ordering::Relaxed);

        let previous = TransferStatus::from_u8(
            self.entry_status[state.index].swap(state.status.as_u8(), Ordering::AcqRel),
        );
        if previous != Some(state.status) {
            match state.status {
                TransferStatus::Done => {
                    self.done.fetch_add(1, Ordering::AcqRel);
                }
                TransferStatus::Failed => {
                    self.failed.fetch_add(1, Ordering::AcqRel);
                }
                _ => {}
            }
        }
    }

    /// Last published status of an entry; `None` if nothing was published yet.
    pub fn status_of(&self, index: usize) -> Option<TransferStatus> {
        self.entry_status
            .get(index)
            .and_then(|s| TransferStatus::from_u8(s.load(Ordering::Acquire)))
    }

    pub fn bytes_of(&self, index: usize) -> u64 {
        self.entry_bytes
            .get(index)
            .map(|b| b.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> ProgressSummary {
        ProgressSummary {
            bytes_transferred: self
                .entry_bytes
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .sum(),
            total_bytes: self.total_bytes,
            entries_done: self.done.load(Ordering::Acquire),
            entries_failed: self.failed.load(Ordering::Acquire),
            total_entries: self.entry_bytes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(index: usize, status: TransferStatus, bytes: u64) -> TransferState {
        TransferState {
            index,
            destination: String::new(),
            status,
            bytes_transferred: bytes,
            total_bytes: 100,
            attempt_count: 1,
            error: None,
        }
    }

    #[test]
    fn test_aggregates_bytes_and_terminal_counts() {
        let counters = ProgressCounters::new([100, 50]);
        assert_eq!(counters.status_of(0), None);
        counters.observe(&state(0, TransferStatus::InFlight, 40));
        counters.observe(&state(1, TransferStatus::InFlight, 10));

        let summary = counters.snapshot();
        assert_eq!(summary.bytes_transferred, 50);
        assert_eq!(summary.total_bytes, 150);
        assert_eq!(summary.entries_finished(), 0);

        counters.observe(&state(0, TransferStatus::Done, 100));
        counters.observe(&state(0, TransferStatus::Done, 100));
        counters.observe(&state(1, TransferStatus::Failed, 10));

        let summary = counters.snapshot();
        assert_eq!(summary.entries_done, 1);
        assert_eq!(summary.entries_failed, 1);
        assert_eq!(counters.status_of(0), Some(TransferStatus::Done));
        assert_eq!(counters.bytes_of(1), 10);
    }

    #[test]
    fn test_out_of_range_index_ignored() {
        let counters = ProgressCounters::new([1]);
        counters.observe(&state(7, TransferStatus::Done, 1));
        assert_eq!(counters.snapshot().entries_done, 0);
        assert_eq!(counters.status_of(7), None);
    }
}
