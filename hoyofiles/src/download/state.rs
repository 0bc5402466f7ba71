//! Per-entry transfer state and run reports.

use std::fmt;

use crate::selection::DownloadEntry;

/// Where an entry is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    Pending,
    InFlight,
    Verifying,
    Done,
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Done | TransferStatus::Failed)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            TransferStatus::Pending => 0,
            TransferStatus::InFlight => 1,
            TransferStatus::Verifying => 2,
            TransferStatus::Done => 3,
            TransferStatus::Failed => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TransferStatus::Pending),
            1 => Some(TransferStatus::InFlight),
            2 => Some(TransferStatus::Verifying),
            3 => Some(TransferStatus::Done),
            4 => Some(TransferStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransferStatus::Pending => "pending",
            TransferStatus::InFlight => "in flight",
            TransferStatus::Verifying => "verifying",
            TransferStatus::Done => "done",
            TransferStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Snapshot of one entry's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    /// Index of the entry in its [`crate::selection::DownloadSet`].
    pub index: usize,
    pub destination: String,
    pub status: TransferStatus,
    /// Bytes of the object present on disk, including resumed bytes.
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Attempts started so far; zero when the entry was already complete.
    pub attempt_count: u32,
    /// Last error, kept while retrying and on failure.
    pub error: Option<String>,
}

impl TransferState {
    pub fn pending(entry: &DownloadEntry) -> Self {
        Self {
            index: entry.index,
            destination: entry.destination.clone(),
            status: TransferStatus::Pending,
            bytes_transferred: 0,
            total_bytes: entry.object.size_bytes,
            attempt_count: 0,
            error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TransferStatus::Done
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransferStatus::Failed
    }

    /// Fraction complete in `0.0..=1.0`.
    pub fn progress_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.is_done() { 1.0 } else { 0.0 };
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Final state of every entry after a run.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// One state per entry, ordered by index.
    pub states: Vec<TransferState>,
    /// Whether the run was cancelled before finishing.
    pub cancelled: bool,
}

impl TransferReport {
    /// True when every entry is done.
    pub fn is_complete(&self) -> bool {
        self.states.iter().all(TransferState::is_done)
    }

    pub fn has_failures(&self) -> bool {
        self.states.iter().any(TransferState::is_failed)
    }

    pub fn done_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_done()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_failed()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| !s.status.is_terminal())
            .count()
    }

    /// States of failed entries.
    pub fn failed(&self) -> impl Iterator<Item = &TransferState> {
        self.states.iter().filter(|s| s.is_failed())
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.states.iter().map(|s| s.bytes_transferred).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.states.iter().map(|s| s.total_bytes).sum()
    }

    /// Progress as a percentage of bytes.
    pub fn progress_percent(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 {
            return if self.is_complete() { 100.0 } else { 0.0 };
        }
        (self.bytes_transferred() as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(index: usize, status: TransferStatus, bytes: u64, total: u64) -> TransferState {
        TransferState {
            index,
            destination: format!("f{}", index),
            status,
            bytes_transferred: bytes,
            total_bytes: total,
            attempt_count: 1,
            error: None,
        }
    }

    #[test]
    fn test_status_round_trips_through_u8() {
        for status in [
            TransferStatus::Pending,
            TransferStatus::InFlight,
            TransferStatus::Verifying,
            TransferStatus::Done,
            TransferStatus::Failed,
        ] {
            assert_eq!(TransferStatus::from_u8(status.as_u8()), Some(status));
        }
        assert_eq!(TransferStatus::from_u8(u8::MAX), None);
    }

    #[test]
    fn test_report_counts() {
        let report = TransferReport {
            states: vec![
                state(0, TransferStatus::Done, 100, 100),
                state(1, TransferStatus::Failed, 20, 50),
                state(2, TransferStatus::Pending, 0, 50),
            ],
            cancelled: true,
        };
        assert!(!report.is_complete());
        assert!(report.has_failures());
        assert_eq!(report.done_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.pending_count(), 1);
        assert_eq!(report.failed().next().unwrap().index, 1);
        assert!((report.progress_percent() - 60.0).abs() < 0.001);
    }

    #[test]
    fn test_progress_ratio_of_empty_object() {
        assert_eq!(state(0, TransferStatus::Done, 0, 0).progress_ratio(), 1.0);
        assert_eq!(state(0, TransferStatus::Pending, 0, 0).progress_ratio(), 0.0);
        assert_eq!(state(0, TransferStatus::InFlight, 25, 100).progress_ratio(), 0.25);
    }
}
