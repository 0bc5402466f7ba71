//! Concurrent, resumable, verified downloads.
//!
//! This module provides:
//! - The [`Transport`] seam and its reqwest implementation (`transport`)
//! - Per-entry lifecycle snapshots and run reports (`state`)
//! - Lock-free aggregate progress (`progress`)
//! - Retry budgets with exponential backoff (`retry`)
//! - The worker pool and its output stream (`orchestrator`)
//!
//! Every entry goes pending → inFlight → verifying → done, or ends failed.
//! Bytes land in `<destination>.part` and are renamed only after the size
//! and checksum match, so a file at its final path is always complete.

mod orchestrator;
mod progress;
mod retry;
mod state;
mod transport;
mod worker;

pub use orchestrator::{DownloadOrchestrator, TransferConfig, TransferStream, DEFAULT_CONCURRENCY};
pub use progress::{ProgressCounters, ProgressSummary};
pub use retry::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};
pub use state::{TransferReport, TransferState, TransferStatus};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
pub use worker::PART_SUFFIX;
