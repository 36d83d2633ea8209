//! Delivery reports and batcher counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// What caused a batch to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
    /// The pending batch reached `max_bytes`.
    Size,
    /// No entry arrived within `commit_timeout`.
    Timeout,
    /// The queue was closed and drained.
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Timeout => "timeout",
            FlushTrigger::Shutdown => "shutdown",
        })
    }
}

/// Outcome of one commit attempt, sent to an opted-in observer.
///
/// The batcher never retries; a report with an `Err` outcome is the only trace
/// a failed batch leaves besides the warning log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub records: usize,
    pub bytes: usize,
    pub trigger: FlushTrigger,
    /// Records accepted by the sink, or the sink's error message.
    pub outcome: Result<usize, String>,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherSnapshot {
    pub flushes: u64,
    pub records_flushed: u64,
    /// Records the sink reported as accepted (including partial commits).
    pub records_accepted: u64,
    pub commit_failures: u64,
    /// Entries skipped because they could not be encoded.
    pub encode_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct BatchStats {
    flushes: AtomicU64,
    records_flushed: AtomicU64,
    records_accepted: AtomicU64,
    commit_failures: AtomicU64,
    encode_failures: AtomicU64,
}

impl BatchStats {
    pub(crate) fn record_flush(&self, records: usize, accepted: usize, failed: bool) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_flushed
            .fetch_add(records as u64, Ordering::Relaxed);
        self.records_accepted
            .fetch_add(accepted as u64, Ordering::Relaxed);
        if failed {
            self.commit_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BatcherSnapshot {
        BatcherSnapshot {
            flushes: self.flushes.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
        }
    }
}
