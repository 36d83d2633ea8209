//! 提交模块：批次的最终去向（Quickwit ingest、内存、空实现）。
//!
//! # Commit Sinks
//!
//! A commit sink receives a finished NDJSON batch from the batcher and reports
//! how many records it accepted. The batcher treats every call as a single
//! fire-and-forget attempt: errors are logged and reported, never retried.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CommitSink`] | Trait for batch destinations |
//! | [`QuickwitCommitter`] | HTTP ingest into a Quickwit index |
//! | [`NoopCommitSink`] | Accepts and discards everything |
//! | [`InMemoryCommitSink`] | Keeps batches in memory, for tests and demos |

mod index;
mod quickwit;

pub use index::{index_config, DEFAULT_RETENTION_PERIOD};
pub use quickwit::{CommitterConfig, QuickwitCommitter};

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Destination for NDJSON batches.
///
/// `write` returns the number of records accepted. A sink that accepted only
/// part of a batch returns [`Error::PartialCommit`].
#[async_trait]
pub trait CommitSink: Send + Sync {
    async fn write(&self, ndjson: Bytes, record_count: usize) -> Result<usize>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// No-op sink.
pub struct NoopCommitSink;

#[async_trait]
impl CommitSink for NoopCommitSink {
    async fn write(&self, _: Bytes, record_count: usize) -> Result<usize> {
        Ok(record_count)
    }
}

/// A batch as received by [`InMemoryCommitSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedBatch {
    pub ndjson: Bytes,
    pub records: usize,
}

impl CommittedBatch {
    /// Lines of the batch, one per record.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.ndjson)
            .split('\n')
            .map(str::to_string)
            .collect()
    }
}

/// In-memory sink for testing.
#[derive(Default)]
pub struct InMemoryCommitSink {
    batches: Mutex<Vec<CommittedBatch>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryCommitSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<CommittedBatch> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait until at least `n` batches arrived. Returns `false` on timeout.
    pub async fn wait_for_batches(&self, n: usize, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CommittedBatch>> {
        // a panic while holding this lock cannot leave the Vec half-written
        self.batches.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl CommitSink for InMemoryCommitSink {
    async fn write(&self, ndjson: Bytes, record_count: usize) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.lock().push(CommittedBatch {
            ndjson,
            records: record_count,
        });
        self.notify.notify_waiters();
        Ok(record_count)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
