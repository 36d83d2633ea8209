//! The batching engine.

use super::accumulator::NdjsonAccumulator;
use super::config::BatchConfig;
use super::report::{BatchStats, BatcherSnapshot, DeliveryReport, FlushTrigger};
use crate::commit::CommitSink;
use crate::entry::Entry;
use crate::{Error, ErrorContext, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Holds pending entries and commits them to a [`CommitSink`] in NDJSON
/// batches, aggregating many records into a single ingest request.
///
/// A batch is committed when its encoded size reaches
/// [`BatchConfig::max_bytes`] or when no entry arrived for
/// [`BatchConfig::commit_timeout`].
///
/// - Before [`run`](Self::run), writes are queued but nothing is committed.
/// - [`write`](Self::write) waits while the queue is full. A sink that stalls
///   therefore stalls producers; there is no timeout on that wait.
/// - After [`close`](Self::close), writes fail with [`Error::Closed`]; entries
///   already queued are still committed before `close` returns.
/// - Commit errors are logged and never reach producers. A successful `write`
///   means the entry entered the pipeline, not that it was delivered.
pub struct Batcher {
    config: BatchConfig,
    /// `None` once closed. Writers hold the read side across the enqueue so
    /// the sender cannot be dropped under them.
    queue: RwLock<Option<mpsc::Sender<Entry>>>,
    /// Releases writers parked on a full queue when closing.
    shutdown: CancellationToken,
    /// Cancelled once the final batch has been handed to the sink.
    drained: CancellationToken,
    consumer: Mutex<ConsumerState>,
    stats: Arc<BatchStats>,
}

enum ConsumerState {
    Idle(Consumer),
    Running(JoinHandle<()>),
    Done,
}

impl Batcher {
    pub fn new(sink: Arc<dyn CommitSink>) -> Self {
        Self::with_config(sink, BatchConfig::default())
    }

    pub fn with_config(sink: Arc<dyn CommitSink>, config: BatchConfig) -> Self {
        let config = config.normalized();
        let (tx, rx) = mpsc::channel(config.queue_size);
        let stats = Arc::new(BatchStats::default());
        let consumer = Consumer {
            rx,
            sink,
            pending: NdjsonAccumulator::new(),
            max_bytes: config.max_bytes,
            commit_timeout: config.commit_timeout,
            reports: None,
            stats: stats.clone(),
        };
        Self {
            config,
            queue: RwLock::new(Some(tx)),
            shutdown: CancellationToken::new(),
            drained: CancellationToken::new(),
            consumer: Mutex::new(ConsumerState::Idle(consumer)),
            stats,
        }
    }

    /// Send a [`DeliveryReport`] for every commit attempt. Must be set before `run`.
    pub fn with_delivery_reports(mut self, tx: mpsc::UnboundedSender<DeliveryReport>) -> Self {
        let state = self
            .consumer
            .get_mut()
            .unwrap_or_else(|p| p.into_inner());
        match state {
            ConsumerState::Idle(consumer) => consumer.reports = Some(tx),
            _ => warn!("delivery reports attached after the batcher started; ignoring"),
        }
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn stats(&self) -> BatcherSnapshot {
        self.stats.snapshot()
    }

    /// Queue an entry, waiting while the queue is full.
    ///
    /// Fails with [`Error::Closed`] if the batcher is closed before or while waiting.
    pub async fn write(&self, entry: Entry) -> Result<()> {
        let queue = self.queue.read().await;
        let tx = queue.as_ref().ok_or(Error::Closed)?;
        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::Closed),
            sent = tx.send(entry) => sent.map_err(|_| Error::Closed),
        }
    }

    /// Queue an entry without waiting.
    ///
    /// Fails with [`Error::QueueFull`] when the queue is at capacity and with
    /// [`Error::Closed`] once closing has started.
    pub fn try_write(&self, entry: Entry) -> Result<()> {
        let queue = self.queue.try_read().map_err(|_| Error::Closed)?;
        let tx = queue.as_ref().ok_or(Error::Closed)?;
        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }
        tx.try_send(entry).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Closed(_) => Error::Closed,
        })
    }

    /// Spawn the consumer loop on the current Tokio runtime.
    ///
    /// Only the first call starts a loop; later calls (and calls after
    /// [`close`](Self::close)) do nothing.
    pub fn run(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::runtime_with_context(
                "batcher must be started inside a Tokio runtime",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("batcher"),
            )
        })?;
        let mut state = self.lock_consumer();
        match std::mem::replace(&mut *state, ConsumerState::Done) {
            ConsumerState::Idle(consumer) => {
                // dropped when the loop ends, even by panic
                let drained = self.drained.clone().drop_guard();
                *state = ConsumerState::Running(runtime.spawn(async move {
                    let _drained = drained;
                    consumer.run().await;
                }));
                debug!(
                    max_bytes = self.config.max_bytes,
                    queue_size = self.config.queue_size,
                    "batcher started"
                );
            }
            other => *state = other,
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Reject further writes, then commit everything already queued.
    ///
    /// Returns once the final batch has been handed to the sink, including for
    /// callers racing another `close`. If `run` was never called the queue is
    /// drained here instead. Always returns `Ok`.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        // dropping the only sender ends the consumer's queue
        self.queue.write().await.take();

        let state = std::mem::replace(&mut *self.lock_consumer(), ConsumerState::Done);
        match state {
            ConsumerState::Idle(consumer) => {
                let _drained = self.drained.clone().drop_guard();
                consumer.drain().await;
            }
            ConsumerState::Running(task) => {
                if let Err(e) = task.await {
                    warn!("batcher consumer ended abnormally: {}", e);
                }
            }
            // another close owns the drain
            ConsumerState::Done => self.drained.cancelled().await,
        }
        Ok(())
    }

    fn lock_consumer(&self) -> MutexGuard<'_, ConsumerState> {
        // the guarded section is a single mem::replace; a poisoned lock holds a valid state
        self.consumer.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Single consumer: owns the receiving end of the queue and the pending batch.
struct Consumer {
    rx: mpsc::Receiver<Entry>,
    sink: Arc<dyn CommitSink>,
    pending: NdjsonAccumulator,
    max_bytes: u64,
    commit_timeout: Duration,
    reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
    stats: Arc<BatchStats>,
}

impl Consumer {
    async fn run(mut self) {
        loop {
            // re-armed every iteration, so any activity resets the inactivity clock
            match tokio::time::timeout(self.commit_timeout, self.rx.recv()).await {
                Ok(Some(entry)) => self.accept(entry).await,
                Ok(None) => break,
                Err(_) => self.flush(FlushTrigger::Timeout).await,
            }
        }
        self.flush(FlushTrigger::Shutdown).await;
    }

    /// Consume what is left in a closed queue without timers.
    async fn drain(mut self) {
        while let Some(entry) = self.rx.recv().await {
            self.accept(entry).await;
        }
        self.flush(FlushTrigger::Shutdown).await;
    }

    async fn accept(&mut self, entry: Entry) {
        match entry.encode() {
            Ok(record) => self.pending.push(&record),
            Err(e) => {
                self.stats.record_encode_failure();
                warn!("dropping log entry that failed to encode: {}", e);
                return;
            }
        }
        if self.pending.len() as u64 >= self.max_bytes {
            self.flush(FlushTrigger::Size).await;
        }
    }

    async fn flush(&mut self, trigger: FlushTrigger) {
        let Some((batch, records)) = self.pending.take() else {
            return;
        };
        let bytes = batch.len();
        let result = self.sink.write(batch, records).await;

        let outcome = match result {
            Ok(accepted) => {
                debug!(records, bytes, accepted, %trigger, "batch committed");
                self.stats.record_flush(records, accepted, false);
                Ok(accepted)
            }
            Err(e) => {
                warn!(records, bytes, %trigger, "batch commit failed: {}", e);
                self.stats
                    .record_flush(records, e.accepted_records().unwrap_or(0), true);
                Err(e.to_string())
            }
        };

        if let Some(reports) = &self.reports {
            // the observer may have gone away; reporting is best effort
            let _ = reports.send(DeliveryReport {
                records,
                bytes,
                trigger,
                outcome,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::InMemoryCommitSink;
    use crate::entry::Severity;
    use async_trait::async_trait;
    use bytes::Bytes;
    use time::macros::datetime;

    fn entry(msg: &str) -> Entry {
        Entry::new(Severity::Info, msg, Vec::<String>::new())
            .with_timestamp(datetime!(2024-05-01 10:00:00 UTC))
    }

    /// Sink that fails every commit.
    struct FailingSink;

    #[async_trait]
    impl CommitSink for FailingSink {
        async fn write(&self, _: Bytes, _: usize) -> Result<usize> {
            Err(Error::Remote {
                status: 503,
                message: "index unavailable".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_nothing_flushes_before_run() {
        let sink = Arc::new(InMemoryCommitSink::new());
        let batcher = Batcher::with_config(
            sink.clone(),
            BatchConfig::new()
                .with_max_bytes(1)
                .with_commit_timeout(Duration::from_millis(10)),
        );
        batcher.write(entry("one")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_close_without_run_drains_queue() {
        let sink = Arc::new(InMemoryCommitSink::new());
        let batcher = Batcher::new(sink.clone());
        batcher.write(entry("one")).await.unwrap();
        batcher.write(entry("two")).await.unwrap();

        batcher.close().await.unwrap();

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records, 2);
    }

    #[tokio::test]
    async fn test_close_immediately_after_construction() {
        let sink = Arc::new(InMemoryCommitSink::new());
        let batcher = Batcher::new(sink.clone());
        tokio::time::timeout(Duration::from_secs(1), batcher.close())
            .await
            .expect("close must not hang")
            .unwrap();
        assert!(sink.is_empty());
        // a second close is a no-op
        batcher.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_after_close_is_rejected() {
        let batcher = Batcher::new(Arc::new(InMemoryCommitSink::new()));
        batcher.run().unwrap();
        batcher.close().await.unwrap();

        assert!(batcher.is_closed());
        assert!(batcher.write(entry("late")).await.unwrap_err().is_closed());
        assert!(batcher.try_write(entry("late")).unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_try_write_reports_full_queue() {
        let batcher = Batcher::with_config(
            Arc::new(InMemoryCommitSink::new()),
            BatchConfig::new().with_queue_size(1),
        );
        batcher.try_write(entry("one")).unwrap();
        assert!(matches!(
            batcher.try_write(entry("two")),
            Err(Error::QueueFull)
        ));
    }

    #[tokio::test]
    async fn test_close_releases_writer_blocked_on_full_queue() {
        let batcher = Arc::new(Batcher::with_config(
            Arc::new(InMemoryCommitSink::new()),
            BatchConfig::new().with_queue_size(1),
        ));
        batcher.write(entry("fills the queue")).await.unwrap();

        let blocked = {
            let batcher = batcher.clone();
            tokio::spawn(async move { batcher.write(entry("waits")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        tokio::time::timeout(Duration::from_secs(1), batcher.close())
            .await
            .expect("close must not deadlock against a blocked writer")
            .unwrap();
        let result = blocked.await.unwrap();
        assert!(result.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_commit_errors_are_swallowed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let batcher = Batcher::with_config(
            Arc::new(FailingSink),
            BatchConfig::new().with_max_bytes(1),
        )
        .with_delivery_reports(tx);
        batcher.run().unwrap();

        // every write still succeeds even though every commit fails
        for msg in ["a", "b", "c"] {
            batcher.write(entry(msg)).await.unwrap();
        }
        batcher.close().await.unwrap();

        let mut failures = 0;
        while let Ok(report) = rx.try_recv() {
            assert_eq!(report.trigger, FlushTrigger::Size);
            assert_eq!(report.records, 1);
            assert!(report.outcome.unwrap_err().contains("index unavailable"));
            failures += 1;
        }
        assert_eq!(failures, 3);

        let stats = batcher.stats();
        assert_eq!(stats.flushes, 3);
        assert_eq!(stats.commit_failures, 3);
        assert_eq!(stats.records_accepted, 0);
    }

    /// Sink that takes a while per commit and rejects everything once closed.
    struct SlowClosableSink {
        inner: InMemoryCommitSink,
        delay: Duration,
    }

    #[async_trait]
    impl CommitSink for SlowClosableSink {
        async fn write(&self, ndjson: Bytes, records: usize) -> Result<usize> {
            tokio::time::sleep(self.delay).await;
            self.inner.write(ndjson, records).await
        }

        async fn close(&self) -> Result<()> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_close_waits_for_final_flush() {
        let sink = Arc::new(SlowClosableSink {
            inner: InMemoryCommitSink::new(),
            delay: Duration::from_millis(200),
        });
        let batcher = Arc::new(Batcher::new(sink.clone()));
        batcher.run().unwrap();
        batcher.write(entry("one")).await.unwrap();
        batcher.write(entry("two")).await.unwrap();

        let first = {
            let batcher = batcher.clone();
            tokio::spawn(async move { batcher.close().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        batcher.close().await.unwrap();

        // the second caller only returns after the final batch was committed
        assert_eq!(sink.inner.len(), 1);
        assert_eq!(sink.inner.batches()[0].records, 2);
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_close_without_run_waits_for_drain() {
        let sink = Arc::new(SlowClosableSink {
            inner: InMemoryCommitSink::new(),
            delay: Duration::from_millis(200),
        });
        let batcher = Arc::new(Batcher::new(sink.clone()));
        batcher.write(entry("one")).await.unwrap();

        let first = {
            let batcher = batcher.clone();
            tokio::spawn(async move { batcher.close().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        batcher.close().await.unwrap();

        assert_eq!(sink.inner.len(), 1);
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_delivery_reports_after_run_are_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let batcher = Batcher::new(Arc::new(InMemoryCommitSink::new()));
        batcher.run().unwrap();
        let batcher = batcher.with_delivery_reports(tx);

        batcher.write(entry("one")).await.unwrap();
        batcher.close().await.unwrap();

        assert_eq!(batcher.stats().flushes, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_run_outside_runtime_is_an_error() {
        let batcher = Batcher::new(Arc::new(InMemoryCommitSink::new()));
        let result = std::thread::spawn(move || batcher.run().is_err())
            .join()
            .unwrap();
        assert!(result);
    }
}
