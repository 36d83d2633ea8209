//! 日志门面：按严重级别写入条目，转发给批处理器。
//!
//! Logging facade.
//!
//! [`Logger`] maps severity-level calls to [`Entry`] values and forwards them
//! to a running [`Batcher`]. Every method returns the batcher's write result,
//! so the only error a caller sees while logging is [`Error::Closed`](crate::Error::Closed).

mod writer;

pub use writer::LogWriter;

use crate::batch::{BatchConfig, Batcher};
use crate::commit::{CommitSink, QuickwitCommitter};
use crate::config::LoggerConfig;
use crate::entry::{Entry, Severity};
use crate::Result;
use std::sync::Arc;
use time::OffsetDateTime;

pub struct Logger {
    committer: Arc<dyn CommitSink>,
    batcher: Arc<Batcher>,
}

impl Logger {
    /// Wrap a batcher built on top of `committer` and start it.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(committer: Arc<dyn CommitSink>, batcher: Batcher) -> Result<Self> {
        batcher.run()?;
        Ok(Self {
            committer,
            batcher: Arc::new(batcher),
        })
    }

    /// Logger over any sink with the given batch settings.
    pub fn with_sink(sink: Arc<dyn CommitSink>, batch: BatchConfig) -> Result<Self> {
        let batcher = Batcher::with_config(sink.clone(), batch);
        Self::new(sink, batcher)
    }

    /// Quickwit logger from a full configuration. Fails if the index cannot be
    /// described or created.
    pub async fn connect(config: LoggerConfig) -> Result<Self> {
        let committer: Arc<dyn CommitSink> =
            Arc::new(QuickwitCommitter::new(config.committer).await?);
        Self::with_sink(committer, config.batch)
    }

    /// Quickwit logger with default batching and retention.
    pub async fn quickwit(base_url: &str, index_id: &str) -> Result<Self> {
        let committer: Arc<dyn CommitSink> =
            Arc::new(QuickwitCommitter::connect(base_url, index_id).await?);
        Self::with_sink(committer, BatchConfig::default())
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    pub async fn log(&self, severity: Severity, message: &str, labels: &[&str]) -> Result<()> {
        self.batcher
            .write(Entry::new(severity, message, labels.iter().copied()))
            .await
    }

    pub async fn debug(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Debug, message, labels).await
    }

    pub async fn info(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Info, message, labels).await
    }

    pub async fn notice(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Notice, message, labels).await
    }

    pub async fn warning(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Warning, message, labels).await
    }

    pub async fn error(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Error, message, labels).await
    }

    pub async fn critical(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Critical, message, labels).await
    }

    pub async fn alert(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Alert, message, labels).await
    }

    pub async fn emergency(&self, message: &str, labels: &[&str]) -> Result<()> {
        self.log(Severity::Emergency, message, labels).await
    }

    /// Ship `data` as a raw entry (no severity, no labels).
    ///
    /// Returns `data.len()` on success; the count carries no delivery meaning.
    pub async fn write_raw(&self, data: &[u8]) -> Result<usize> {
        let entry =
            Entry::raw(String::from_utf8_lossy(data)).with_timestamp(OffsetDateTime::now_utc());
        self.batcher.write(entry).await?;
        Ok(data.len())
    }

    /// A [`MakeWriter`](tracing_subscriber::fmt::MakeWriter) that ships every
    /// formatted line as a raw entry.
    pub fn make_writer(&self) -> LogWriter {
        LogWriter::new(self.batcher.clone())
    }

    /// Drain the batcher, then close the committer. Always returns `Ok`.
    pub async fn close(&self) -> Result<()> {
        self.batcher.close().await?;
        if let Err(e) = self.committer.close().await {
            tracing::warn!("closing committer failed: {}", e);
        }
        Ok(())
    }
}
