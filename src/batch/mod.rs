//! 批处理模块：按大小与空闲超时聚合日志条目并批量提交。
//!
//! # Log Batching Module
//!
//! This module turns a continuous stream of [`Entry`](crate::Entry) values into
//! NDJSON batches handed to a [`CommitSink`](crate::commit::CommitSink).
//!
//! ## Overview
//!
//! A single consumer task drains a bounded queue and commits when either:
//! - the pending batch reaches `max_bytes` (throughput bound), or
//! - no entry arrived for `commit_timeout` (latency bound).
//!
//! Producers are only slowed down by a full queue, which is the backpressure
//! path from a slow sink back to the application.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Batcher`] | Queue, consumer loop and lifecycle (`run` / `close`) |
//! | [`BatchConfig`] | Size, queue capacity and commit timeout |
//! | [`NdjsonAccumulator`] | Pending NDJSON bytes and record count |
//! | [`DeliveryReport`] | Opt-in outcome of each commit attempt |
//!
//! ## Example
//!
//! ```rust
//! use logwit::batch::{BatchConfig, Batcher};
//! use logwit::commit::InMemoryCommitSink;
//! use logwit::{Entry, Severity};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> logwit::Result<()> {
//! let sink = Arc::new(InMemoryCommitSink::new());
//! let batcher = Batcher::with_config(
//!     sink.clone(),
//!     BatchConfig::new().with_commit_timeout(Duration::from_secs(5)),
//! );
//! batcher.run()?;
//!
//! batcher.write(Entry::new(Severity::Info, "service started", ["env", "dev"])).await?;
//! batcher.close().await?;
//!
//! assert_eq!(sink.batches()[0].records, 1);
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod batcher;
mod config;
mod report;

pub use accumulator::NdjsonAccumulator;
pub use batcher::Batcher;
pub use config::{
    BatchConfig, DEFAULT_COMMIT_TIMEOUT, DEFAULT_MAX_BYTES, DEFAULT_QUEUE_SIZE, MAX_QUEUE_SIZE,
};
pub use report::{BatcherSnapshot, DeliveryReport, FlushTrigger};
