//! # logwit
//!
//! 结构化日志批量投递客户端：按大小与时间批量写入 Quickwit。
//!
//! Batched structured log shipping to Quickwit over its NDJSON ingest API.
//!
//! ## Overview
//!
//! Application code emits [`Entry`] values; a [`batch::Batcher`] queues them,
//! encodes them to NDJSON and commits a batch when it grows past a byte limit
//! or when no entry arrived for a while. Batches go to a
//! [`commit::CommitSink`], by default the [`commit::QuickwitCommitter`].
//!
//! ## Key Features
//!
//! - **Two flush triggers**: size (`max_bytes`) and inactivity (`commit_timeout`)
//! - **Backpressure**: a bounded queue slows producers down instead of growing memory
//! - **Graceful shutdown**: `close` rejects new writes and commits everything queued
//! - **Fire-and-forget commits**: sink failures are logged, never retried; opt into
//!   [`batch::DeliveryReport`]s to observe them
//! - **tracing integration**: [`Logger::make_writer`] ships formatted `tracing` lines
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logwit::Logger;
//!
//! #[tokio::main]
//! async fn main() -> logwit::Result<()> {
//!     let logger = Logger::quickwit("http://localhost:7280", "checkout-service").await?;
//!
//!     logger.info("order placed", &["order_id", "42"]).await?;
//!     logger.warning("payment retry", &[]).await?;
//!
//!     // commits whatever is still pending
//!     logger.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`entry`] | Log entries, severities and their JSON encoding |
//! | [`batch`] | The batching engine and its configuration |
//! | [`commit`] | Commit sinks, including the Quickwit committer |
//! | [`logger`] | Per-severity facade and `tracing` writer |
//! | [`config`] | File configuration (YAML / JSON) |
//! | [`transport`] | HTTP client used by the committer |

pub mod batch;
pub mod commit;
pub mod config;
pub mod entry;
pub mod logger;
pub mod transport;

pub use batch::{BatchConfig, Batcher, DeliveryReport, FlushTrigger};
pub use commit::{CommitSink, CommitterConfig, QuickwitCommitter};
pub use config::LoggerConfig;
pub use entry::{Entry, Severity};
pub use logger::Logger;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
