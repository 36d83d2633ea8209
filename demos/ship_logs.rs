//! Log Shipping Example
//!
//! This example demonstrates:
//! - Building a Logger from a YAML/JSON config file (Quickwit backend)
//! - Falling back to an in-memory sink when no config is given
//! - Observing commit outcomes through delivery reports
//!
//! Usage:
//!   cargo run --example ship_logs                     # in-memory sink
//!   cargo run --example ship_logs -- logwit.yaml      # Quickwit from config
//!
//! Set RUST_LOG=logwit=debug to see every commit.

use logwit::batch::{BatchConfig, Batcher};
use logwit::commit::{CommitSink, InMemoryCommitSink};
use logwit::{Logger, LoggerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== logwit Log Shipping Demo ===\n");

    match std::env::args().nth(1) {
        Some(path) => ship_to_quickwit(&path).await?,
        None => ship_in_memory().await?,
    }
    Ok(())
}

async fn ship_to_quickwit(path: &str) -> anyhow::Result<()> {
    let config = LoggerConfig::load(path).await?;
    println!(
        "Shipping to {} (index {})\n",
        config.committer.base_url, config.committer.index_id
    );

    let logger = Logger::connect(config).await?;
    logger.notice("demo started", &["demo", "ship_logs"]).await?;
    for i in 0..5 {
        logger
            .info(&format!("processing item {}", i), &["item", &i.to_string()])
            .await?;
    }
    logger.warning("demo finished", &[]).await?;
    logger.close().await?;

    println!("{:#?}", logger.batcher().stats());
    Ok(())
}

async fn ship_in_memory() -> anyhow::Result<()> {
    println!("No config given, using an in-memory sink\n");

    let sink = Arc::new(InMemoryCommitSink::new());
    let (tx, mut reports) = mpsc::unbounded_channel();
    let batcher = Batcher::with_config(
        sink.clone(),
        BatchConfig::new()
            .with_max_bytes(512)
            .with_commit_timeout(Duration::from_secs(2)),
    )
    .with_delivery_reports(tx);
    let committer: Arc<dyn CommitSink> = sink.clone();
    let logger = Logger::new(committer, batcher)?;

    for i in 0..10 {
        logger
            .info(&format!("processing item {}", i), &["item", &i.to_string()])
            .await?;
    }
    logger.write_raw(b"a raw line without severity").await?;
    logger.close().await?;

    while let Ok(report) = reports.try_recv() {
        println!(
            "commit: {} records, {} bytes, trigger={}, outcome={:?}",
            report.records, report.bytes, report.trigger, report.outcome
        );
    }

    for (i, batch) in sink.batches().iter().enumerate() {
        println!("\n--- batch {} ({} records) ---", i + 1, batch.records);
        for line in batch.lines() {
            println!("{}", line);
        }
    }
    Ok(())
}
