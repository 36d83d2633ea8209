//! Batcher configuration.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Encoded bytes held in memory before a batch is committed (3 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 3 * 1024 * 1024;
/// Pending entries the queue holds before `write` starts waiting.
pub const DEFAULT_QUEUE_SIZE: usize = 1000;
/// Inactivity window after which a partial batch is committed.
/// Matches Quickwit's default `commit_timeout_secs`.
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Largest queue capacity the underlying channel can represent.
pub const MAX_QUEUE_SIZE: usize = usize::MAX >> 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_bytes: u64,
    pub queue_size: usize,
    #[serde(with = "duration_secs")]
    pub commit_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            queue_size: DEFAULT_QUEUE_SIZE,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero falls back to [`DEFAULT_MAX_BYTES`].
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = if max_bytes == 0 {
            DEFAULT_MAX_BYTES
        } else {
            max_bytes
        };
        self
    }

    /// Zero falls back to [`DEFAULT_QUEUE_SIZE`]; values above
    /// [`MAX_QUEUE_SIZE`] are clamped.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = match queue_size {
            0 => DEFAULT_QUEUE_SIZE,
            n => n.min(MAX_QUEUE_SIZE),
        };
        self
    }

    /// A zero duration falls back to [`DEFAULT_COMMIT_TIMEOUT`].
    pub fn with_commit_timeout(mut self, commit_timeout: Duration) -> Self {
        self.commit_timeout = if commit_timeout.is_zero() {
            DEFAULT_COMMIT_TIMEOUT
        } else {
            commit_timeout
        };
        self
    }

    /// Replace zero values (e.g. from a config file) with defaults.
    pub fn normalized(self) -> Self {
        let (max_bytes, queue_size, commit_timeout) =
            (self.max_bytes, self.queue_size, self.commit_timeout);
        self.with_max_bytes(max_bytes)
            .with_queue_size(queue_size)
            .with_commit_timeout(commit_timeout)
    }

    /// Reject values a config file can express but the batcher cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.queue_size > MAX_QUEUE_SIZE {
            return Err(Error::configuration_with_context(
                format!(
                    "queue_size {} exceeds the maximum of {}",
                    self.queue_size, MAX_QUEUE_SIZE
                ),
                ErrorContext::new().with_field_path("batch.queue_size"),
            ));
        }
        Ok(())
    }
}

/// `commit_timeout` is written as fractional seconds in config files.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(|e| {
            serde::de::Error::custom(format!(
                "commit_timeout must be a non-negative number of seconds, got {}: {}",
                secs, e
            ))
        })
    }
}
