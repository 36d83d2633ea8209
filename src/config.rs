//! File configuration for a Quickwit-backed [`Logger`](crate::Logger).
//!
//! ```yaml
//! committer:
//!   base_url: http://localhost:7280
//!   index_id: checkout-service
//!   retention_period: 14 days
//! batch:
//!   max_bytes: 1048576
//!   queue_size: 5000
//!   commit_timeout: 10
//! ```

use crate::batch::BatchConfig;
use crate::commit::CommitterConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub committer: CommitterConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl LoggerConfig {
    pub fn new(committer: CommitterConfig) -> Self {
        Self {
            committer,
            batch: BatchConfig::default(),
        }
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: LoggerConfig = serde_yaml::from_str(content)?;
        config.normalized()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: LoggerConfig = serde_json::from_str(content)?;
        config.normalized()
    }

    /// Load from a `.json` file, or YAML for any other extension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read {}", path.display()),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("logger_config"),
            )
        })?;

        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("json"))
            == Some(true);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    fn normalized(mut self) -> Result<Self> {
        self.batch.validate()?;
        self.batch = self.batch.normalized();
        Ok(self)
    }
}
