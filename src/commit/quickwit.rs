//! Quickwit ingest committer.

use super::index::{index_config, DEFAULT_RETENTION_PERIOD};
use super::CommitSink;
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const NDJSON_MIME_TYPE: &str = "application/x-ndjson";

fn default_retention_period() -> Option<String> {
    Some(DEFAULT_RETENTION_PERIOD.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitterConfig {
    /// Quickwit REST root, e.g. `http://localhost:7280`.
    pub base_url: String,
    pub index_id: String,
    /// Retention for a newly created index. `None` (YAML `null`) disables it.
    #[serde(default = "default_retention_period")]
    pub retention_period: Option<String>,
    /// Per-request HTTP timeout; falls back to `LOGWIT_HTTP_TIMEOUT_SECS`.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

impl CommitterConfig {
    pub fn new(base_url: impl Into<String>, index_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            index_id: index_id.into(),
            retention_period: default_retention_period(),
            http_timeout_secs: None,
        }
    }

    pub fn with_retention_period(mut self, period: impl Into<String>) -> Self {
        self.retention_period = Some(period.into());
        self
    }

    /// Create the index without a retention policy.
    pub fn without_retention(mut self) -> Self {
        self.retention_period = None;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }
}

/// Body of `GET /api/v1/indexes/{id}/describe`. Errors share the shape.
#[derive(Debug, Default, Deserialize)]
struct DescribeIndexResponse {
    #[serde(default)]
    index_id: String,
    #[serde(default)]
    message: String,
}

/// Body of `POST /api/v1/{id}/ingest`. Errors share the shape.
#[derive(Debug, Default, Deserialize)]
struct IngestResponse {
    #[serde(default)]
    num_docs_for_processing: usize,
    #[serde(default)]
    message: String,
}

/// Commits NDJSON batches to a Quickwit index through its ingest API.
///
/// Construction makes sure the index exists, creating it when absent, so
/// setup failures surface before any entry is written.
pub struct QuickwitCommitter {
    transport: HttpTransport,
    index_id: String,
    ingest_url: Url,
    closed: AtomicBool,
}

impl QuickwitCommitter {
    pub async fn new(config: CommitterConfig) -> Result<Self> {
        if config.index_id.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "index id must not be empty",
                ErrorContext::new()
                    .with_field_path("committer.index_id")
                    .with_source("quickwit_committer"),
            ));
        }
        let transport = HttpTransport::new(
            &config.base_url,
            config.http_timeout_secs.map(Duration::from_secs),
        )?;

        init_index(
            &transport,
            &config.index_id,
            config.retention_period.as_deref(),
        )
        .await?;

        // format: host:port/api/v1/{index_id}/ingest
        let ingest_url =
            transport.endpoint(&["api", "v1", config.index_id.as_str(), "ingest"])?;

        Ok(Self {
            transport,
            index_id: config.index_id,
            ingest_url,
            closed: AtomicBool::new(false),
        })
    }

    /// Committer with the default 30 days retention.
    pub async fn connect(base_url: &str, index_id: &str) -> Result<Self> {
        Self::new(CommitterConfig::new(base_url, index_id)).await
    }

    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    pub fn ingest_url(&self) -> &Url {
        &self.ingest_url
    }
}

#[async_trait]
impl CommitSink for QuickwitCommitter {
    async fn write(&self, ndjson: Bytes, record_count: usize) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let resp = self
            .transport
            .post_bytes(self.ingest_url.clone(), NDJSON_MIME_TYPE, ndjson)
            .await?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(e.into()))?;

        if !status.is_success() {
            let parsed: IngestResponse = serde_json::from_str(&body).unwrap_or_default();
            return Err(remote_error(status, parsed.message, body));
        }

        let parsed: IngestResponse = serde_json::from_str(&body)?;
        if parsed.num_docs_for_processing == record_count {
            return Ok(record_count);
        }
        Err(Error::PartialCommit {
            accepted: parsed.num_docs_for_processing,
            expected: record_count,
            message: parsed.message,
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(index_id = %self.index_id, "quickwit committer closed");
        }
        Ok(())
    }
}

fn remote_error(status: StatusCode, message: String, body: String) -> Error {
    let message = if !message.is_empty() {
        message
    } else if !body.trim().is_empty() {
        body
    } else {
        format!("unexpected response from quickwit {}", status.as_u16())
    };
    Error::Remote {
        status: status.as_u16(),
        message,
    }
}

/// Create the index unless it already exists.
async fn init_index(
    transport: &HttpTransport,
    index_id: &str,
    retention_period: Option<&str>,
) -> Result<()> {
    if describe_index(transport, index_id).await? {
        debug!(index_id, "quickwit index already exists");
        return Ok(());
    }
    create_index(transport, index_id, retention_period).await
}

async fn describe_index(transport: &HttpTransport, index_id: &str) -> Result<bool> {
    // format: host:port/api/v1/indexes/{index_id}/describe
    let url = transport.endpoint(&["api", "v1", "indexes", index_id, "describe"])?;
    let resp = transport.get(url).await?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Transport(e.into()))?;
    let parsed: DescribeIndexResponse = serde_json::from_str(&body).unwrap_or_default();

    if parsed.index_id == index_id {
        return Ok(true);
    }
    if status == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    Err(remote_error(status, parsed.message, String::new()))
}

async fn create_index(
    transport: &HttpTransport,
    index_id: &str,
    retention_period: Option<&str>,
) -> Result<()> {
    // format: host:port/api/v1/indexes
    let url = transport.endpoint(&["api", "v1", "indexes"])?;
    let resp = transport
        .post_json(url, &index_config(index_id, retention_period))
        .await?;
    let status = resp.status();
    if status.is_success() {
        info!(index_id, retention = ?retention_period, "created quickwit index");
        return Ok(());
    }

    let body = resp.text().await.unwrap_or_default();
    let parsed: DescribeIndexResponse = serde_json::from_str(&body).unwrap_or_default();
    Err(remote_error(status, parsed.message, String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const DESCRIBE_PATH: &str = "/api/v1/indexes/app-logs/describe";

    #[tokio::test]
    async fn test_existing_index_is_not_recreated() {
        let mut server = Server::new_async().await;
        let describe = server
            .mock("GET", DESCRIBE_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"index_id":"app-logs","index_uri":"s3://logs/app-logs"}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v1/indexes")
            .expect(0)
            .create_async()
            .await;

        let committer = QuickwitCommitter::connect(&server.url(), "app-logs")
            .await
            .unwrap();
        assert_eq!(
            committer.ingest_url().as_str(),
            format!("{}/api/v1/app-logs/ingest", server.url())
        );
        describe.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_index_is_created_with_retention() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", DESCRIBE_PATH)
            .with_status(404)
            .with_body(r#"{"message":"index `app-logs` not found"}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v1/indexes")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "index_id": "app-logs",
                "retention": {"period": "7 days"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let config = CommitterConfig::new(server.url(), "app-logs")
            .with_retention_period("7 days");
        QuickwitCommitter::new(config).await.unwrap();
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_message() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", DESCRIBE_PATH)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/indexes")
            .with_status(400)
            .with_body(r#"{"message":"invalid retention period"}"#)
            .create_async()
            .await;

        let err = QuickwitCommitter::connect(&server.url(), "app-logs")
            .await
            .err()
            .unwrap();
        match err {
            Error::Remote { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid retention period");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_describe_unexpected_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", DESCRIBE_PATH)
            .with_status(500)
            .create_async()
            .await;

        let err = QuickwitCommitter::connect(&server.url(), "app-logs")
            .await
            .err()
            .unwrap();
        assert!(err
            .to_string()
            .contains("unexpected response from quickwit 500"));
    }

    #[tokio::test]
    async fn test_empty_index_id_rejected() {
        let err = QuickwitCommitter::connect("http://localhost:7280", " ")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    async fn ready_committer(server: &mut mockito::ServerGuard) -> QuickwitCommitter {
        server
            .mock("GET", DESCRIBE_PATH)
            .with_status(200)
            .with_body(r#"{"index_id":"app-logs"}"#)
            .create_async()
            .await;
        QuickwitCommitter::connect(&server.url(), "app-logs")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_posts_ndjson() {
        let mut server = Server::new_async().await;
        let committer = ready_committer(&mut server).await;
        let ingest = server
            .mock("POST", "/api/v1/app-logs/ingest")
            .match_header("content-type", NDJSON_MIME_TYPE)
            .match_body("{\"payload\":\"a\"}\n{\"payload\":\"b\"}")
            .with_status(200)
            .with_body(r#"{"num_docs_for_processing":2}"#)
            .create_async()
            .await;

        let n = committer
            .write(Bytes::from_static(b"{\"payload\":\"a\"}\n{\"payload\":\"b\"}"), 2)
            .await
            .unwrap();
        assert_eq!(n, 2);
        ingest.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_partial_commit() {
        let mut server = Server::new_async().await;
        let committer = ready_committer(&mut server).await;
        server
            .mock("POST", "/api/v1/app-logs/ingest")
            .with_status(200)
            .with_body(r#"{"num_docs_for_processing":1,"message":"1 doc failed to parse"}"#)
            .create_async()
            .await;

        let err = committer
            .write(Bytes::from_static(b"{}\n{}"), 2)
            .await
            .unwrap_err();
        assert_eq!(err.accepted_records(), Some(1));
        assert!(err.to_string().contains("1 doc failed to parse"));
    }

    #[tokio::test]
    async fn test_write_remote_error() {
        let mut server = Server::new_async().await;
        let committer = ready_committer(&mut server).await;
        server
            .mock("POST", "/api/v1/app-logs/ingest")
            .with_status(429)
            .with_body(r#"{"message":"too many requests"}"#)
            .create_async()
            .await;

        let err = committer
            .write(Bytes::from_static(b"{}"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_write_after_close() {
        let mut server = Server::new_async().await;
        let committer = ready_committer(&mut server).await;
        let ingest = server
            .mock("POST", "/api/v1/app-logs/ingest")
            .expect(0)
            .create_async()
            .await;

        committer.close().await.unwrap();
        committer.close().await.unwrap();
        let err = committer
            .write(Bytes::from_static(b"{}"), 1)
            .await
            .unwrap_err();
        assert!(err.is_closed());
        ingest.assert_async().await;
    }

    #[test]
    fn test_committer_config_yaml() {
        let config: CommitterConfig =
            serde_yaml::from_str("base_url: http://qw:7280\nindex_id: svc\n").unwrap();
        assert_eq!(config.retention_period.as_deref(), Some("30 days"));

        let config: CommitterConfig = serde_yaml::from_str(
            "base_url: http://qw:7280\nindex_id: svc\nretention_period: null\n",
        )
        .unwrap();
        assert!(config.retention_period.is_none());
    }
}
