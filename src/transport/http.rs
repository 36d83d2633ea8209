use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Thin reqwest wrapper bound to one backend base URL.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// `timeout` wins over `LOGWIT_HTTP_TIMEOUT_SECS`, which wins over the 30s default.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url {:?}", base_url),
                ErrorContext::new()
                    .with_field_path("committer.base_url")
                    .with_details(e.to_string())
                    .with_source("http_transport"),
            )
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::configuration_with_context(
                format!("base url {} cannot carry a path", base_url),
                ErrorContext::new()
                    .with_field_path("committer.base_url")
                    .with_source("http_transport"),
            ));
        }

        // Minimal production-friendly defaults (env-overridable).
        let timeout = timeout.unwrap_or_else(|| {
            Duration::from_secs(
                env::var("LOGWIT_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            )
        });

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("LOGWIT_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(4),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("LOGWIT_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        if let Ok(proxy_url) = env::var("LOGWIT_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL (`http://host:7280` + `["api", "v1"]`).
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::Transport(TransportError::Other(format!(
                    "cannot append path to {}",
                    self.base_url
                )))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get(&self, url: Url) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    pub async fn post_json(&self, url: Url, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    pub async fn post_bytes(
        &self,
        url: Url,
        content_type: &str,
        body: Bytes,
    ) -> Result<reqwest::Response> {
        self.client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
