//! 日志条目：单条结构化日志记录及其 NDJSON 编码。
//!
//! Log entries and their wire encoding.
//!
//! An [`Entry`] is one immutable log record. The batcher encodes each entry to a
//! single JSON object; batches are newline-joined (NDJSON):
//!
//! ```text
//! {"timestamp":"2024-05-01T10:00:00Z","severity":"INFO","payload":"started","labels":["env","prod"]}
//! ```
//!
//! `severity` is omitted for raw entries and `labels` is omitted when empty.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Severity of a log entry.
///
/// [`Severity::Unspecified`] marks a raw write and is never put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    #[serde(rename = "")]
    Unspecified,
    /// Debug or trace information.
    Debug,
    /// Routine information, such as ongoing status or performance.
    Info,
    /// Normal but significant events, such as start up, shut down, or configuration.
    Notice,
    /// Events that might cause problems.
    Warning,
    /// Events that are likely to cause problems.
    Error,
    /// Events that cause more severe problems or brief outages.
    Critical,
    /// A person must take an action immediately.
    Alert,
    /// One or more systems are unusable.
    Emergency,
}

impl Severity {
    pub const ALL: [Severity; 8] = [
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Alert,
        Severity::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unspecified => "",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Severity::Unspecified)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown severity name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity: {0}")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Severity::Unspecified);
        }
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseSeverityError(s.to_string()))
    }
}

/// One log record.
///
/// Entries are immutable once built; the batcher takes ownership on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    timestamp: Option<OffsetDateTime>,
    severity: Severity,
    payload: String,
    labels: Vec<String>,
}

/// Borrowed wire form of an [`Entry`].
#[derive(Serialize)]
struct WireRecord<'a> {
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Severity::is_unspecified")]
    severity: Severity,
    payload: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    labels: &'a [String],
}

impl Entry {
    /// Entry stamped with the current time.
    pub fn new<I, S>(severity: Severity, payload: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            timestamp: Some(OffsetDateTime::now_utc()),
            severity,
            payload: payload.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Entry without severity, labels or timestamp. The timestamp is filled in at encoding.
    pub fn raw(payload: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            severity: Severity::Unspecified,
            payload: payload.into(),
            labels: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        self.timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Encode to a single JSON object (no trailing newline).
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = WireRecord {
            timestamp: self.timestamp.unwrap_or_else(OffsetDateTime::now_utc),
            severity: self.severity,
            payload: &self.payload,
            labels: &self.labels,
        };
        Ok(serde_json::to_vec(&record)?)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = match self.timestamp {
            Some(ts) => ts.to_string(),
            None => "unset".to_string(),
        };
        write!(
            f,
            "{{time={} level={} msg={} labels={}}}",
            time,
            self.severity,
            self.payload,
            self.labels.join(",")
        )
    }
}
