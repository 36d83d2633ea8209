//! Quickwit index definition for log entries.

use serde_json::{json, Value};

/// Retention applied when none is configured.
pub const DEFAULT_RETENTION_PERIOD: &str = "30 days";

/// Index config matching the entry wire format.
///
/// `timestamp` is a fast datetime field with nanosecond precision; the default
/// search fields are severity, payload and labels. Pass `None` to create the
/// index without a retention policy.
pub fn index_config(index_id: &str, retention_period: Option<&str>) -> Value {
    let mut config = json!({
        "version": "0.8",
        "index_id": index_id,
        "doc_mapping": {
            "mode": "lenient",
            "field_mappings": [
                {
                    "name": "timestamp",
                    "type": "datetime",
                    "input_formats": ["rfc3339"],
                    "output_format": "unix_timestamp_nanos",
                    "fast_precision": "nanoseconds",
                    "fast": true
                },
                { "name": "labels", "type": "array<text>" },
                { "name": "severity", "type": "text" },
                { "name": "payload", "type": "text" }
            ],
            "timestamp_field": "timestamp"
        },
        "search_settings": {
            "default_search_fields": ["severity", "payload", "labels"]
        }
    });

    if let Some(period) = retention_period.filter(|p| !p.is_empty()) {
        config["retention"] = json!({ "period": period });
    }
    config
}
