//! Query audit log
//!
//! One JSON object per line, appended for every statement the executor
//! attempts. Writing is best-effort: a log that cannot be written never
//! changes what the caller sees.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AuditConfig;

/// A single statement attempt, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// When the record was written (UTC, second precision)
    #[serde(with = "utc_seconds")]
    pub ts: DateTime<Utc>,
    /// The statement text as received
    pub sql: String,
    /// Rows returned or affected; 0 on error
    pub rows_count: usize,
    /// Wall-clock time spent in the database
    pub duration_ms: Option<f64>,
    /// Database error text, if the statement failed
    pub error: Option<String>,
}

impl QueryRecord {
    /// Create a record stamped with the current time
    pub fn new(
        sql: impl Into<String>,
        rows_count: usize,
        duration_ms: Option<f64>,
        error: Option<String>,
    ) -> Self {
        Self {
            ts: Utc::now(),
            sql: sql.into(),
            rows_count,
            duration_ms,
            error,
        }
    }
}

/// Serialize timestamps as `2024-05-01T12:00:00Z`
mod utc_seconds {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Append-only sink for [`QueryRecord`]s
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    /// `None` when logging is disabled
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Build from configuration; a disabled config yields a no-op log
    pub fn from_config(config: &AuditConfig) -> Self {
        if config.enabled {
            Self::to_file(config.path.clone())
        } else {
            Self::disabled()
        }
    }

    /// Log to `path`, creating the file on first write
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that drops every record
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append `record`; I/O failures are swallowed
    pub fn record(&self, record: &QueryRecord) {
        let Some(path) = &self.path else {
            return;
        };

        if let Err(e) = append_line(path, record) {
            tracing::debug!("Dropped audit record for {:?}: {}", path, e);
        }
    }
}

fn append_line(path: &Path, record: &QueryRecord) -> std::io::Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write per record so concurrent appenders never interleave a line
    file.write_all(line.as_bytes())
}
