//! Bounded statement execution
//!
//! [`execute`] runs exactly one statement and always returns a
//! [`QueryOutcome`]: database errors become `Failed` after rolling back any
//! open transaction. Row-producing statements are capped at a [`RowLimit`],
//! mutating statements commit an open transaction before returning.
//! Text holding more than one statement is refused before anything runs;
//! text holding none (blank or comments only) succeeds with 0 rows affected.

use std::time::Instant;

use rusqlite::{types::Value as SqlValue, Batch, Connection, Row};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::audit::{AuditLog, QueryRecord};

/// Rows returned when the caller does not ask for a limit
pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Hard upper bound on rows returned by one statement
pub const MAX_ROW_LIMIT: usize = 500;

/// Number of rows a statement may return, always within `1..=500`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowLimit(usize);

impl RowLimit {
    /// Clamp any integer into range
    pub fn new(limit: i64) -> Self {
        Self(limit.clamp(1, MAX_ROW_LIMIT as i64) as usize)
    }

    /// Coerce an arbitrary JSON argument
    ///
    /// Integers are used as-is, floats are truncated, numeric strings are
    /// parsed and booleans count as 0/1. Anything else (including a missing
    /// value) falls back to the default.
    pub fn from_json(raw: Option<&Value>) -> Self {
        raw.and_then(coerce_integer)
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for RowLimit {
    fn default() -> Self {
        Self(DEFAULT_ROW_LIMIT)
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                // `as` saturates, so huge values still clamp to the max
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Result of one statement, serialized as the tool payload
///
/// ```json
/// {"ok": true, "type": "rows", "columns": [..], "rows": [[..]], "row_count": 1, "truncated": false}
/// {"ok": true, "type": "status", "row_count": 3, "message": "3 rows affected."}
/// {"ok": false, "error": "no such table: users"}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The statement produced a result set
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        truncated: bool,
    },
    /// The statement changed data (or did nothing observable)
    Status { affected: usize },
    /// The database rejected the statement
    Failed { error: String },
}

impl QueryOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, QueryOutcome::Failed { .. })
    }

    /// Rows returned, rows affected, or 0 for a failure
    pub fn row_count(&self) -> usize {
        match self {
            QueryOutcome::Rows { rows, .. } => rows.len(),
            QueryOutcome::Status { affected } => *affected,
            QueryOutcome::Failed { .. } => 0,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            QueryOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl Serialize for QueryOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            QueryOutcome::Rows {
                columns,
                rows,
                truncated,
            } => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("type", "rows")?;
                map.serialize_entry("columns", columns)?;
                map.serialize_entry("rows", rows)?;
                map.serialize_entry("row_count", &rows.len())?;
                map.serialize_entry("truncated", truncated)?;
            }
            QueryOutcome::Status { affected } => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("type", "status")?;
                map.serialize_entry("row_count", affected)?;
                map.serialize_entry("message", &format!("{} rows affected.", affected))?;
            }
            QueryOutcome::Failed { error } => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, thiserror::Error)]
enum StatementError {
    #[error("You can only execute one statement at a time.")]
    MultipleStatements,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Execute one statement and record the attempt in `audit`
pub fn execute(conn: &Connection, sql: &str, limit: RowLimit, audit: &AuditLog) -> QueryOutcome {
    let started = Instant::now();

    let outcome = match run_statement(conn, sql, limit) {
        Ok(outcome) => outcome,
        Err(e) => {
            if !conn.is_autocommit() {
                if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!("Rollback after failed statement also failed: {}", rollback_err);
                }
            }
            QueryOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    let duration_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
    tracing::debug!(
        "Executed statement in {}ms (ok={}, rows={})",
        duration_ms,
        outcome.is_ok(),
        outcome.row_count()
    );

    audit.record(&QueryRecord::new(
        sql,
        outcome.row_count(),
        Some(duration_ms),
        outcome.error().map(str::to_string),
    ));

    outcome
}

fn run_statement(conn: &Connection, sql: &str, limit: RowLimit) -> Result<QueryOutcome, StatementError> {
    // Batch skips blank text and comments between statements
    let mut batch = Batch::new(conn, sql);
    let Some(mut stmt) = batch.next()? else {
        return Ok(QueryOutcome::Status { affected: 0 });
    };
    // A second statement, or trailing text that fails to prepare, refuses the call
    if !matches!(batch.next(), Ok(None)) {
        return Err(StatementError::MultipleStatements);
    }

    if stmt.column_count() > 0 {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        // Fetch one extra row to learn whether more exist
        let mut rows = stmt.query([])?;
        let mut collected = Vec::new();
        while collected.len() <= limit.get() {
            match rows.next()? {
                Some(row) => collected.push(row_to_json(row, width)?),
                None => break,
            }
        }

        let truncated = collected.len() > limit.get();
        collected.truncate(limit.get());

        return Ok(QueryOutcome::Rows {
            columns,
            rows: collected,
            truncated,
        });
    }

    let affected = stmt.execute([])?;
    drop(stmt);

    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT")?;
    }

    Ok(QueryOutcome::Status { affected })
}

fn row_to_json(row: &Row<'_>, width: usize) -> rusqlite::Result<Vec<Value>> {
    let mut values = Vec::with_capacity(width);
    for i in 0..width {
        let value: SqlValue = row.get(i)?;
        values.push(match value {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::from(n),
            // Non-finite reals become null
            SqlValue::Real(f) => Value::from(f),
            SqlValue::Text(s) => Value::String(s),
            SqlValue::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
        });
    }
    Ok(values)
}
