//! Database module - SQLite access for the agent's tools
//!
//! - [`schema`]: renders table/column structure as text for the model
//! - [`executor`]: runs one statement with a row cap and never fails past its boundary
//! - [`audit`]: append-only JSON-lines record of every statement attempt

pub mod audit;
pub mod executor;
pub mod schema;

// Re-export commonly used types
pub use audit::{AuditLog, QueryRecord};
pub use executor::{execute, QueryOutcome, RowLimit};
pub use schema::describe_schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Errors that escape the database layer
///
/// Statement failures are not here: the executor turns them into
/// [`QueryOutcome::Failed`] for the model to read.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("failed to open database at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema introspection failed: {0}")]
    Introspection(#[from] rusqlite::Error),
}

/// Open the database at `path`
pub fn open(path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open(path).map_err(|source| DbError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Database opened at {:?}", path);
    Ok(conn)
}

/// Open a fresh connection, run `f` with it, and close it afterwards
///
/// Used by the MCP server, where every request gets its own connection.
pub fn with_connection<T>(path: &Path, f: impl FnOnce(&Connection) -> T) -> Result<T, DbError> {
    let conn = open(path)?;
    let value = f(&conn);
    if let Err((_, e)) = conn.close() {
        tracing::warn!("Failed to close database at {:?}: {}", path, e);
    }
    Ok(value)
}
