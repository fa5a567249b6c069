//! SQL MCP Library
//!
//! The same introspector, bounded executor and audit log the conversational
//! agent uses, published as MCP tools.
//!
//! ```rust,ignore
//! use sql_mcp::{SqlMcpConfig, SqlMcpServer};
//!
//! let server = SqlMcpServer::new(SqlMcpConfig::from_env()?);
//! ```

pub mod config;
pub mod server;

pub use config::SqlMcpConfig;
pub use server::{RunSqlParams, SqlMcpServer};
