//! MCP Common - shared plumbing for the SQL agent binaries
//!
//! - **Initialization**: [`init_tracing`] and the `serve_stdio!` macro
//! - **Results**: helpers for building `CallToolResult` responses
//! - **Errors**: conversions into `rmcp::ErrorData`
//!
//! ```rust,ignore
//! use mcp_common::{serve_stdio, json_success};
//!
//! serve_stdio!(SqlMcpServer::from_env, "sql_mcp");
//!
//! async fn run_sql(&self, ...) -> Result<CallToolResult, McpError> {
//!     let outcome = ...;
//!     json_success(&outcome)
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;

// Re-export commonly used items at crate root
pub use error::{internal_error, IntoMcpError, ResultExt};
pub use init::{init_tracing, LogFormat};
pub use result::json_success;

pub use rmcp::ErrorData as McpError;
