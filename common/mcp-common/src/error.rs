//! Conversions from workspace error types into `rmcp::ErrorData`

use rmcp::ErrorData as McpError;

/// Convert an error into an MCP internal error
///
/// Implemented for the error types that can escape a tool handler: a worker
/// that panicked or was cancelled, and anything carried in `anyhow`.
pub trait IntoMcpError {
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for anyhow::Error {
    fn into_mcp_error(self) -> McpError {
        // `{:#}` keeps the context chain on one line
        McpError::internal_error(format!("{:#}", self), None)
    }
}

impl IntoMcpError for tokio::task::JoinError {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(format!("database worker failed: {}", self), None)
    }
}

/// `.to_mcp_err()` on any `Result` whose error implements [`IntoMcpError`]
pub trait ResultExt<T> {
    fn to_mcp_err(self) -> Result<T, McpError>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> Result<T, McpError> {
        self.map_err(|e| e.into_mcp_error())
    }
}

/// Create an internal error with a message
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}
