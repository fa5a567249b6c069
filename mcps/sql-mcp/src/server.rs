//! SQL MCP Server implementation
//!
//! Each tool call opens its own connection inside a blocking worker and
//! closes it before replying, so concurrent requests never share state.

use std::sync::Arc;

use mcp_common::{internal_error, json_success, McpError, ResultExt};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use sql_agent::db::{self, AuditLog, RowLimit};
use sql_agent::tools::{Dispatcher, ToolCall, ToolOutput};

use crate::config::SqlMcpConfig;

// ============================================================================
// Parameter Types
// ============================================================================

/// Parameters for run_sql tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunSqlParams {
    #[schemars(description = "The SQL statement to run. Must be valid SQLite syntax.")]
    pub query: String,

    /// Accepted loosely (numbers, numeric strings) and clamped to 1-500
    #[serde(default)]
    #[schemars(with = "Option<i64>", description = "Maximum number of rows to return (1-500).")]
    pub limit: Option<serde_json::Value>,
}

// ============================================================================
// Server Implementation
// ============================================================================

/// SQL MCP Server
#[derive(Clone)]
pub struct SqlMcpServer {
    config: Arc<SqlMcpConfig>,
    audit: AuditLog,
    tool_router: ToolRouter<Self>,
}

impl SqlMcpServer {
    pub fn new(config: SqlMcpConfig) -> Self {
        let audit = AuditLog::from_config(&config.audit);
        Self {
            config: Arc::new(config),
            audit,
            tool_router: Self::tool_router(),
        }
    }

    /// Build from the environment; a missing `DATABASE_PATH` is an error
    pub fn from_env() -> anyhow::Result<Self> {
        let config = SqlMcpConfig::from_env()?;
        tracing::info!("Serving {:?}", config.database_path);
        Ok(Self::new(config))
    }

    /// Run one call on a fresh connection in a blocking worker
    async fn dispatch(&self, call: ToolCall) -> Result<CallToolResult, McpError> {
        let path = self.config.database_path.clone();
        let audit = self.audit.clone();
        let name = call.name();

        let output: ToolOutput = tokio::task::spawn_blocking(move || {
            db::with_connection(&path, |conn| Dispatcher::new(conn, &audit).dispatch(call))
        })
        .await
        .to_mcp_err()?
        .and_then(|result| result)
        .map_err(|e| {
            tracing::warn!("{} failed: {}", name, e);
            internal_error(e.to_string())
        })?;

        json_success(&output)
    }
}

#[tool_router]
impl SqlMcpServer {
    /// Describe every user table
    #[tool(description = "Return the current SQL schema as text. Use before writing SQL or when structure may have changed.")]
    async fn get_schema(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(ToolCall::GetSchema).await
    }

    /// Run one statement with a row cap
    #[tool(description = "Execute a SQL statement against the connected SQLite database and get back the results.")]
    async fn run_sql(
        &self,
        Parameters(params): Parameters<RunSqlParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(ToolCall::RunSql {
            query: params.query,
            limit: RowLimit::from_json(params.limit.as_ref()),
        })
        .await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for SqlMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "SQLite query server. Call get_schema to learn the tables, then run_sql to run \
                statements. Results are JSON with an `ok` flag; failed statements are rolled back."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
