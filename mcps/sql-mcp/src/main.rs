//! SQL MCP Server
//!
//! Serves `get_schema` and `run_sql` over stdio for the database named by
//! `DATABASE_PATH`.

use sql_mcp::SqlMcpServer;

mcp_common::serve_stdio!(SqlMcpServer::from_env, "sql_mcp");
