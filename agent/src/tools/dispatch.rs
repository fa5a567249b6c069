//! Tool dispatch
//!
//! Invocations are validated into a [`ToolCall`] before any work happens.
//! Validation failures become [`ToolOutput::Rejected`] so the model sees an
//! ordinary error result; only introspection failures escape as errors.

use rusqlite::Connection;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::{FINISH, GET_SCHEMA, RUN_SQL};
use crate::db::{self, AuditLog, DbError, QueryOutcome, RowLimit};

/// A validated invocation, one variant per registry entry
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    GetSchema,
    RunSql { query: String, limit: RowLimit },
    Finish { response: String },
}

/// Why an invocation was rejected before reaching the database
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing SQL query text.")]
    MissingQuery,

    #[error("Invalid JSON arguments received.")]
    InvalidArguments,
}

impl ToolCall {
    /// Decode the raw argument text, then validate it
    ///
    /// Empty text counts as `{}`; anything that is not a JSON object is
    /// rejected as invalid arguments.
    pub fn decode(name: &str, raw_arguments: &str) -> Result<Self, ToolError> {
        let raw = raw_arguments.trim();
        let arguments: Value = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|_| ToolError::InvalidArguments)?
        };

        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments);
        }

        Self::parse(name, &arguments)
    }

    /// Validate already-decoded arguments; undeclared fields are ignored
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        match name {
            GET_SCHEMA => Ok(ToolCall::GetSchema),
            RUN_SQL => {
                let query = arguments
                    .get("query")
                    .and_then(Value::as_str)
                    .ok_or(ToolError::MissingQuery)?;
                Ok(ToolCall::RunSql {
                    query: query.to_string(),
                    limit: RowLimit::from_json(arguments.get("limit")),
                })
            }
            FINISH => Ok(ToolCall::Finish {
                response: arguments
                    .get("response")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetSchema => GET_SCHEMA,
            ToolCall::RunSql { .. } => RUN_SQL,
            ToolCall::Finish { .. } => FINISH,
        }
    }
}

/// Normalized result of one invocation, serialized as the tool result payload
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// `{"ok": true, "schema": "..."}`
    Schema(String),
    /// Executor payload, see [`QueryOutcome`]
    Query(QueryOutcome),
    /// `{"ok": true, "ack": true, "response": "..."}`
    Finish(String),
    /// `{"ok": false, "error": "..."}`
    Rejected(ToolError),
}

impl ToolOutput {
    pub fn is_ok(&self) -> bool {
        match self {
            ToolOutput::Query(outcome) => outcome.is_ok(),
            ToolOutput::Rejected(_) => false,
            _ => true,
        }
    }

    /// Compact JSON for the tool-result history entry
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            // Only reachable if a value refuses to serialize
            format!(r#"{{"ok":false,"error":"failed to encode tool result: {}"}}"#, e)
        })
    }
}

impl Serialize for ToolOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolOutput::Query(outcome) => outcome.serialize(serializer),
            ToolOutput::Schema(schema) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("schema", schema)?;
                map.end()
            }
            ToolOutput::Finish(response) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("ack", &true)?;
                map.serialize_entry("response", response)?;
                map.end()
            }
            ToolOutput::Rejected(error) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", &error.to_string())?;
                map.end()
            }
        }
    }
}

/// Routes validated calls to the schema introspector and the executor
pub struct Dispatcher<'a> {
    conn: &'a Connection,
    audit: &'a AuditLog,
}

impl<'a> Dispatcher<'a> {
    pub fn new(conn: &'a Connection, audit: &'a AuditLog) -> Self {
        Self { conn, audit }
    }

    /// Decode, validate and run one invocation
    pub fn dispatch_raw(&self, name: &str, raw_arguments: &str) -> Result<ToolOutput, DbError> {
        match ToolCall::decode(name, raw_arguments) {
            Ok(call) => self.dispatch(call),
            Err(e) => {
                tracing::debug!("Rejected {} invocation: {}", name, e);
                Ok(ToolOutput::Rejected(e))
            }
        }
    }

    /// Run a validated call
    pub fn dispatch(&self, call: ToolCall) -> Result<ToolOutput, DbError> {
        match call {
            ToolCall::GetSchema => db::describe_schema(self.conn).map(ToolOutput::Schema),
            ToolCall::RunSql { query, limit } => Ok(ToolOutput::Query(db::execute(
                self.conn, &query, limit, self.audit,
            ))),
            ToolCall::Finish { response } => Ok(ToolOutput::Finish(response)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn users_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob');",
        )
        .unwrap();
        conn
    }

    fn dispatch(conn: &Connection, name: &str, args: &str) -> Value {
        let audit = AuditLog::disabled();
        let output = Dispatcher::new(conn, &audit).dispatch_raw(name, args).unwrap();
        serde_json::to_value(&output).unwrap()
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(ToolCall::decode("get_schema", "").unwrap(), ToolCall::GetSchema);
        assert_eq!(
            ToolCall::decode("run_sql", r#"{"query": "SELECT 1", "limit": "5"}"#).unwrap(),
            ToolCall::RunSql {
                query: "SELECT 1".to_string(),
                limit: RowLimit::new(5),
            }
        );
        assert_eq!(
            ToolCall::decode("finish", r#"{"response": "done"}"#).unwrap(),
            ToolCall::Finish {
                response: "done".to_string()
            }
        );
    }

    #[test]
    fn test_run_sql_default_limit() {
        let call = ToolCall::decode("run_sql", r#"{"query": "SELECT 1"}"#).unwrap();
        assert_eq!(
            call,
            ToolCall::RunSql {
                query: "SELECT 1".to_string(),
                limit: RowLimit::default(),
            }
        );
    }

    #[test]
    fn test_invalid_json_arguments() {
        assert_eq!(
            ToolCall::decode("run_sql", "{\"query\": "),
            Err(ToolError::InvalidArguments)
        );
        assert_eq!(
            ToolCall::decode("run_sql", "[1, 2]"),
            Err(ToolError::InvalidArguments)
        );
    }

    #[test]
    fn test_missing_query_does_not_touch_database() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("queries.log");
        let audit = AuditLog::to_file(&log_path);
        let conn = users_db();

        for args in ["{}", r#"{"limit": 5}"#, r#"{"query": 42}"#, r#"{"query": null}"#] {
            let output = Dispatcher::new(&conn, &audit).dispatch_raw("run_sql", args).unwrap();
            assert_eq!(
                serde_json::to_value(&output).unwrap(),
                json!({"ok": false, "error": "Missing SQL query text."})
            );
        }

        // Nothing was executed, so nothing was audited
        assert!(!log_path.exists());
    }

    #[test]
    fn test_unknown_tool() {
        let conn = users_db();
        assert_eq!(
            dispatch(&conn, "drop_everything", "{}"),
            json!({"ok": false, "error": "Unknown tool: drop_everything"})
        );
    }

    #[test]
    fn test_finish_echoes_response() {
        let conn = users_db();
        assert_eq!(
            dispatch(&conn, "finish", r#"{"response": "done"}"#),
            json!({"ok": true, "ack": true, "response": "done"})
        );
        assert_eq!(
            dispatch(&conn, "finish", "{}"),
            json!({"ok": true, "ack": true, "response": ""})
        );
    }

    #[test]
    fn test_get_schema() {
        let conn = users_db();
        assert_eq!(
            dispatch(&conn, "get_schema", "{}"),
            json!({"ok": true, "schema": "Table users: id INTEGER, name TEXT"})
        );
    }

    #[test]
    fn test_run_sql_routes_to_executor() {
        let conn = users_db();
        let result = dispatch(
            &conn,
            "run_sql",
            r#"{"query": "SELECT * FROM users", "limit": 1, "explain": true}"#,
        );
        assert_eq!(result["ok"], true);
        assert_eq!(result["type"], "rows");
        assert_eq!(result["row_count"], 1);
        assert_eq!(result["truncated"], true);
    }

    #[test]
    fn test_output_ok_flag() {
        assert!(ToolOutput::Finish("x".to_string()).is_ok());
        assert!(!ToolOutput::Rejected(ToolError::MissingQuery).is_ok());
        assert!(!ToolOutput::Query(QueryOutcome::Failed {
            error: "boom".to_string()
        })
        .is_ok());
    }

    #[test]
    fn test_json_string_is_compact() {
        let output = ToolOutput::Finish("kész".to_string());
        assert_eq!(
            output.to_json_string(),
            r#"{"ok":true,"ack":true,"response":"kész"}"#
        );
    }
}
