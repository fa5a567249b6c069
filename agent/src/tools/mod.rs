//! Tool registry
//!
//! The fixed catalogue offered to the model. The MCP server publishes the
//! same names and descriptions, so both surfaces share one contract.

mod dispatch;

pub use dispatch::{Dispatcher, ToolCall, ToolError, ToolOutput};

use serde_json::json;

use crate::db::executor::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT};
use crate::llm::{FunctionDefinition, ToolDefinition};

pub const GET_SCHEMA: &str = "get_schema";
pub const RUN_SQL: &str = "run_sql";
pub const FINISH: &str = "finish";

pub const GET_SCHEMA_DESCRIPTION: &str = "Return the current SQL schema as text. Use before writing SQL or when structure may have changed.";
pub const RUN_SQL_DESCRIPTION: &str =
    "Execute a SQL statement against the connected SQLite database and get back the results.";
pub const FINISH_DESCRIPTION: &str = "Send the final answer back to the user. Always call this when you are done reasoning and ready to respond.";

pub const QUERY_ARG_DESCRIPTION: &str = "The SQL statement to run. Must be valid SQLite syntax.";
pub const LIMIT_ARG_DESCRIPTION: &str = "Maximum number of rows to return (1-500).";
pub const RESPONSE_ARG_DESCRIPTION: &str = "Human-readable answer that will be shown to the user.";

/// The three tools, in the order they are offered
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        function(
            GET_SCHEMA,
            GET_SCHEMA_DESCRIPTION,
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false,
            }),
        ),
        function(
            RUN_SQL,
            RUN_SQL_DESCRIPTION,
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": QUERY_ARG_DESCRIPTION,
                    },
                    "limit": {
                        "type": "integer",
                        "description": LIMIT_ARG_DESCRIPTION,
                        "minimum": 1,
                        "maximum": MAX_ROW_LIMIT,
                        "default": DEFAULT_ROW_LIMIT,
                    },
                },
                "required": ["query"],
                "additionalProperties": false,
            }),
        ),
        function(
            FINISH,
            FINISH_DESCRIPTION,
            json!({
                "type": "object",
                "properties": {
                    "response": {
                        "type": "string",
                        "description": RESPONSE_ARG_DESCRIPTION,
                    },
                },
                "required": ["response"],
                "additionalProperties": false,
            }),
        ),
    ]
}

fn function(
    name: &'static str,
    description: &'static str,
    parameters: serde_json::Value,
) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function",
        function: FunctionDefinition {
            name,
            description,
            parameters,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_names_and_order() {
        let names: Vec<_> = tool_definitions().iter().map(|t| t.function.name).collect();
        assert_eq!(names, vec![GET_SCHEMA, RUN_SQL, FINISH]);
    }

    #[test]
    fn test_schemas_are_strict() {
        for tool in tool_definitions() {
            assert_eq!(tool.tool_type, "function");
            assert_eq!(tool.function.parameters["type"], "object");
            assert_eq!(
                tool.function.parameters["additionalProperties"], false,
                "{} must not accept undeclared fields",
                tool.function.name
            );
        }
    }

    #[test]
    fn test_run_sql_arguments() {
        let tools = tool_definitions();
        let params = &tools[1].function.parameters;
        assert_eq!(params["required"], serde_json::json!(["query"]));
        assert_eq!(params["properties"]["query"]["type"], "string");
        assert_eq!(params["properties"]["limit"]["type"], "integer");
        assert_eq!(params["properties"]["limit"]["minimum"], 1);
        assert_eq!(params["properties"]["limit"]["maximum"], 500);
        assert_eq!(params["properties"]["limit"]["default"], 100);
    }

    #[test]
    fn test_finish_requires_response() {
        let tools = tool_definitions();
        assert_eq!(tools[2].function.parameters["required"], serde_json::json!(["response"]));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(&tool_definitions()[0]).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_schema");
        assert_eq!(json["function"]["parameters"]["properties"], serde_json::json!({}));
    }
}
