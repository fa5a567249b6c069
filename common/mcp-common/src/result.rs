//! Result helpers for MCP tool responses

use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use serde::Serialize;

/// Wrap any serializable payload as a single compact JSON text item
///
/// Tool payloads carry their own `ok` flag, so a payload describing a
/// failed statement is still a successful MCP call.
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json =
        serde_json::to_string(data).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_success_is_compact() {
        let result = json_success(&json!({"ok": true, "row_count": 1})).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
        let text = match &result.content[0].raw {
            rmcp::model::RawContent::Text(text) => text.text.clone(),
            other => panic!("expected text content, got {:?}", other),
        };
        assert!(!text.contains('\n'));
        assert!(text.contains("\"row_count\":1"));
    }

    #[test]
    fn test_json_success_keeps_failed_payload() {
        let result = json_success(&json!({"ok": false, "error": "no such table: x"})).unwrap();
        assert!(!result.is_error.unwrap_or(false));
    }
}
