//! LLM abstraction layer
//!
//! The conversation loop only talks to [`ChatModel`]. The wire types below
//! follow the OpenAI chat-completions format, which Ollama and most local
//! servers also accept on their `/v1` endpoints.

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A conversation history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool invocations requested by an assistant message, never `Some(vec![])`
    #[serde(
        default,
        deserialize_with = "non_empty_calls",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_calls: Option<Vec<ToolInvocation>>,
    /// Correlation id, set on tool results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant message carrying tool invocations (and optionally text)
    pub fn assistant_with_tools(content: Option<String>, calls: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(calls).filter(|calls| !calls.is_empty()),
            tool_call_id: None,
        }
    }

    /// Tool result correlated to the invocation `id`
    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Drop an empty `tool_calls` list, which OpenAI refuses on the next request
    pub fn normalized(mut self) -> Self {
        self.tool_calls = self.tool_calls.filter(|calls| !calls.is_empty());
        self
    }

    /// Tool invocations on this message; empty for plain replies
    pub fn invocations(&self) -> &[ToolInvocation] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

fn non_empty_calls<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<ToolInvocation>>, D::Error> {
    let calls = Option::<Vec<ToolInvocation>>::deserialize(deserializer)?;
    Ok(calls.filter(|calls| !calls.is_empty()))
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation id echoed back on the tool result
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: InvokedFunction,
}

/// Name and raw (undecoded) JSON arguments of an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokedFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: InvokedFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

fn function_type() -> String {
    "function".to_string()
}

/// A tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

/// Failures talking to the model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to reach model endpoint: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse model response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model response contained no choices")]
    EmptyResponse,
}

/// A chat model that can request tool invocations
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the full history and tool catalogue, get the next assistant message
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, ModelError>;

    /// Get the model name
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_tool_call_wire_format() {
        let message = ChatMessage::assistant_with_tools(
            None,
            vec![ToolInvocation::new("call_1", "run_sql", r#"{"query":"SELECT 1"}"#)],
        );

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "run_sql", "arguments": "{\"query\":\"SELECT 1\"}"}
                }]
            })
        );
    }

    #[test]
    fn test_empty_tool_calls_are_dropped() {
        let raw = json!({"role": "assistant", "content": "hi", "tool_calls": []});
        let message: ChatMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(message.tool_calls, None);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"role": "assistant", "content": "hi"})
        );

        let built = ChatMessage::assistant_with_tools(Some("hi".to_string()), vec![]);
        assert_eq!(built, message);

        let literal = ChatMessage {
            tool_calls: Some(vec![]),
            ..ChatMessage::assistant("hi")
        };
        assert_eq!(literal.normalized(), message);
    }

    #[test]
    fn test_tool_result_wire_format() {
        let message = ChatMessage::tool_result("call_1", r#"{"ok":true}"#);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"role": "tool", "content": "{\"ok\":true}", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn test_parse_response_message_with_null_content() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "refusal": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "get_schema", "arguments": "{}"}
            }]
        }))
        .unwrap();

        assert!(message.content.is_none());
        assert_eq!(message.invocations().len(), 1);
        assert_eq!(message.invocations()[0].function.name, "get_schema");
    }

    #[test]
    fn test_plain_reply_has_no_invocations() {
        let message = ChatMessage::assistant("There are 3 users.");
        assert!(message.invocations().is_empty());
    }
}
