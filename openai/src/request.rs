//! Wire types for the `POST /chat/completions` request body.

use recall_core::llm::{
    Message, Role,
    model::Parameters,
    tool::ToolDefinition,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatToolPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

impl ChatCompletionRequest {
    pub(crate) fn new(
        model: String,
        messages: &[Message],
        parameters: &Parameters,
        tool_definitions: &[ToolDefinition],
    ) -> Self {
        let response_format = parameters.structured_outputs.then(|| {
            serde_json::json!({"type": "json_object"})
        });
        Self {
            model,
            messages: messages.iter().map(ChatMessagePayload::from_message).collect(),
            temperature: parameters.temperature,
            tools: tool_definitions.iter().map(ChatToolPayload::from_definition).collect(),
            response_format,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessagePayload {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCallPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessagePayload {
    fn from_message(message: &Message) -> Self {
        let role = match message.role() {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        };
        Self {
            role,
            content: Some(message.content().to_string()),
            tool_calls: message
                .tool_calls()
                .iter()
                .map(ChatToolCallPayload::from_tool_call)
                .collect(),
            tool_call_id: message.tool_call_id().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatToolCallPayload {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatToolFunctionPayload,
}

impl ChatToolCallPayload {
    fn from_tool_call(call: &recall_core::llm::ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: "function",
            function: ChatToolFunctionPayload {
                name: call.name.clone(),
                arguments: call.arguments_json(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatToolFunctionPayload {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatToolPayload {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatToolFunctionPayload2,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatToolFunctionPayload2 {
    name: String,
    description: String,
    parameters: Value,
}

impl ChatToolPayload {
    fn from_definition(def: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: ChatToolFunctionPayload2 {
                name: def.name().to_string(),
                description: def.description().to_string(),
                parameters: serde_json::to_value(def.arguments_schema()).unwrap_or_default(),
            },
        }
    }
}
