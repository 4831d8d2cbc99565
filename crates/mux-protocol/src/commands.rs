use crate::ids::MessageId;
use crate::ids::WorkspaceId;
use crate::message::MuxMetadata;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingLevel {
    Off,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Enable,
    Disable,
}

/// One rule in a tool policy's ordered list. The pattern is a regex matched
/// against the tool name; the first rule that matches wins. `mux-tools` owns
/// compiling these into runtime `Regex`es.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct ToolPolicyRule {
    pub pattern: String,
    pub action: PolicyAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
pub struct ImagePart {
    pub mime_type: String,
    #[ts(type = "string")]
    pub base64: String,
}

/// Options accompanying `workspace.sendMessage`. `edit_message_id`
/// selects the edit-then-send path; `mux_metadata` carries a compaction request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageOptions {
    pub model: Option<String>,
    pub thinking_level: Option<ThinkingLevel>,
    pub tool_policy: Option<Vec<ToolPolicyRule>>,
    pub additional_system_instructions: Option<String>,
    pub mode: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub edit_message_id: Option<MessageId>,
    pub image_parts: Option<Vec<ImagePart>>,
    pub mux_metadata: Option<MuxMetadata>,
    pub provider_options: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "snake_case")]
pub enum SendMessageErrorType {
    ApiKeyNotFound,
    InvalidModelString,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageError {
    #[serde(rename = "type")]
    pub error_type: SendMessageErrorType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResult {
    pub success: bool,
    pub error: Option<SendMessageError>,
}

impl SendMessageResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn err(error_type: SendMessageErrorType, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(SendMessageError {
                error_type,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceChatHistoryRequest {
    pub workspace_id: WorkspaceId,
}
