use crate::error::MessageError;
use crate::ids::MessageId;
use crate::ids::ToolCallId;
use crate::usage::TokenUsage;
use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Result { result: JsonValue },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileData {
    Bytes {
        #[ts(type = "string")]
        base64: String,
    },
    Url {
        url: String,
    },
}

/// One segment of a message's content. A single assistant message accumulates
/// parts in order as the stream progresses: text/reasoning deltas append to
/// the last part of the matching kind, tool calls open a new part per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    /// Opaque model-internal thought, streamed separately so the UI can hide it.
    Reasoning {
        text: String,
    },
    ToolCall {
        tool_call_id: ToolCallId,
        tool_name: String,
        input: JsonValue,
        #[serde(flatten)]
        status: ToolCallStatus,
    },
    File {
        mime_type: String,
        data: FileData,
    },
}

/// A compaction request riding on a user message's `muxMetadata`. Any other
/// mux-specific out-of-band instruction to the orchestrator would be another
/// variant here; today compaction is the only one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MuxMetadata {
    CompactionRequest {
        target_words: Option<u32>,
        continue_message: Option<String>,
        resume_model: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub history_sequence: u64,
    pub role: Role,
    pub parts: Vec<Part>,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub provider_metadata: Option<JsonValue>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub compacted: bool,
    /// Summed usage of all messages discarded by compaction. Only ever set on
    /// a `compacted` assistant message, and always equal to the sum of the
    /// usages it replaces.
    pub historical_usage: Option<TokenUsage>,
    pub error: Option<MessageError>,
    pub mux_metadata: Option<MuxMetadata>,
}

impl Message {
    pub fn new_user(id: MessageId, history_sequence: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            history_sequence,
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
            timestamp: Utc::now(),
            model: None,
            usage: None,
            provider_metadata: None,
            duration_ms: None,
            partial: false,
            compacted: false,
            historical_usage: None,
            error: None,
            mux_metadata: None,
        }
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_call_ids(&self) -> Vec<&ToolCallId> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall { tool_call_id, .. } => Some(tool_call_id),
                _ => None,
            })
            .collect()
    }
}
