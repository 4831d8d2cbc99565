use crate::error::StreamErrorType;
use crate::ids::MessageId;
use crate::ids::ToolCallId;
use crate::ids::WorkspaceId;
use crate::message::Message;
use crate::usage::RateLimitSnapshot;
use crate::usage::TokenUsage;
use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct StreamEndMetadata {
    pub usage: Option<TokenUsage>,
    pub duration_ms: u64,
    pub provider_metadata: Option<JsonValue>,
    pub rate_limits: Option<RateLimitSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct StreamAbortMetadata {
    /// Usage may be absent: a very late abort can race the final usage frame.
    /// Downstream code must tolerate both `Some` and `None` here (Open Question,
    /// see DESIGN.md).
    pub usage: Option<TokenUsage>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub error_type: Option<StreamErrorType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolCallOutcome {
    Result { result: JsonValue },
    Error { error: String },
}

/// The IPC event alphabet. Every event is scoped to one
/// `messageId`, except `DeleteMessage` and `CaughtUp`. Exhaustiveness of the
/// match in the Aggregator is what keeps new event kinds from being silently
/// dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IpcEvent {
    StreamStart {
        message_id: MessageId,
        history_sequence: u64,
        model: String,
    },
    StreamDelta {
        message_id: MessageId,
        delta: String,
        tokens: Option<u64>,
        #[ts(type = "string")]
        timestamp: DateTime<Utc>,
    },
    ReasoningDelta {
        message_id: MessageId,
        delta: String,
        tokens: Option<u64>,
    },
    ReasoningEnd {
        message_id: MessageId,
    },
    ToolCallStart {
        message_id: MessageId,
        tool_call_id: ToolCallId,
        tool_name: String,
    },
    ToolCallDelta {
        message_id: MessageId,
        tool_call_id: ToolCallId,
        input_patch: JsonValue,
    },
    ToolCallEnd {
        message_id: MessageId,
        tool_call_id: ToolCallId,
        tool_name: String,
        #[serde(flatten)]
        outcome: ToolCallOutcome,
    },
    StreamEnd {
        message_id: MessageId,
        metadata: StreamEndMetadata,
    },
    StreamAbort {
        message_id: MessageId,
        metadata: StreamAbortMetadata,
    },
    StreamError {
        message_id: MessageId,
        error: String,
        error_type: StreamErrorType,
    },
    DeleteMessage {
        id: MessageId,
    },
    CaughtUp {
        workspace_id: WorkspaceId,
    },
    /// Whole-message events: historical replay or out-of-band updates (e.g.
    /// the synthesized summary message after compaction).
    Whole {
        message: Box<Message>,
    },
}

impl IpcEvent {
    /// The message this event is scoped to, if any. Used by the replay buffer
    /// to group events by stream.
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            IpcEvent::StreamStart { message_id, .. }
            | IpcEvent::StreamDelta { message_id, .. }
            | IpcEvent::ReasoningDelta { message_id, .. }
            | IpcEvent::ReasoningEnd { message_id }
            | IpcEvent::ToolCallStart { message_id, .. }
            | IpcEvent::ToolCallDelta { message_id, .. }
            | IpcEvent::ToolCallEnd { message_id, .. }
            | IpcEvent::StreamEnd { message_id, .. }
            | IpcEvent::StreamAbort { message_id, .. }
            | IpcEvent::StreamError { message_id, .. } => Some(*message_id),
            IpcEvent::DeleteMessage { id } => Some(*id),
            IpcEvent::Whole { message } => Some(message.id),
            IpcEvent::CaughtUp { .. } => None,
        }
    }

    /// True for the three events that can terminate a stream (invariant:
    /// every `StreamStart` is followed by exactly one of these for the same id).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IpcEvent::StreamEnd { .. } | IpcEvent::StreamAbort { .. } | IpcEvent::StreamError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caught_up_has_no_message_id() {
        let event = IpcEvent::CaughtUp {
            workspace_id: WorkspaceId::new(),
        };
        assert_eq!(event.message_id(), None);
    }

    #[test]
    fn stream_end_is_terminal() {
        let id = MessageId::new();
        let event = IpcEvent::StreamEnd {
            message_id: id,
            metadata: StreamEndMetadata {
                usage: None,
                duration_ms: 10,
                provider_metadata: None,
                rate_limits: None,
            },
        };
        assert!(event.is_terminal());
        assert_eq!(event.message_id(), Some(id));
    }

    #[test]
    fn stream_delta_is_not_terminal() {
        let event = IpcEvent::StreamDelta {
            message_id: MessageId::new(),
            delta: "hi".into(),
            tokens: None,
            timestamp: Utc::now(),
        };
        assert!(!event.is_terminal());
    }
}
