//! Provider transport boundary: step 4 of the `startStream` contract
//! ("invoke provider transport, obtaining an async event source"). One
//! `stream` call is one logical turn; any tool calls the model makes are
//! accumulated and executed by the Stream Manager, not by the transport.

use async_trait::async_trait;
use mux_protocol::StreamErrorType;
use mux_protocol::ThinkingLevel;
use mux_protocol::TokenUsage;
use mux_protocol::ToolCallId;
use mux_tools::ToolSpec;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

pub struct ProviderRequest {
    pub model: String,
    pub system_message: String,
    /// Flattened conversation text; a real transport would send structured
    /// per-role messages, but this crate never talks to a real provider.
    pub transcript: Vec<(mux_protocol::Role, String)>,
    pub tools: Vec<ToolSpec>,
    pub thinking_level: Option<ThinkingLevel>,
    pub max_output_tokens: Option<u32>,
    /// Omitted on the next send after a lost-response-id recovery.
    pub previous_response_id: Option<String>,
    /// Where to place `cache_control` breakpoints, per `mux_cache`'s planner.
    /// Empty when the provider doesn't support prompt caching.
    pub cache_breakpoints: Vec<mux_cache::CacheBreakpoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    TextDelta(String),
    ReasoningDelta(String),
    ReasoningEnd,
    ToolCallStart {
        tool_call_id: ToolCallId,
        tool_name: String,
    },
    ToolCallDelta {
        tool_call_id: ToolCallId,
        input_patch: JsonValue,
    },
    /// Synthetic marker: the provider has finished emitting this call's
    /// arguments and the Manager should now execute it. Not part of the
    /// subscriber-facing IPC alphabet, purely an internal accumulation cue.
    ToolCallArgsDone {
        tool_call_id: ToolCallId,
    },
    Finish {
        usage: Option<TokenUsage>,
        provider_metadata: Option<JsonValue>,
        response_id: Option<String>,
    },
    Error {
        message: String,
        /// `None` when the transport doesn't know the taxonomy bucket and
        /// wants the Manager to classify it (e.g. via the lost-response-id
        /// substring match).
        error_type: Option<StreamErrorType>,
    },
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn stream(&self, request: ProviderRequest, events: mpsc::Sender<ProviderEvent>);
}
