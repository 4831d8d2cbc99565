//! Aggregator (C10): folds an `IpcEvent` sequence into a materialized
//! `Message` list. Pure, no I/O, so a future non-Rust frontend can
//! re-implement it from `mux-protocol`'s wire types alone.

use chrono::Utc;
use mux_protocol::IpcEvent;
use mux_protocol::Message;
use mux_protocol::MessageId;
use mux_protocol::Part;
use mux_protocol::Role;
use mux_protocol::ToolCallOutcome;
use mux_protocol::ToolCallStatus;
use std::collections::HashMap;

/// Consumer-side materialized view, rebuilt by replaying events. Holding it
/// across calls lets `apply` stay O(1) per event instead of O(N) per delta.
#[derive(Debug, Default)]
pub struct Aggregator {
    messages: Vec<Message>,
    index: HashMap<MessageId, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Applies a batch of buffered replay events in one pass, avoiding
    /// per-event churn during initial catch-up.
    pub fn apply_batch(&mut self, events: impl IntoIterator<Item = IpcEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    pub fn apply(&mut self, event: IpcEvent) {
        match event {
            IpcEvent::StreamStart {
                message_id,
                history_sequence,
                model,
            } => {
                let message = Message {
                    id: message_id,
                    history_sequence,
                    role: Role::Assistant,
                    parts: Vec::new(),
                    timestamp: Utc::now(),
                    model: Some(model),
                    usage: None,
                    provider_metadata: None,
                    duration_ms: None,
                    partial: true,
                    compacted: false,
                    historical_usage: None,
                    error: None,
                    mux_metadata: None,
                };
                self.upsert(message);
            }
            IpcEvent::StreamDelta {
                message_id, delta, ..
            } => {
                self.with_message(message_id, |message| {
                    append_text_delta(message, &delta);
                });
            }
            IpcEvent::ReasoningDelta {
                message_id, delta, ..
            } => {
                self.with_message(message_id, |message| {
                    append_reasoning_delta(message, &delta);
                });
            }
            IpcEvent::ReasoningEnd { .. } => {}
            IpcEvent::ToolCallStart {
                message_id,
                tool_call_id,
                tool_name,
            } => {
                self.with_message(message_id, |message| {
                    message.parts.push(Part::ToolCall {
                        tool_call_id,
                        tool_name,
                        input: serde_json::Value::Object(Default::default()),
                        status: ToolCallStatus::Pending,
                    });
                });
            }
            IpcEvent::ToolCallDelta {
                message_id,
                tool_call_id,
                input_patch,
            } => {
                self.with_message(message_id, |message| {
                    patch_tool_call_input(message, &tool_call_id, input_patch);
                });
            }
            IpcEvent::ToolCallEnd {
                message_id,
                tool_call_id,
                outcome,
                ..
            } => {
                self.with_message(message_id, |message| {
                    seal_tool_call(message, &tool_call_id, outcome);
                });
            }
            IpcEvent::StreamEnd { message_id, metadata } => {
                self.with_message(message_id, |message| {
                    message.partial = false;
                    message.usage = metadata.usage;
                    message.duration_ms = Some(metadata.duration_ms);
                    message.provider_metadata = metadata.provider_metadata;
                });
            }
            IpcEvent::StreamAbort { message_id, metadata } => {
                self.with_message(message_id, |message| {
                    message.partial = true;
                    message.usage = metadata.usage;
                    message.duration_ms = Some(metadata.duration_ms);
                });
            }
            IpcEvent::StreamError {
                message_id,
                error,
                error_type,
            } => {
                self.with_message(message_id, |message| {
                    message.partial = true;
                    message.error = Some(mux_protocol::MessageError {
                        error_type,
                        message: error,
                    });
                });
            }
            IpcEvent::DeleteMessage { id } => {
                if let Some(&pos) = self.index.get(&id) {
                    self.messages.remove(pos);
                    self.reindex();
                }
            }
            IpcEvent::CaughtUp { .. } => {}
            IpcEvent::Whole { message } => {
                self.upsert(*message);
            }
        }
    }

    fn upsert(&mut self, message: Message) {
        if let Some(&pos) = self.index.get(&message.id) {
            self.messages[pos] = message;
        } else {
            self.index.insert(message.id, self.messages.len());
            self.messages.push(message);
        }
    }

    fn with_message(&mut self, id: MessageId, f: impl FnOnce(&mut Message)) {
        if let Some(&pos) = self.index.get(&id) {
            f(&mut self.messages[pos]);
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, message) in self.messages.iter().enumerate() {
            self.index.insert(message.id, pos);
        }
    }
}

fn append_text_delta(message: &mut Message, delta: &str) {
    if let Some(Part::Text { text }) = message.parts.last_mut() {
        text.push_str(delta);
        return;
    }
    message.parts.push(Part::Text {
        text: delta.to_string(),
    });
}

fn append_reasoning_delta(message: &mut Message, delta: &str) {
    if let Some(Part::Reasoning { text }) = message.parts.last_mut() {
        text.push_str(delta);
        return;
    }
    message.parts.push(Part::Reasoning {
        text: delta.to_string(),
    });
}

fn patch_tool_call_input(
    message: &mut Message,
    tool_call_id: &mux_protocol::ToolCallId,
    patch: serde_json::Value,
) {
    for part in &mut message.parts {
        if let Part::ToolCall {
            tool_call_id: id,
            input,
            ..
        } = part
        {
            if id == tool_call_id {
                match (input.as_object_mut(), patch.as_object()) {
                    (Some(existing), Some(patch_obj)) => {
                        for (k, v) in patch_obj {
                            existing.insert(k.clone(), v.clone());
                        }
                    }
                    _ => *input = patch,
                }
                return;
            }
        }
    }
}

fn seal_tool_call(
    message: &mut Message,
    tool_call_id: &mux_protocol::ToolCallId,
    outcome: ToolCallOutcome,
) {
    for part in &mut message.parts {
        if let Part::ToolCall {
            tool_call_id: id,
            status,
            ..
        } = part
        {
            if id == tool_call_id {
                *status = match outcome {
                    ToolCallOutcome::Result { result } => ToolCallStatus::Result { result },
                    ToolCallOutcome::Error { error } => ToolCallStatus::Error { error },
                };
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mux_protocol::StreamEndMetadata;
    use mux_protocol::ToolCallId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deltas_append_to_a_single_text_part() {
        let mut agg = Aggregator::new();
        let id = MessageId::new();
        agg.apply(IpcEvent::StreamStart {
            message_id: id,
            history_sequence: 0,
            model: "gpt-5".into(),
        });
        agg.apply(IpcEvent::StreamDelta {
            message_id: id,
            delta: "Hello, ".into(),
            tokens: None,
            timestamp: Utc::now(),
        });
        agg.apply(IpcEvent::StreamDelta {
            message_id: id,
            delta: "world".into(),
            tokens: None,
            timestamp: Utc::now(),
        });
        assert_eq!(agg.messages()[0].text(), "Hello, world");
        assert!(agg.messages()[0].partial);
    }

    #[test]
    fn tool_call_lifecycle_opens_patches_and_seals() {
        let mut agg = Aggregator::new();
        let id = MessageId::new();
        let tool_call_id = ToolCallId::from("call_1");
        agg.apply(IpcEvent::StreamStart {
            message_id: id,
            history_sequence: 0,
            model: "gpt-5".into(),
        });
        agg.apply(IpcEvent::ToolCallStart {
            message_id: id,
            tool_call_id: tool_call_id.clone(),
            tool_name: "bash".into(),
        });
        agg.apply(IpcEvent::ToolCallDelta {
            message_id: id,
            tool_call_id: tool_call_id.clone(),
            input_patch: json!({ "command": "ls" }),
        });
        agg.apply(IpcEvent::ToolCallEnd {
            message_id: id,
            tool_call_id: tool_call_id.clone(),
            tool_name: "bash".into(),
            outcome: ToolCallOutcome::Result {
                result: json!({ "exitCode": 0 }),
            },
        });

        let Part::ToolCall {
            input,
            status,
            tool_call_id: got_id,
            ..
        } = &agg.messages()[0].parts[0]
        else {
            panic!("expected a tool call part");
        };
        assert_eq!(got_id, &tool_call_id);
        assert_eq!(input, &json!({ "command": "ls" }));
        assert!(matches!(status, ToolCallStatus::Result { .. }));
    }

    #[test]
    fn stream_end_seals_partial_false() {
        let mut agg = Aggregator::new();
        let id = MessageId::new();
        agg.apply(IpcEvent::StreamStart {
            message_id: id,
            history_sequence: 0,
            model: "gpt-5".into(),
        });
        agg.apply(IpcEvent::StreamEnd {
            message_id: id,
            metadata: StreamEndMetadata {
                usage: None,
                duration_ms: 42,
                provider_metadata: None,
                rate_limits: None,
            },
        });
        assert!(!agg.messages()[0].partial);
        assert_eq!(agg.messages()[0].duration_ms, Some(42));
    }

    #[test]
    fn delete_message_removes_it() {
        let mut agg = Aggregator::new();
        let id = MessageId::new();
        agg.apply(IpcEvent::StreamStart {
            message_id: id,
            history_sequence: 0,
            model: "gpt-5".into(),
        });
        agg.apply(IpcEvent::DeleteMessage { id });
        assert!(agg.messages().is_empty());
    }

    #[test]
    fn batch_replay_applies_in_one_pass() {
        let mut agg = Aggregator::new();
        let id = MessageId::new();
        agg.apply_batch(vec![
            IpcEvent::StreamStart {
                message_id: id,
                history_sequence: 0,
                model: "gpt-5".into(),
            },
            IpcEvent::StreamDelta {
                message_id: id,
                delta: "hi".into(),
                tokens: None,
                timestamp: Utc::now(),
            },
        ]);
        assert_eq!(agg.messages()[0].text(), "hi");
    }
}
