//! End-to-end scenario tests for the Stream Manager: rapid double-send,
//! bash-sleep interrupt, context overflow, lost-response-id recovery,
//! compaction, and edit-during-stream. Each drives a `StreamManager` wired to
//! a `FakeRuntime` + `FakeProviderTransport` and observes the IPC bus,
//! following the same fixture-then-assert shape as `mux-ipc`'s bus tests.

#[path = "support/mod.rs"]
mod support;

use mux_core::ProviderEvent;
use mux_core::Script;
use mux_protocol::IpcEvent;
use mux_protocol::Role;
use mux_protocol::SendMessageOptions;
use mux_protocol::StreamErrorType;
use mux_protocol::ToolCallId;
use mux_runtime::ScriptedExit;
use std::time::Duration;
use std::time::Instant;

#[tokio::test]
async fn rapid_double_send_cancels_the_first_stream() {
    let fx = support::setup().await;

    fx.provider.script_call(0, Script::BlocksUntilAborted);
    fx.provider.script_call(
        1,
        Script::Events(vec![ProviderEvent::Finish {
            usage: None,
            provider_metadata: None,
            response_id: None,
        }]),
    );

    let mut sub = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let mut receiver = sub.receiver;
    drop(sub.initial.drain(..));

    fx.manager
        .send_message(fx.workspace_id, "first", SendMessageOptions::default())
        .await
        .unwrap();
    let first_start = support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamStart { .. })).await;
    let first_id = first_start.message_id().unwrap();

    fx.manager
        .send_message(fx.workspace_id, "second", SendMessageOptions::default())
        .await
        .unwrap();

    let first_abort = support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamAbort { .. })).await;
    assert_eq!(first_abort.message_id(), Some(first_id));

    let second_start = support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamStart { .. })).await;
    assert_ne!(second_start.message_id(), Some(first_id));

    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamEnd { .. })).await;
}

#[tokio::test]
async fn interrupting_a_blocked_bash_call_resolves_under_two_seconds() {
    let fx = support::setup().await;
    fx.runtime.script("bash", ScriptedExit::BlocksUntilKilled);

    let tool_call_id = ToolCallId::from("call_1");
    fx.provider.script_call(
        0,
        Script::Events(vec![
            ProviderEvent::ToolCallStart {
                tool_call_id: tool_call_id.clone(),
                tool_name: "bash".to_string(),
            },
            ProviderEvent::ToolCallDelta {
                tool_call_id: tool_call_id.clone(),
                input_patch: serde_json::json!({ "command": "sleep 60" }),
            },
            ProviderEvent::ToolCallArgsDone { tool_call_id },
        ]),
    );

    let mut sub = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let mut receiver = sub.receiver;
    drop(sub.initial.drain(..));

    fx.manager
        .send_message(fx.workspace_id, "run a long command", SendMessageOptions::default())
        .await
        .unwrap();

    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::ToolCallStart { .. })).await;
    // Give the tool call a moment to actually start blocking on the runtime.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    fx.manager.interrupt_stream(fx.workspace_id).await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "interrupt took {:?}",
        started.elapsed()
    );

    let end = support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::ToolCallEnd { .. })).await;
    if let IpcEvent::ToolCallEnd { outcome, .. } = end {
        let mux_protocol::ToolCallOutcome::Result { result } = outcome else {
            panic!("expected the killed process's exit status, got an error outcome");
        };
        assert_eq!(result["killed"], serde_json::json!(true));
    }

    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamAbort { .. })).await;
}

#[tokio::test]
async fn context_overflow_commits_the_partial_message() {
    let fx = support::setup().await;

    fx.provider.script_call(
        0,
        Script::Events(vec![
            ProviderEvent::TextDelta("partial answer before it blew up".to_string()),
            ProviderEvent::Error {
                message: "maximum context length exceeded".to_string(),
                error_type: Some(StreamErrorType::ContextExceeded),
            },
        ]),
    );

    let mut sub = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let mut receiver = sub.receiver;
    drop(sub.initial.drain(..));

    fx.manager
        .send_message(fx.workspace_id, "hello", SendMessageOptions::default())
        .await
        .unwrap();

    let error_event = support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamError { .. })).await;
    match error_event {
        IpcEvent::StreamError { error_type, .. } => assert_eq!(error_type, StreamErrorType::ContextExceeded),
        _ => unreachable!(),
    }

    // interrupt_stream is a no-op once the actor is idle, but confirms the
    // actor didn't wedge after the error.
    fx.manager.interrupt_stream(fx.workspace_id).await.unwrap();
}

#[tokio::test]
async fn lost_response_id_is_omitted_from_the_next_request() {
    let fx = support::setup().await;

    fx.provider.script_call(
        0,
        Script::Events(vec![ProviderEvent::Finish {
            usage: None,
            provider_metadata: None,
            response_id: Some("resp_111".to_string()),
        }]),
    );
    fx.provider.script_call(
        1,
        Script::Events(vec![ProviderEvent::Error {
            message: "Previous response with id 'resp_111' not found".to_string(),
            error_type: None,
        }]),
    );
    fx.provider.script_call(
        2,
        Script::Events(vec![ProviderEvent::Finish {
            usage: None,
            provider_metadata: None,
            response_id: Some("resp_333".to_string()),
        }]),
    );

    let mut sub = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let mut receiver = sub.receiver;
    drop(sub.initial.drain(..));

    fx.manager
        .send_message(fx.workspace_id, "turn one", SendMessageOptions::default())
        .await
        .unwrap();
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamEnd { .. })).await;

    fx.manager
        .send_message(fx.workspace_id, "turn two, will fail", SendMessageOptions::default())
        .await
        .unwrap();
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamError { .. })).await;

    fx.manager
        .send_message(fx.workspace_id, "turn three", SendMessageOptions::default())
        .await
        .unwrap();
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamEnd { .. })).await;

    let requests = fx.provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].previous_response_id, None);
    assert_eq!(requests[1].previous_response_id, Some("resp_111".to_string()));
    assert_eq!(requests[2].previous_response_id, None);
}

#[tokio::test]
async fn compaction_replaces_history_with_a_summary_carrying_historical_usage() {
    let fx = support::setup().await;

    fx.provider.script_call(
        0,
        Script::Events(vec![ProviderEvent::Finish {
            usage: Some(mux_protocol::TokenUsage {
                input_tokens: Some(100),
                output_tokens: Some(50),
                ..Default::default()
            }),
            provider_metadata: None,
            response_id: None,
        }]),
    );
    fx.provider.script_call(
        1,
        Script::Events(vec![
            ProviderEvent::TextDelta("summary of the conversation so far".to_string()),
            ProviderEvent::Finish {
                usage: None,
                provider_metadata: None,
                response_id: None,
            },
        ]),
    );

    let mut sub = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let mut receiver = sub.receiver;
    drop(sub.initial.drain(..));

    fx.manager
        .send_message(fx.workspace_id, "hello", SendMessageOptions::default())
        .await
        .unwrap();
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamEnd { .. })).await;

    let mut options = SendMessageOptions::default();
    options.mux_metadata = Some(mux_protocol::MuxMetadata::CompactionRequest {
        target_words: Some(200),
        continue_message: None,
        resume_model: None,
    });
    fx.manager
        .send_message(fx.workspace_id, "/compact", options)
        .await
        .unwrap();

    let whole = support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::Whole { .. })).await;
    let IpcEvent::Whole { message } = whole else {
        unreachable!()
    };
    assert!(message.compacted);
    assert_eq!(message.historical_usage.unwrap().input_tokens, Some(100));

    let history = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let whole_messages: Vec<_> = history
        .initial
        .iter()
        .filter(|e| matches!(e, IpcEvent::Whole { .. }))
        .collect();
    assert_eq!(whole_messages.len(), 1, "history should hold only the summary after compaction");
}

#[tokio::test]
async fn editing_a_message_mid_stream_aborts_then_truncates_before_resending() {
    let fx = support::setup().await;

    fx.provider.script_call(
        0,
        Script::Events(vec![ProviderEvent::Finish {
            usage: None,
            provider_metadata: None,
            response_id: None,
        }]),
    );
    fx.provider.script_call(1, Script::BlocksUntilAborted);
    fx.provider.script_call(
        2,
        Script::Events(vec![ProviderEvent::Finish {
            usage: None,
            provider_metadata: None,
            response_id: None,
        }]),
    );

    let mut sub = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let mut receiver = sub.receiver;
    drop(sub.initial.drain(..));

    // A turn that completes cleanly before the one we're going to edit, so
    // there's a real, addressable message to truncate after.
    fx.manager
        .send_message(fx.workspace_id, "turn zero", SendMessageOptions::default())
        .await
        .unwrap();
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamEnd { .. })).await;
    let turn_zero_id = fx
        .manager
        .subscribe_chat(fx.workspace_id)
        .await
        .unwrap()
        .initial
        .into_iter()
        .find_map(|e| match e {
            IpcEvent::Whole { message } if message.role == Role::User => Some(message.id),
            _ => None,
        })
        .expect("turn zero's user message is in history");

    fx.manager
        .send_message(fx.workspace_id, "original", SendMessageOptions::default())
        .await
        .unwrap();
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamStart { .. })).await;

    let mut options = SendMessageOptions::default();
    options.edit_message_id = Some(turn_zero_id);
    fx.manager
        .send_message(fx.workspace_id, "edited", options)
        .await
        .unwrap();

    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamAbort { .. })).await;
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamStart { .. })).await;
    support::recv_until(&mut receiver, |e| matches!(e, IpcEvent::StreamEnd { .. })).await;

    let requests = fx.provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    drop(requests);

    let history = fx.manager.subscribe_chat(fx.workspace_id).await.unwrap();
    let texts: Vec<String> = history
        .initial
        .iter()
        .filter_map(|e| match e {
            IpcEvent::Whole { message } => Some(message.text()),
            _ => None,
        })
        .collect();
    assert!(texts.contains(&"turn zero".to_string()));
    assert!(texts.contains(&"edited".to_string()));
    assert!(
        !texts.contains(&"original".to_string()),
        "the edited-away turn should have been truncated out of history, got {texts:?}"
    );
}
