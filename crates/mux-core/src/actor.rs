//! One `WorkspaceActor` task per workspace: a `tokio` task owning the
//! per-workspace `StreamState` plus a command mailbox, per Design Note §9
//! ("actor-per-workspace rather than a lock"). `startStream`'s setup
//! (steps 1-3) runs serially in the mailbox loop; the actual streaming
//! (steps 4-9) runs as a detached child task so `Interrupt` never waits
//! behind a long-running stream to be popped off the mailbox.

use crate::compaction;
use crate::provider::ProviderEvent;
use crate::provider::ProviderRequest;
use crate::provider::ProviderTransport;
use crate::session::SessionState;
use crate::state::StreamState;
use chrono::Utc;
use mux_protocol::Message;
use mux_protocol::MessageError;
use mux_protocol::MessageId;
use mux_protocol::Part;
use mux_protocol::Role;
use mux_protocol::StreamAbortMetadata;
use mux_protocol::StreamEndMetadata;
use mux_protocol::StreamErrorType;
use mux_protocol::ThinkingLevel;
use mux_protocol::ToolCallId;
use mux_protocol::ToolCallOutcome;
use mux_protocol::WorkspaceId;
use mux_ipc::WorkspaceBus;
use mux_store::HistoryStore;
use mux_store::PartialStore;
use mux_tools::AbortHandle;
use mux_tools::AbortSignal;
use mux_tools::ToolContext;
use mux_tools::ToolPolicy;
use mux_tools::ToolRegistry;
use mux_runtime::Runtime;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long a `send` blocks with no provider event before the stream is
/// failed as `provider_transient`.
const PROVIDER_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
/// Cadence at which the partial snapshot is flushed to disk.
const PARTIAL_FLUSH_INTERVAL: Duration = Duration::from_millis(250);

pub struct StartStreamRequest {
    pub model: String,
    pub system_message: String,
    pub transcript: Vec<(Role, String)>,
    pub thinking_level: Option<ThinkingLevel>,
    pub max_output_tokens: Option<u32>,
    pub tool_policy: ToolPolicy,
    pub history_sequence: u64,
    pub compaction: Option<compaction::CompactionRequestContext>,
    pub provider_supports_prompt_cache: bool,
}

pub struct StartStreamAck {
    pub message_id: MessageId,
}

/// A post-compaction continuation turn, dispatched once the summarization
/// stream finishes naturally. Carries its own workspace id since it is
/// handed off to a task outside the actor that owns it.
pub struct FollowUpRequest {
    pub workspace_id: WorkspaceId,
    pub model: String,
    pub text: String,
}

pub enum Command {
    StartStream {
        request: StartStreamRequest,
        reply: oneshot::Sender<StartStreamAck>,
    },
    Interrupt {
        reply: oneshot::Sender<()>,
    },
    ReplaceChatHistory {
        message: Message,
        reply: oneshot::Sender<()>,
    },
    /// Marks a running compaction as explicitly cancelled rather than merely
    /// interrupted: the subsequent `stream-abort` discards the partial
    /// summary instead of applying the accept-early sentinel. Replies
    /// `false` if `request_id` doesn't match the currently active compaction
    /// (already finished, or never one).
    CancelCompaction {
        request_id: MessageId,
        reply: oneshot::Sender<bool>,
    },
}

pub struct WorkspaceActor {
    workspace_id: WorkspaceId,
    history: Arc<dyn HistoryStore>,
    partial: Arc<dyn PartialStore>,
    bus: Arc<WorkspaceBus>,
    tools: Arc<ToolRegistry>,
    runtime: Arc<dyn Runtime>,
    provider: Arc<dyn ProviderTransport>,
    session: SessionState,
    state: StreamState,
    active_abort: Option<AbortHandle>,
    stream_task: Option<JoinHandle<StreamTaskResult>>,
    /// Set while a compaction stream is active; cleared on its completion.
    active_compaction: Option<(MessageId, Arc<std::sync::atomic::AtomicBool>)>,
    follow_up_tx: mpsc::Sender<FollowUpRequest>,
}

impl WorkspaceActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_id: WorkspaceId,
        history: Arc<dyn HistoryStore>,
        partial: Arc<dyn PartialStore>,
        bus: Arc<WorkspaceBus>,
        tools: Arc<ToolRegistry>,
        runtime: Arc<dyn Runtime>,
        provider: Arc<dyn ProviderTransport>,
        follow_up_tx: mpsc::Sender<FollowUpRequest>,
    ) -> Self {
        Self {
            workspace_id,
            history,
            partial,
            bus,
            tools,
            runtime,
            provider,
            session: SessionState::new(),
            state: StreamState::Idle,
            active_abort: None,
            stream_task: None,
            active_compaction: None,
            follow_up_tx,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let stream_done = async {
                match &mut self.stream_task {
                    Some(task) => task.await.ok(),
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                maybe_cmd = commands.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    }
                }
                recovered = stream_done, if self.stream_task.is_some() => {
                    self.stream_task = None;
                    self.active_abort = None;
                    self.active_compaction = None;
                    self.state = StreamState::Idle;
                    if let Some(result) = recovered {
                        self.apply_stream_task_result(result);
                    }
                }
            }
        }
    }

    /// Carries forward the provider's `previous_response_id` for the next
    /// turn and, if the stream that just finished was a compaction that
    /// requested a continuation, hands the follow-up turn off to the
    /// dispatcher task outside this actor.
    fn apply_stream_task_result(&mut self, result: StreamTaskResult) {
        if result.previous_response_id.is_some() {
            self.session.previous_response_id = result.previous_response_id;
        }
        if let Some((model, text)) = result.follow_up {
            self.dispatch_follow_up(model, text);
        }
    }

    fn dispatch_follow_up(&self, model: String, text: String) {
        let tx = self.follow_up_tx.clone();
        let workspace_id = self.workspace_id;
        tokio::spawn(async move {
            let _ = tx.send(FollowUpRequest { workspace_id, model, text }).await;
        });
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartStream { request, reply } => {
                self.ensure_previous_stream_finished().await;
                self.state = StreamState::Starting;

                let message_id = MessageId::new();
                tracing::info!(
                    workspace_id = %self.workspace_id,
                    %message_id,
                    model = %request.model,
                    "starting stream"
                );
                self.bus
                    .publish(mux_protocol::IpcEvent::StreamStart {
                        message_id,
                        history_sequence: request.history_sequence,
                        model: request.model.clone(),
                    })
                    .await;

                let (abort, handle) = AbortSignal::new();
                self.active_abort = Some(handle);
                self.state = StreamState::Streaming;

                let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
                self.active_compaction = request
                    .compaction
                    .as_ref()
                    .map(|ctx| (ctx.request_id, cancelled.clone()));

                let task = spawn_stream_task(
                    message_id,
                    request,
                    abort,
                    self.history.clone(),
                    self.partial.clone(),
                    self.bus.clone(),
                    self.tools.clone(),
                    self.runtime.clone(),
                    self.provider.clone(),
                    std::mem::take(&mut self.session.previous_response_id),
                    cancelled,
                );
                self.stream_task = Some(task);

                let _ = reply.send(StartStreamAck { message_id });
            }
            Command::Interrupt { reply } => {
                if let Some(abort) = self.active_abort.take() {
                    abort.abort();
                }
                self.join_stream_task().await;
                self.state = StreamState::Idle;
                let _ = reply.send(());
            }
            Command::CancelCompaction { request_id, reply } => {
                let matched = match &self.active_compaction {
                    Some((active_id, flag)) if *active_id == request_id => {
                        flag.store(true, std::sync::atomic::Ordering::SeqCst);
                        true
                    }
                    _ => false,
                };
                let _ = reply.send(matched);
            }
            Command::ReplaceChatHistory { message, reply } => {
                self.ensure_previous_stream_finished().await;
                if let Ok(()) = self.history.replace_all(vec![message.clone()]).await {
                    self.bus
                        .publish(mux_protocol::IpcEvent::Whole {
                            message: Box::new(message),
                        })
                        .await;
                }
                let _ = reply.send(());
            }
        }
    }

    /// Step 2 of `startStream`: if a previous stream is active, abort it and
    /// await its `Finalizing` before continuing.
    async fn ensure_previous_stream_finished(&mut self) {
        if let Some(abort) = self.active_abort.take() {
            abort.abort();
        }
        self.join_stream_task().await;
        self.state = StreamState::Idle;
    }

    async fn join_stream_task(&mut self) {
        if let Some(task) = self.stream_task.take() {
            if let Ok(result) = task.await {
                self.apply_stream_task_result(result);
            }
        }
        self.active_compaction = None;
    }
}

/// Result of one stream task: the provider's `previous_response_id` to carry
/// into the next turn, plus a pending post-compaction continuation turn
/// (`model`, `text`) when the stream that just finished was a compaction
/// requesting one.
struct StreamTaskResult {
    previous_response_id: Option<String>,
    follow_up: Option<(String, String)>,
}

#[allow(clippy::too_many_arguments)]
fn spawn_stream_task(
    message_id: MessageId,
    request: StartStreamRequest,
    abort: AbortSignal,
    history: Arc<dyn HistoryStore>,
    partial: Arc<dyn PartialStore>,
    bus: Arc<WorkspaceBus>,
    tools: Arc<ToolRegistry>,
    runtime: Arc<dyn Runtime>,
    provider: Arc<dyn ProviderTransport>,
    previous_response_id: Option<String>,
    compaction_cancelled: Arc<std::sync::atomic::AtomicBool>,
) -> JoinHandle<StreamTaskResult> {
    tokio::spawn(async move {
        run_stream(
            message_id,
            request,
            abort,
            history,
            partial,
            bus,
            tools,
            runtime,
            provider,
            previous_response_id,
            compaction_cancelled,
        )
        .await
    })
}

struct Accumulator {
    message: Message,
    tool_inputs: HashMap<ToolCallId, JsonValue>,
    tool_names: HashMap<ToolCallId, String>,
}

impl Accumulator {
    fn new(message_id: MessageId, history_sequence: u64, model: &str) -> Self {
        Self {
            message: Message {
                id: message_id,
                history_sequence,
                role: Role::Assistant,
                parts: Vec::new(),
                timestamp: Utc::now(),
                model: Some(model.to_string()),
                usage: None,
                provider_metadata: None,
                duration_ms: None,
                partial: true,
                compacted: false,
                historical_usage: None,
                error: None,
                mux_metadata: None,
            },
            tool_inputs: HashMap::new(),
            tool_names: HashMap::new(),
        }
    }

    fn append_text(&mut self, delta: &str) {
        if let Some(Part::Text { text }) = self.message.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.message.parts.push(Part::Text {
                text: delta.to_string(),
            });
        }
    }

    fn append_reasoning(&mut self, delta: &str) {
        if let Some(Part::Reasoning { text }) = self.message.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.message.parts.push(Part::Reasoning {
                text: delta.to_string(),
            });
        }
    }

    fn seal_tool_call(&mut self, id: &ToolCallId, outcome: ToolCallOutcome) {
        for part in &mut self.message.parts {
            if let Part::ToolCall {
                tool_call_id,
                status,
                ..
            } = part
            {
                if tool_call_id == id {
                    *status = match outcome {
                        ToolCallOutcome::Result { result } => mux_protocol::ToolCallStatus::Result { result },
                        ToolCallOutcome::Error { error } => mux_protocol::ToolCallStatus::Error { error },
                    };
                    return;
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_stream(
    message_id: MessageId,
    request: StartStreamRequest,
    abort: AbortSignal,
    history: Arc<dyn HistoryStore>,
    partial: Arc<dyn PartialStore>,
    bus: Arc<WorkspaceBus>,
    tools: Arc<ToolRegistry>,
    runtime: Arc<dyn Runtime>,
    provider: Arc<dyn ProviderTransport>,
    previous_response_id: Option<String>,
    compaction_cancelled: Arc<std::sync::atomic::AtomicBool>,
) -> StreamTaskResult {
    let started_at = Instant::now();
    let mut acc = Accumulator::new(message_id, request.history_sequence, &request.model);

    let (tx, mut rx) = mpsc::channel(256);
    let enabled_tools: Vec<_> = tools
        .specs()
        .into_iter()
        .filter(|spec| request.tool_policy.is_enabled(&spec.name))
        .collect();
    let cache_breakpoints = mux_cache::plan_cache_breakpoints(
        request.transcript.len(),
        enabled_tools.len(),
        request.provider_supports_prompt_cache,
    );
    let provider_request = ProviderRequest {
        model: request.model.clone(),
        system_message: request.system_message.clone(),
        transcript: request.transcript.clone(),
        tools: enabled_tools,
        thinking_level: request.thinking_level,
        max_output_tokens: request.max_output_tokens,
        previous_response_id,
        cache_breakpoints,
    };

    let provider_task = tokio::spawn({
        let provider = provider.clone();
        async move {
            provider.stream(provider_request, tx).await;
        }
    });

    let mut last_flush = Instant::now();
    // Tracks what `previous_response_id` the *next* turn should send: set from
    // a successful `Finish`, cleared (not resent) when this turn's error
    // reports the incoming id as lost.
    let mut next_previous_response_id: Option<String> = None;
    let mut terminal: Option<TerminalOutcome> = None;

    loop {
        tokio::select! {
            _ = abort.aborted() => {
                terminal = Some(TerminalOutcome::Aborted { error: None, error_type: None });
                break;
            }
            event = tokio::time::timeout(PROVIDER_IDLE_TIMEOUT, rx.recv()) => {
                match event {
                    Ok(Some(event)) => {
                        if let Some(outcome) = handle_provider_event(
                            &mut acc,
                            event,
                            &bus,
                            &tools,
                            &request.tool_policy,
                            &runtime,
                            &abort,
                            &mut next_previous_response_id,
                        ).await {
                            terminal = Some(outcome);
                            break;
                        }
                    }
                    Ok(None) => {
                        terminal = Some(TerminalOutcome::Errored {
                            error: "provider closed the stream without finishing".to_string(),
                            error_type: StreamErrorType::Unknown,
                        });
                        break;
                    }
                    Err(_) => {
                        terminal = Some(TerminalOutcome::Errored {
                            error: "provider idle timeout".to_string(),
                            error_type: StreamErrorType::ProviderTransient,
                        });
                        break;
                    }
                }
            }
        }

        if last_flush.elapsed() >= PARTIAL_FLUSH_INTERVAL {
            let _ = partial.write(&acc.message).await;
            last_flush = Instant::now();
        }
    }

    provider_task.abort();

    let duration_ms = started_at.elapsed().as_millis() as u64;
    let follow_up = finalize(
        acc,
        terminal.unwrap_or(TerminalOutcome::Aborted { error: None, error_type: None }),
        duration_ms,
        request.compaction,
        compaction_cancelled.load(std::sync::atomic::Ordering::SeqCst),
        history,
        partial,
        bus,
    )
    .await;

    StreamTaskResult {
        previous_response_id: next_previous_response_id,
        follow_up,
    }
}

enum TerminalOutcome {
    Finished {
        usage: Option<mux_protocol::TokenUsage>,
        provider_metadata: Option<JsonValue>,
    },
    Aborted {
        error: Option<String>,
        error_type: Option<StreamErrorType>,
    },
    Errored {
        error: String,
        error_type: StreamErrorType,
    },
}

#[allow(clippy::too_many_arguments)]
async fn handle_provider_event(
    acc: &mut Accumulator,
    event: ProviderEvent,
    bus: &Arc<WorkspaceBus>,
    tools: &Arc<ToolRegistry>,
    policy: &ToolPolicy,
    runtime: &Arc<dyn Runtime>,
    abort: &AbortSignal,
    next_previous_response_id: &mut Option<String>,
) -> Option<TerminalOutcome> {
    let message_id = acc.message.id;
    match event {
        ProviderEvent::TextDelta(delta) => {
            acc.append_text(&delta);
            bus.publish(mux_protocol::IpcEvent::StreamDelta {
                message_id,
                delta,
                tokens: None,
                timestamp: Utc::now(),
            })
            .await;
            None
        }
        ProviderEvent::ReasoningDelta(delta) => {
            acc.append_reasoning(&delta);
            bus.publish(mux_protocol::IpcEvent::ReasoningDelta {
                message_id,
                delta,
                tokens: None,
            })
            .await;
            None
        }
        ProviderEvent::ReasoningEnd => {
            bus.publish(mux_protocol::IpcEvent::ReasoningEnd { message_id }).await;
            None
        }
        ProviderEvent::ToolCallStart {
            tool_call_id,
            tool_name,
        } => {
            acc.tool_names.insert(tool_call_id.clone(), tool_name.clone());
            acc.tool_inputs
                .insert(tool_call_id.clone(), JsonValue::Object(Default::default()));
            acc.message.parts.push(Part::ToolCall {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                input: JsonValue::Object(Default::default()),
                status: mux_protocol::ToolCallStatus::Pending,
            });
            bus.publish(mux_protocol::IpcEvent::ToolCallStart {
                message_id,
                tool_call_id,
                tool_name,
            })
            .await;
            None
        }
        ProviderEvent::ToolCallDelta {
            tool_call_id,
            input_patch,
        } => {
            if let Some(existing) = acc.tool_inputs.get_mut(&tool_call_id) {
                merge_json(existing, &input_patch);
            }
            for part in &mut acc.message.parts {
                if let Part::ToolCall {
                    tool_call_id: id,
                    input,
                    ..
                } = part
                {
                    if *id == tool_call_id {
                        merge_json(input, &input_patch);
                    }
                }
            }
            bus.publish(mux_protocol::IpcEvent::ToolCallDelta {
                message_id,
                tool_call_id,
                input_patch,
            })
            .await;
            None
        }
        ProviderEvent::ToolCallArgsDone { tool_call_id } => {
            let tool_name = acc
                .tool_names
                .get(&tool_call_id)
                .cloned()
                .unwrap_or_default();
            let input = acc
                .tool_inputs
                .get(&tool_call_id)
                .cloned()
                .unwrap_or(JsonValue::Object(Default::default()));

            let outcome = if policy.is_enabled(&tool_name) {
                execute_tool(tools, runtime, abort, &tool_name, input).await
            } else {
                ToolCallOutcome::Error {
                    error: mux_tools::disabled_tool_message(&tool_name),
                }
            };

            acc.seal_tool_call(&tool_call_id, outcome.clone());
            bus.publish(mux_protocol::IpcEvent::ToolCallEnd {
                message_id,
                tool_call_id,
                tool_name,
                outcome,
            })
            .await;
            None
        }
        ProviderEvent::Finish {
            usage,
            provider_metadata,
            response_id,
        } => {
            *next_previous_response_id = response_id;
            Some(TerminalOutcome::Finished {
                usage,
                provider_metadata,
            })
        }
        ProviderEvent::Error { message, error_type } => {
            if let Some(_id) = crate::lost_response_id::extract_lost_response_id(&message) {
                // The id we just sent turned out to be stale; clear it rather
                // than carrying it into the next turn's request.
                *next_previous_response_id = None;
                return Some(TerminalOutcome::Errored {
                    error: message,
                    error_type: StreamErrorType::ProviderTransient,
                });
            }
            Some(TerminalOutcome::Errored {
                error: message,
                error_type: error_type.unwrap_or(StreamErrorType::Unknown),
            })
        }
    }
}

async fn execute_tool(
    tools: &Arc<ToolRegistry>,
    runtime: &Arc<dyn Runtime>,
    abort: &AbortSignal,
    tool_name: &str,
    input: JsonValue,
) -> ToolCallOutcome {
    let tool = match tools.get(tool_name) {
        Ok(tool) => tool,
        Err(err) => return ToolCallOutcome::Error { error: err.to_string() },
    };
    let ctx = ToolContext::new(runtime.clone(), abort.clone());
    match tool.execute(input, &ctx).await {
        Ok(result) => ToolCallOutcome::Result { result },
        Err(err) => ToolCallOutcome::Error { error: err.to_string() },
    }
}

fn merge_json(existing: &mut JsonValue, patch: &JsonValue) {
    match (existing.as_object_mut(), patch.as_object()) {
        (Some(existing_obj), Some(patch_obj)) => {
            for (k, v) in patch_obj {
                existing_obj.insert(k.clone(), v.clone());
            }
        }
        _ => *existing = patch.clone(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn finalize(
    mut acc: Accumulator,
    outcome: TerminalOutcome,
    duration_ms: u64,
    compaction_ctx: Option<compaction::CompactionRequestContext>,
    compaction_cancelled: bool,
    history: Arc<dyn HistoryStore>,
    partial: Arc<dyn PartialStore>,
    bus: Arc<WorkspaceBus>,
) -> Option<(String, String)> {
    let message_id = acc.message.id;
    match outcome {
        TerminalOutcome::Finished {
            usage,
            provider_metadata,
        } => {
            acc.message.partial = false;
            acc.message.usage = usage.clone();
            acc.message.duration_ms = Some(duration_ms);
            acc.message.provider_metadata = provider_metadata.clone();

            // Step 6's continuation turn only applies to a stream-end that
            // actually replaced history with the summary, so the follow-up
            // is read off the context before it's consumed below.
            let follow_up = compaction_ctx.as_ref().and_then(|ctx| {
                match (&ctx.resume_model, &ctx.continue_message) {
                    (Some(model), Some(continue_message)) => {
                        Some((model.clone(), continue_message.clone()))
                    }
                    _ => None,
                }
            });

            if let Some(ctx) = compaction_ctx {
                compaction::apply_compaction_result(ctx, acc.message, &history, &bus).await;
            } else {
                let _ = history.append(acc.message.clone()).await;
                let _ = partial.delete().await;
            }

            bus.publish(mux_protocol::IpcEvent::StreamEnd {
                message_id,
                metadata: StreamEndMetadata {
                    usage,
                    duration_ms,
                    provider_metadata,
                    rate_limits: None,
                },
            })
            .await;

            return follow_up;
        }
        TerminalOutcome::Aborted { error, error_type } => {
            acc.message.partial = true;
            if let Some(error) = &error {
                acc.message.error = Some(MessageError {
                    error_type: error_type.unwrap_or(StreamErrorType::Unknown),
                    message: error.clone(),
                });
            }

            match compaction_ctx {
                Some(_ctx) if compaction_cancelled => {
                    // Explicit cancel-marker: discard the partial summary
                    // entirely rather than applying the accept-early
                    // sentinel. History is left exactly as it was when the
                    // compaction stream started.
                    let _ = partial.delete().await;
                }
                Some(ctx) => {
                    compaction::apply_compaction_abort(ctx, acc.message.clone(), &history, &bus).await;
                }
                None => {
                    let _ = history.append(acc.message.clone()).await;
                    let _ = partial.delete().await;
                }
            }

            bus.publish(mux_protocol::IpcEvent::StreamAbort {
                message_id,
                metadata: StreamAbortMetadata {
                    usage: None,
                    duration_ms,
                    error,
                    error_type,
                },
            })
            .await;
        }
        TerminalOutcome::Errored { error, error_type } => {
            tracing::warn!(%message_id, ?error_type, %error, "stream errored");
            acc.message.partial = true;
            acc.message.error = Some(MessageError {
                error_type,
                message: error.clone(),
            });
            let _ = history.append(acc.message.clone()).await;
            let _ = partial.delete().await;

            bus.publish(mux_protocol::IpcEvent::StreamError {
                message_id,
                error,
                error_type,
            })
            .await;
        }
    }

    None
}
