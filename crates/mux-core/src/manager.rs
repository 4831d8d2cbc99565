//! Stream Manager (C7/C8): the public surface over one `WorkspaceActor` per
//! workspace. Owns instruction discovery, system-message composition, the
//! tool policy and cache planner inputs, and the compaction detour, then
//! hands a fully-formed `StartStreamRequest` to the actor's mailbox.

use crate::actor::Command;
use crate::actor::FollowUpRequest;
use crate::actor::StartStreamAck;
use crate::actor::StartStreamRequest;
use crate::actor::WorkspaceActor;
use crate::compaction;
use crate::error::CoreError;
use crate::error::Result;
use crate::provider::ProviderTransport;
use dashmap::DashMap;
use mux_instructions::build_system_message;
use mux_instructions::discover_instructions;
use mux_instructions::SystemMessageInputs;
use mux_protocol::Ack;
use mux_protocol::IpcEvent;
use mux_protocol::Message;
use mux_protocol::MessageId;
use mux_protocol::Role;
use mux_protocol::SendMessageErrorType;
use mux_protocol::SendMessageOptions;
use mux_protocol::SendMessageResult;
use mux_protocol::WorkspaceId;
use mux_ipc::IpcRegistry;
use mux_runtime::Runtime;
use mux_store::FileHistoryStore;
use mux_store::FilePartialStore;
use mux_store::HistoryStore;
use mux_store::PartialStore;
use mux_tools::ToolPolicy;
use mux_tools::ToolRegistry;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// Outer bound on `interruptStream`'s round trip, even mid-tool-call. The
/// actor itself should return well under this via the 800ms tool grace
/// period; this is the safety net if it doesn't.
const INTERRUPT_TIMEOUT: Duration = Duration::from_secs(5);

/// How a workspace's instructions are laid out: a user-level global
/// instructions directory shared by every workspace, and a per-workspace
/// project directory searched for context instructions.
pub struct ManagerConfig {
    pub data_dir: PathBuf,
    pub global_instructions_dir: PathBuf,
    pub default_model: String,
    pub provider_supports_prompt_cache: bool,
    pub isolation_contract: String,
}

struct ActorHandle {
    command_tx: mpsc::Sender<Command>,
    history: Arc<dyn HistoryStore>,
    project_path: PathBuf,
}

/// Public facade over one `Inner`, held behind an `Arc` so the
/// post-compaction follow-up dispatcher (spawned per workspace) can hold its
/// own handle back into the manager without borrowing from a caller's stack.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ManagerConfig,
    actors: DashMap<WorkspaceId, ActorHandle>,
    ipc: Arc<IpcRegistry>,
    tools: Arc<ToolRegistry>,
    runtime: Arc<dyn Runtime>,
    provider: Arc<dyn ProviderTransport>,
}

impl StreamManager {
    pub fn new(
        config: ManagerConfig,
        ipc: Arc<IpcRegistry>,
        tools: Arc<ToolRegistry>,
        runtime: Arc<dyn Runtime>,
        provider: Arc<dyn ProviderTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                actors: DashMap::new(),
                ipc,
                tools,
                runtime,
                provider,
            }),
        }
    }

    /// Creates durable stores for `workspace_id` (if not already registered),
    /// spawns its actor task, and spawns the dispatcher that turns the
    /// actor's post-compaction continuation requests into ordinary
    /// `send_message` calls.
    pub async fn register_workspace(&self, workspace_id: WorkspaceId, project_path: PathBuf) -> Result<()> {
        if self.inner.actors.contains_key(&workspace_id) {
            return Ok(());
        }

        let workspace_dir = self.inner.config.data_dir.join(workspace_id.to_string());
        let history = Arc::new(
            FileHistoryStore::open(workspace_dir.join("history.jsonl")).await?,
        ) as Arc<dyn HistoryStore>;
        let partial = Arc::new(FilePartialStore::new(workspace_dir.join("partial.json")))
            as Arc<dyn PartialStore>;
        let bus = self.inner.ipc.bus(workspace_id);

        let (follow_up_tx, mut follow_up_rx) = mpsc::channel::<FollowUpRequest>(8);
        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Some(request) = follow_up_rx.recv().await {
                let options = SendMessageOptions {
                    model: Some(request.model),
                    ..SendMessageOptions::default()
                };
                if let Err(err) = dispatcher.send_message(request.workspace_id, request.text, options).await {
                    tracing::warn!(workspace_id = %request.workspace_id, %err, "post-compaction follow-up send failed");
                }
            }
        });

        let actor = WorkspaceActor::new(
            workspace_id,
            history.clone(),
            partial,
            bus,
            self.inner.tools.clone(),
            self.inner.runtime.clone(),
            self.inner.provider.clone(),
            follow_up_tx,
        );

        let (command_tx, command_rx) = mpsc::channel(32);
        tokio::spawn(actor.run(command_rx));

        self.inner.actors.insert(
            workspace_id,
            ActorHandle {
                command_tx,
                history,
                project_path,
            },
        );
        Ok(())
    }

    fn handle(&self, workspace_id: WorkspaceId) -> Result<dashmap::mapref::one::Ref<'_, WorkspaceId, ActorHandle>> {
        self.inner
            .actors
            .get(&workspace_id)
            .ok_or(CoreError::WorkspaceNotRegistered(workspace_id))
    }

    /// `workspace.sendMessage`. Synchronous configuration errors
    /// return immediately; everything else becomes a stream, observed via
    /// `subscribeChat`. Also the dispatch point for a post-compaction
    /// continuation turn, which arrives here the same way any other caller's
    /// message would.
    pub async fn send_message(
        &self,
        workspace_id: WorkspaceId,
        text: impl Into<String>,
        options: SendMessageOptions,
    ) -> Result<SendMessageResult> {
        let model = options.model.clone().unwrap_or_else(|| self.inner.config.default_model.clone());
        if model.trim().is_empty() {
            return Ok(SendMessageResult::err(
                SendMessageErrorType::InvalidModelString,
                "model must not be empty",
            ));
        }

        let (project_path, history) = {
            let handle = self.handle(workspace_id)?;
            (handle.project_path.clone(), handle.history.clone())
        };

        if let Some(edit_id) = options.edit_message_id {
            self.interrupt_stream(workspace_id).await?;
            history.truncate_after(edit_id).await?;
        }

        let message_id = MessageId::new();
        let mut user_message = Message::new_user(message_id, 0, text.into());
        user_message.mux_metadata = options.mux_metadata.clone();

        let history_sequence = history.append(user_message).await?;
        let prior_messages = history.read().await?;

        let transcript: Vec<(Role, String)> = prior_messages
            .iter()
            .map(|m| (m.role, m.text()))
            .collect();

        let system_message = self.build_system_message(&project_path, &model, options.mode.as_deref()).await;
        let tool_policy = ToolPolicy::compile(options.tool_policy.as_deref().unwrap_or_default());

        let is_compaction = compaction::is_compaction_request(&options.mux_metadata);
        let (transcript, max_output_tokens, compaction_ctx) = if is_compaction {
            let target_words = compaction::target_words(&options.mux_metadata);
            let ctx = compaction::CompactionRequestContext {
                request_id: message_id,
                prior_messages: prior_messages.clone(),
                continue_message: match &options.mux_metadata {
                    Some(mux_protocol::MuxMetadata::CompactionRequest { continue_message, .. }) => {
                        continue_message.clone()
                    }
                    None => None,
                },
                resume_model: match &options.mux_metadata {
                    Some(mux_protocol::MuxMetadata::CompactionRequest { resume_model, .. }) => {
                        resume_model.clone()
                    }
                    None => None,
                },
            };
            let (transcript, capped_tokens) =
                compaction::build_summarization_transcript(&ctx, target_words, transcript);
            (transcript, Some(capped_tokens), Some(ctx))
        } else {
            (transcript, options.max_output_tokens, None)
        };

        let request = StartStreamRequest {
            model,
            system_message,
            transcript,
            thinking_level: options.thinking_level,
            max_output_tokens,
            tool_policy,
            history_sequence,
            compaction: compaction_ctx,
            provider_supports_prompt_cache: self.inner.config.provider_supports_prompt_cache,
        };

        let command_tx = self.handle(workspace_id)?.command_tx.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(Command::StartStream {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoreError::ActorGone)?;
        let _ack: StartStreamAck = reply_rx.await.map_err(|_| CoreError::ActorGone)?;

        Ok(SendMessageResult::ok())
    }

    async fn build_system_message(&self, project_path: &Path, model: &str, mode: Option<&str>) -> String {
        let global = discover_instructions(self.inner.runtime.as_ref(), &self.inner.config.global_instructions_dir).await;
        let context = discover_instructions(self.inner.runtime.as_ref(), project_path).await;
        let working_directory = project_path.to_string_lossy().into_owned();
        build_system_message(SystemMessageInputs {
            working_directory: &working_directory,
            isolation_contract: &self.inner.config.isolation_contract,
            global_instructions: global.as_deref(),
            context_instructions: context.as_deref(),
            active_mode: mode,
            active_model: model,
            additional_instructions: None,
        })
    }

    /// `workspace.interruptStream`. Bounded by `INTERRUPT_TIMEOUT`
    /// as a safety net over the actor's own bounded teardown.
    pub async fn interrupt_stream(&self, workspace_id: WorkspaceId) -> Result<Ack> {
        let command_tx = self.handle(workspace_id)?.command_tx.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(Command::Interrupt { reply: reply_tx })
            .await
            .map_err(|_| CoreError::ActorGone)?;
        tokio::time::timeout(INTERRUPT_TIMEOUT, reply_rx)
            .await
            .map_err(|_| CoreError::InterruptTimedOut)?
            .map_err(|_| CoreError::ActorGone)?;
        Ok(Ack { success: true })
    }

    /// Marks a running compaction as explicitly cancelled rather than merely
    /// interrupted, then interrupts it.
    /// Returns `false` if `request_id` wasn't the active compaction.
    pub async fn cancel_compaction(&self, workspace_id: WorkspaceId, request_id: MessageId) -> Result<bool> {
        let command_tx = self.handle(workspace_id)?.command_tx.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(Command::CancelCompaction {
                request_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoreError::ActorGone)?;
        let matched = reply_rx.await.map_err(|_| CoreError::ActorGone)?;
        if matched {
            self.interrupt_stream(workspace_id).await?;
        }
        Ok(matched)
    }

    /// `workspace.replaceChatHistory`. Used directly by callers
    /// (e.g. tests, or a future admin surface); compaction applies its own
    /// replace inline in the actor's finalize path instead of through here.
    pub async fn replace_chat_history(&self, workspace_id: WorkspaceId, message: Message) -> Result<Ack> {
        let command_tx = self.handle(workspace_id)?.command_tx.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(Command::ReplaceChatHistory {
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoreError::ActorGone)?;
        reply_rx.await.map_err(|_| CoreError::ActorGone)?;
        Ok(Ack { success: true })
    }

    /// `workspace.subscribeChat`: historical replay (or the
    /// in-progress stream's buffered events) followed by the live feed,
    /// always ending in `caught-up` once the backlog is drained.
    pub async fn subscribe_chat(&self, workspace_id: WorkspaceId) -> Result<ChatSubscription> {
        let (history, bus) = {
            let handle = self.handle(workspace_id)?;
            (handle.history.clone(), self.inner.ipc.bus(workspace_id))
        };

        let subscription = bus.subscribe().await;
        let mut initial = if subscription.is_stream_active {
            subscription.replay
        } else {
            history
                .read()
                .await?
                .into_iter()
                .map(|message| IpcEvent::Whole {
                    message: Box::new(message),
                })
                .collect()
        };
        initial.push(IpcEvent::CaughtUp { workspace_id });

        Ok(ChatSubscription {
            initial,
            receiver: subscription.receiver,
        })
    }
}

pub struct ChatSubscription {
    pub initial: Vec<IpcEvent>,
    pub receiver: broadcast::Receiver<IpcEvent>,
}
