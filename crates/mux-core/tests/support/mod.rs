//! Shared fixtures for the scenario tests in `scenarios.rs`. Mirrors
//! `mux-tools`' and `mux-ipc`'s own test idiom of wiring a `FakeRuntime` and
//! reading the resulting events back off the bus, just assembled at the
//! level of a whole `StreamManager` instead of one tool or one bus.

use mux_core::ManagerConfig;
use mux_core::StreamManager;
use mux_core::FakeProviderTransport;
use mux_ipc::IpcRegistry;
use mux_protocol::IpcEvent;
use mux_protocol::WorkspaceId;
use mux_runtime::FakeRuntime;
use mux_tools::BashTool;
use mux_tools::ReadFileTool;
use mux_tools::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub struct Fixture {
    pub manager: StreamManager,
    pub workspace_id: WorkspaceId,
    pub provider: Arc<FakeProviderTransport>,
    pub runtime: Arc<FakeRuntime>,
    _data_dir: TempDir,
}

pub async fn setup() -> Fixture {
    let data_dir = TempDir::new().expect("tempdir");
    let runtime = Arc::new(FakeRuntime::new(PathBuf::from("/work")));
    let provider = Arc::new(FakeProviderTransport::new());

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(BashTool));
    tools.register(Arc::new(ReadFileTool));

    let config = ManagerConfig {
        data_dir: data_dir.path().to_path_buf(),
        global_instructions_dir: PathBuf::from("/work/.global"),
        default_model: "gpt-5".to_string(),
        provider_supports_prompt_cache: false,
        isolation_contract: "sandboxed, no network".to_string(),
    };

    let manager = StreamManager::new(
        config,
        Arc::new(IpcRegistry::new()),
        Arc::new(tools),
        runtime.clone(),
        provider.clone() as Arc<dyn mux_core::ProviderTransport>,
    );

    let workspace_id = WorkspaceId::new();
    manager
        .register_workspace(workspace_id, PathBuf::from("/work"))
        .await
        .expect("register_workspace");

    Fixture {
        manager,
        workspace_id,
        provider,
        runtime,
        _data_dir: data_dir,
    }
}

/// Pulls events off `receiver` until one matching `predicate` arrives, with a
/// generous bound so a hung test fails fast instead of the suite timing out.
pub async fn recv_until(
    receiver: &mut broadcast::Receiver<IpcEvent>,
    predicate: impl Fn(&IpcEvent) -> bool,
) -> IpcEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = receiver.recv().await.expect("bus closed unexpectedly");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
