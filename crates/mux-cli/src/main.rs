//! Binary entry point: loads `mux.toml`, wires the Runtime, History/Partial
//! Stores, Tool Registry, IPC bus and Stream Manager together, then drives
//! one workspace from the terminal. `anyhow` is used here and only here,
//! matching `codex-core`'s `CodexErr`-at-the-core/`anyhow`-at-the-binary split.

mod config;
mod logging;
mod provider;
mod repl;

use anyhow::Context;
use clap::Parser;
use mux_core::ManagerConfig;
use mux_core::StreamManager;
use mux_ipc::IpcRegistry;
use mux_protocol::WorkspaceId;
use mux_runtime::LocalRuntime;
use mux_tools::BashTool;
use mux_tools::ReadFileTool;
use mux_tools::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mux", about = "Workspace stream orchestrator, driven from a terminal")]
struct Args {
    /// Project directory for the single workspace this invocation drives.
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Path to mux.toml. Defaults to `<mux-home>/mux.toml`, falling back to
    /// built-in defaults entirely when neither exists.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = config::Config::load(&config_path).context("loading mux.toml")?;

    logging::init(&config.log_level, config.log_timezone);

    if let Some(missing) = config.missing_api_key() {
        tracing::warn!(env_var = missing, "provider API key not set; streams will fail with api_key_not_found until it is");
    }

    let project_path = args.project.canonicalize().unwrap_or(args.project);
    let data_dir = config.mux_home.join("workspaces");

    let runtime: Arc<dyn mux_runtime::Runtime> = Arc::new(LocalRuntime::new(project_path.clone()));

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(BashTool));
    tools.register(Arc::new(ReadFileTool));

    let provider_transport = provider::CliProviderTransport::new(
        config.provider_api_key_env.clone(),
        Box::new(provider::EchoProviderTransport),
    );

    let manager_config = ManagerConfig {
        data_dir,
        global_instructions_dir: config.mux_home.join("instructions"),
        default_model: config.default_model.clone(),
        provider_supports_prompt_cache: config.provider_supports_prompt_cache,
        isolation_contract: "sandboxed, no network".to_string(),
    };

    let manager = StreamManager::new(
        manager_config,
        Arc::new(IpcRegistry::new()),
        Arc::new(tools),
        runtime,
        Arc::new(provider_transport),
    );

    let workspace_id = WorkspaceId::new();
    manager
        .register_workspace(workspace_id, project_path)
        .await
        .context("registering workspace")?;

    repl::run(manager, workspace_id).await
}

fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mux")
        .join("mux.toml")
}
