//! Workspace Stream Orchestrator: one actor task per workspace, driven
//! through the `StreamManager` facade (`startStream`/`interruptStream`/
//! `replaceChatHistory`/`subscribeChat`/`sendMessage`).

mod actor;
mod compaction;
mod error;
#[cfg(any(test, feature = "test-support"))]
mod fake_provider;
mod lost_response_id;
mod manager;
mod provider;
mod session;
mod state;

pub use actor::Command;
pub use actor::StartStreamAck;
pub use actor::StartStreamRequest;
pub use actor::WorkspaceActor;
pub use compaction::CompactionRequestContext;
pub use error::CoreError;
pub use error::Result;
pub use manager::ChatSubscription;
pub use manager::ManagerConfig;
pub use manager::StreamManager;
pub use provider::ProviderEvent;
pub use provider::ProviderRequest;
pub use provider::ProviderTransport;
pub use state::StreamState;

#[cfg(any(test, feature = "test-support"))]
pub use fake_provider::FakeProviderTransport;
#[cfg(any(test, feature = "test-support"))]
pub use fake_provider::Script;
