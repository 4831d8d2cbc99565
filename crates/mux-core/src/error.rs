#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] mux_store::StoreError),
    #[error("interrupt did not complete within the bounded window")]
    InterruptTimedOut,
    #[error("workspace actor is no longer running")]
    ActorGone,
    #[error("workspace {0} is not registered with this Stream Manager")]
    WorkspaceNotRegistered(mux_protocol::WorkspaceId),
}

pub type Result<T> = std::result::Result<T, CoreError>;
