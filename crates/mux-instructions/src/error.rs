#[derive(Debug, thiserror::Error)]
pub enum InstructionsError {
    #[error("failed to read instruction file: {0}")]
    Runtime(#[from] mux_runtime::RuntimeError),
}

pub type Result<T> = std::result::Result<T, InstructionsError>;
