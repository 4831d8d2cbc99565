#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("tool execution failed: {0}")]
    Runtime(#[from] mux_runtime::RuntimeError),
    #[error("tool call was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ToolError>;
