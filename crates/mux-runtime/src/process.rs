use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub killed: bool,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub stdin: Option<String>,
}

/// A live child process. `kill` is expected to SIGTERM and, after a short
/// grace window, SIGKILL if the process has not exited. Callers that need
/// the hard deadline (the Stream Manager's bounded interrupt) call `kill`
/// with `Signal::Term` once and then race `wait` against a timeout themselves.
#[async_trait]
pub trait Process: Send + Sync {
    fn pid(&self) -> Option<u32>;
    async fn kill(&mut self, signal: Signal) -> Result<()>;
    async fn wait(&mut self) -> Result<ExitStatus>;
}
