use crate::error::Result;
use crate::error::RuntimeError;
use crate::process::Process;
use crate::process::SpawnOptions;
use crate::runtime::Runtime;
use async_trait::async_trait;
use std::path::Path;
use std::path::PathBuf;

/// Documents the remote (ssh) `Runtime` shape without shipping a transport:
/// SSH transport is an external collaborator per scope. A real implementation
/// would hold a connected session handle and proxy each method over it with
/// identical semantics to `LocalRuntime`, modulo latency.
pub struct RemoteRuntime {
    cwd: PathBuf,
}

impl RemoteRuntime {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }
}

#[async_trait]
impl Runtime for RemoteRuntime {
    async fn read_file(&self, _path: &Path) -> Result<Vec<u8>> {
        Err(RuntimeError::Unsupported(
            "remote runtime requires an injected ssh transport",
        ))
    }

    async fn write_file(&self, _path: &Path, _contents: &[u8]) -> Result<()> {
        Err(RuntimeError::Unsupported(
            "remote runtime requires an injected ssh transport",
        ))
    }

    async fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    async fn spawn(
        &self,
        _cmd: &str,
        _args: &[String],
        _opts: SpawnOptions,
    ) -> Result<Box<dyn Process>> {
        Err(RuntimeError::Unsupported(
            "remote runtime requires an injected ssh transport",
        ))
    }
}
