use crate::error::Result;
use crate::process::Process;
use crate::process::SpawnOptions;
use async_trait::async_trait;
use std::path::Path;
use std::path::PathBuf;

/// Filesystem + process execution surface. A `Runtime` is passed into every
/// stream and tool invocation rather than reached for as global state, so
/// tests can substitute `FakeRuntime` without touching real disk or
/// processes. Local and remote (ssh) variants share this one interface;
/// only latency differs.
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;
    async fn exists(&self, path: &Path) -> bool;

    /// Resolves a path relative to this runtime's working root. Purely
    /// syntactic (no I/O) so it can be called from synchronous contexts like
    /// the System-Message Builder's environment block.
    fn resolve_path(&self, path: &Path) -> PathBuf;

    async fn spawn(
        &self,
        cmd: &str,
        args: &[String],
        opts: SpawnOptions,
    ) -> Result<Box<dyn Process>>;
}
