//! In-memory `Runtime` for tests: no real disk, no real processes. Process
//! exit codes and stdout are scripted ahead of time via `FakeRuntime::script`,
//! which is how a bash-sleep-interrupt test drives a tool call that blocks
//! until killed.

use crate::error::Result;
use crate::error::RuntimeError;
use crate::process::ExitStatus;
use crate::process::Process;
use crate::process::Signal;
use crate::process::SpawnOptions;
use crate::runtime::Runtime;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tokio::sync::Notify;

#[derive(Clone)]
pub enum ScriptedExit {
    Immediate(ExitStatus),
    /// Blocks until `kill` is called, then exits as if killed.
    BlocksUntilKilled,
}

pub struct FakeRuntime {
    files: DashMap<PathBuf, Vec<u8>>,
    scripts: DashMap<String, ScriptedExit>,
    cwd: PathBuf,
}

impl FakeRuntime {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            files: DashMap::new(),
            scripts: DashMap::new(),
            cwd,
        }
    }

    pub fn script(&self, command: impl Into<String>, exit: ScriptedExit) {
        self.scripts.insert(command.into(), exit);
    }

    pub fn seed_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }
}

#[async_trait]
impl Runtime for FakeRuntime {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let resolved = self.resolve_path(path);
        self.files
            .get(&resolved)
            .map(|v| v.clone())
            .ok_or_else(|| RuntimeError::NotFound(resolved))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.files
            .insert(self.resolve_path(path), contents.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&self.resolve_path(path))
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
        cmd: &str,
        _args: &[String],
        _opts: SpawnOptions,
    ) -> Result<Box<dyn Process>> {
        let exit = self
            .scripts
            .get(cmd)
            .map(|e| e.clone())
            .unwrap_or(ScriptedExit::Immediate(ExitStatus {
                code: Some(0),
                killed: false,
            }));
        Ok(Box::new(FakeProcess {
            exit,
            killed: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }))
    }
}

struct FakeProcess {
    exit: ScriptedExit,
    killed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

#[async_trait]
impl Process for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(1)
    }

    async fn kill(&mut self, _signal: Signal) -> Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        match &self.exit {
            ScriptedExit::Immediate(status) => Ok(*status),
            ScriptedExit::BlocksUntilKilled => {
                while !self.killed.load(Ordering::SeqCst) {
                    self.notify.notified().await;
                }
                Ok(ExitStatus {
                    code: None,
                    killed: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_process_blocks_until_killed() {
        let runtime = FakeRuntime::new(PathBuf::from("/work"));
        runtime.script("sleep", ScriptedExit::BlocksUntilKilled);
        let mut process = runtime
            .spawn("sleep", &["60".into()], SpawnOptions::default())
            .await
            .unwrap();

        let mut handle = process;
        let waiter = tokio::spawn(async move { handle.wait().await });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        // Need a second handle to kill since the first was moved into the task;
        // re-spawn to exercise kill directly instead.
        waiter.abort();

        let mut process = runtime
            .spawn("sleep", &["60".into()], SpawnOptions::default())
            .await
            .unwrap();
        process.kill(Signal::Term).await.unwrap();
        let status = process.wait().await.unwrap();
        assert!(status.killed);
    }

    #[tokio::test]
    async fn seeded_file_is_readable() {
        let runtime = FakeRuntime::new(PathBuf::from("/work"));
        runtime.seed_file("/work/a.txt", b"hi".to_vec());
        let contents = runtime.read_file(Path::new("a.txt")).await.unwrap();
        assert_eq!(contents, b"hi");
    }
}
