use crate::error::Result;
use crate::error::RuntimeError;
use crate::process::ExitStatus;
use crate::process::Process;
use crate::process::Signal;
use crate::process::SpawnOptions;
use crate::runtime::Runtime;
use async_trait::async_trait;
use std::path::Path;
use std::path::PathBuf;
use tokio::process::Child;
use tokio::process::Command;

/// Runtime backed by the local filesystem and `tokio::process`. `cwd` anchors
/// both relative-path resolution and spawned processes' working directory to
/// the workspace's project path.
pub struct LocalRuntime {
    cwd: PathBuf,
}

impl LocalRuntime {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }
}

#[async_trait]
impl Runtime for LocalRuntime {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let resolved = self.resolve_path(path);
        tokio::fs::read(&resolved)
            .await
            .map_err(|source| RuntimeError::Io {
                path: resolved,
                source,
            })
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let resolved = self.resolve_path(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RuntimeError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&resolved, contents)
            .await
            .map_err(|source| RuntimeError::Io {
                path: resolved,
                source,
            })
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(self.resolve_path(path)).await.is_ok()
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
        args: &[String],
        opts: SpawnOptions,
    ) -> Result<Box<dyn Process>> {
        let mut command = Command::new(cmd);
        command.args(args);
        command.current_dir(opts.cwd.unwrap_or_else(|| self.cwd.clone()));
        for (key, value) in &opts.env {
            command.env(key, value);
        }
        command.kill_on_drop(true);
        if opts.stdin.is_some() {
            command.stdin(std::process::Stdio::piped());
        }
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());

        let mut child = command.spawn().map_err(|source| RuntimeError::Spawn {
            command: cmd.to_string(),
            source,
        })?;

        if let Some(input) = opts.stdin {
            use tokio::io::AsyncWriteExt;
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(input.as_bytes()).await;
            }
        }

        Ok(Box::new(LocalProcess { child }))
    }
}

struct LocalProcess {
    child: Child,
}

#[async_trait]
impl Process for LocalProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn kill(&mut self, signal: Signal) -> Result<()> {
        match signal {
            Signal::Kill => self
                .child
                .start_kill()
                .map_err(|source| RuntimeError::Io {
                    path: PathBuf::new(),
                    source,
                }),
            Signal::Term => send_sigterm(&self.child),
        }
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| RuntimeError::Io {
                path: PathBuf::new(),
                source,
            })?;
        Ok(ExitStatus {
            code: status.code(),
            killed: !status.success() && status.code().is_none(),
        })
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> Result<()> {
    match child.id() {
        Some(pid) => {
            // SAFETY: pid is a valid process id obtained from the child we own;
            // kill(2) with SIGTERM is a request, it cannot corrupt our state.
            let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if ret == 0 {
                Ok(())
            } else {
                Err(RuntimeError::Io {
                    path: PathBuf::new(),
                    source: std::io::Error::last_os_error(),
                })
            }
        }
        None => Ok(()), // already reaped
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> Result<()> {
    Err(RuntimeError::Unsupported(
        "SIGTERM is not modeled on this platform; use Signal::Kill",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Signal;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LocalRuntime::new(dir.path().to_path_buf());
        runtime
            .write_file(Path::new("nested/file.txt"), b"hello")
            .await
            .unwrap();
        let contents = runtime.read_file(Path::new("nested/file.txt")).await.unwrap();
        assert_eq!(contents, b"hello");
    }

    #[tokio::test]
    async fn exists_reflects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LocalRuntime::new(dir.path().to_path_buf());
        assert!(!runtime.exists(Path::new("a.txt")).await);
        runtime.write_file(Path::new("a.txt"), b"x").await.unwrap();
        assert!(runtime.exists(Path::new("a.txt")).await);
    }

    #[tokio::test]
    async fn spawn_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LocalRuntime::new(dir.path().to_path_buf());
        let mut process = runtime
            .spawn("true", &[], SpawnOptions::default())
            .await
            .unwrap();
        let status = process.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn kill_terminates_a_long_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LocalRuntime::new(dir.path().to_path_buf());
        let mut process = runtime
            .spawn("sleep", &["60".to_string()], SpawnOptions::default())
            .await
            .unwrap();
        process.kill(Signal::Kill).await.unwrap();
        let status = process.wait().await.unwrap();
        assert!(!status.success());
    }
}
