//! Instruction file discovery: `AGENTS.md`, `AGENT.md`, `CLAUDE.md` (first
//! found wins), plus `AGENTS.local.md` appended whenever a primary file was
//! found. project/user/builtin precedence, applied over file discovery
//! rather than directory scanning for TOML agents.

use mux_runtime::Runtime;
use std::path::Path;

const PRIMARY_CANDIDATES: [&str; 3] = ["AGENTS.md", "AGENT.md", "CLAUDE.md"];
const LOCAL_OVERRIDE: &str = "AGENTS.local.md";

/// Reads the first present primary instruction file in `dir`, appending
/// `AGENTS.local.md` when present. Returns `None` if no primary file exists,
/// even if a local override does (the override has nothing to extend).
pub async fn discover_instructions(runtime: &dyn Runtime, dir: &Path) -> Option<String> {
    let mut primary = None;
    for candidate in PRIMARY_CANDIDATES {
        let path = dir.join(candidate);
        if runtime.exists(&path).await {
            if let Ok(bytes) = runtime.read_file(&path).await {
                primary = Some(String::from_utf8_lossy(&bytes).into_owned());
                break;
            }
        }
    }
    let primary = primary?;

    let local_path = dir.join(LOCAL_OVERRIDE);
    if runtime.exists(&local_path).await {
        if let Ok(bytes) = runtime.read_file(&local_path).await {
            let local = String::from_utf8_lossy(&bytes).into_owned();
            return Some(format!("{primary}\n\n{local}"));
        }
    }
    Some(primary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mux_runtime::FakeRuntime;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[tokio::test]
    async fn prefers_agents_md_over_agent_and_claude() {
        let runtime = FakeRuntime::new(PathBuf::from("/work"));
        runtime.seed_file("/work/AGENTS.md", b"agents".to_vec());
        runtime.seed_file("/work/AGENT.md", b"agent".to_vec());
        let found = discover_instructions(&runtime, Path::new("/work"))
            .await
            .unwrap();
        assert_eq!(found, "agents");
    }

    #[tokio::test]
    async fn falls_back_to_claude_md() {
        let runtime = FakeRuntime::new(PathBuf::from("/work"));
        runtime.seed_file("/work/CLAUDE.md", b"claude".to_vec());
        let found = discover_instructions(&runtime, Path::new("/work"))
            .await
            .unwrap();
        assert_eq!(found, "claude");
    }

    #[tokio::test]
    async fn appends_local_override_when_primary_found() {
        let runtime = FakeRuntime::new(PathBuf::from("/work"));
        runtime.seed_file("/work/AGENTS.md", b"base".to_vec());
        runtime.seed_file("/work/AGENTS.local.md", b"local".to_vec());
        let found = discover_instructions(&runtime, Path::new("/work"))
            .await
            .unwrap();
        assert_eq!(found, "base\n\nlocal");
    }

    #[tokio::test]
    async fn local_override_alone_is_not_enough() {
        let runtime = FakeRuntime::new(PathBuf::from("/work"));
        runtime.seed_file("/work/AGENTS.local.md", b"local".to_vec());
        assert!(discover_instructions(&runtime, Path::new("/work"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn no_files_present_is_none() {
        let runtime = FakeRuntime::new(PathBuf::from("/work"));
        assert!(discover_instructions(&runtime, Path::new("/work"))
            .await
            .is_none());
    }
}
