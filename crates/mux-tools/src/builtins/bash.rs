//! The one built-in tool whose cancellation exercises `Runtime::kill`'s
//! SIGTERM-then-grace-SIGKILL path: interrupting a stream mid-`bash` call
//! must resolve in well under two seconds even if the process ignores the
//! first signal.

use crate::context::ToolContext;
use crate::error::Result;
use crate::error::ToolError;
use crate::schema::JsonSchema;
use crate::tool::Tool;
use async_trait::async_trait;
use mux_runtime::Signal;
use mux_runtime::SpawnOptions;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use std::time::Duration;

/// Time given to a process to exit after SIGTERM before escalating to
/// SIGKILL. Kept well under the scenario's ~2s interrupt bound.
const GRACE_PERIOD: Duration = Duration::from_millis(800);

pub struct BashTool;

#[derive(Deserialize)]
struct BashArgs {
    command: String,
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace working directory and return its output."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            [("command", JsonSchema::string("The shell command to execute."))],
            &["command"],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: BashArgs =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: e.to_string(),
            })?;

        let mut process = ctx
            .runtime
            .spawn("bash", &["-c".to_string(), args.command], SpawnOptions::default())
            .await?;

        let status = tokio::select! {
            status = process.wait() => status?,
            _ = ctx.abort.aborted() => {
                process.kill(Signal::Term).await?;
                tokio::select! {
                    status = process.wait() => status?,
                    _ = tokio::time::sleep(GRACE_PERIOD) => {
                        process.kill(Signal::Kill).await?;
                        process.wait().await?
                    }
                }
            }
        };
        Ok(json!({ "exitCode": status.code, "killed": status.killed }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AbortSignal;
    use mux_runtime::FakeRuntime;
    use mux_runtime::ScriptedExit;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn interrupting_a_blocked_command_resolves_quickly() {
        let runtime = Arc::new(FakeRuntime::new(PathBuf::from("/work")));
        runtime.script("bash", ScriptedExit::BlocksUntilKilled);
        let (abort, handle) = AbortSignal::new();
        let ctx = ToolContext::new(runtime, abort);

        let started = Instant::now();
        let call = tokio::spawn(async move {
            BashTool
                .execute(json!({ "command": "sleep 60" }), &ctx)
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        let result = call.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(result["killed"], json!(true));
    }

    #[tokio::test]
    async fn completes_normally_when_not_interrupted() {
        let runtime = Arc::new(FakeRuntime::new(PathBuf::from("/work")));
        let (abort, _handle) = AbortSignal::new();
        let ctx = ToolContext::new(runtime, abort);

        let result = BashTool
            .execute(json!({ "command": "echo hi" }), &ctx)
            .await
            .unwrap();
        assert_eq!(result["exitCode"], json!(0));
    }
}
