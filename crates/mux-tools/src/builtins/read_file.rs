use crate::context::ToolContext;
use crate::error::Result;
use crate::error::ToolError;
use crate::schema::JsonSchema;
use crate::tool::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use std::path::Path;

pub struct ReadFileTool;

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the full contents of a text file within the workspace."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            [(
                "path",
                JsonSchema::string("Path to the file, relative to the workspace root."),
            )],
            &["path"],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ReadFileArgs =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: e.to_string(),
            })?;
        let bytes = ctx.runtime.read_file(Path::new(&args.path)).await?;
        let contents = String::from_utf8_lossy(&bytes).into_owned();
        Ok(json!({ "contents": contents }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AbortSignal;
    use mux_runtime::FakeRuntime;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn reads_a_seeded_file() {
        let runtime = Arc::new(FakeRuntime::new(PathBuf::from("/work")));
        runtime.seed_file("/work/a.txt", b"hello".to_vec());
        let (abort, _handle) = AbortSignal::new();
        let ctx = ToolContext::new(runtime, abort);

        let result = ReadFileTool
            .execute(json!({ "path": "a.txt" }), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!({ "contents": "hello" }));
    }

    #[tokio::test]
    async fn missing_file_is_a_runtime_error() {
        let runtime = Arc::new(FakeRuntime::new(PathBuf::from("/work")));
        let (abort, _handle) = AbortSignal::new();
        let ctx = ToolContext::new(runtime, abort);

        let result = ReadFileTool.execute(json!({ "path": "missing.txt" }), &ctx).await;
        assert!(result.is_err());
    }
}
