use crate::context::ToolContext;
use crate::error::Result;
use crate::schema::JsonSchema;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> JsonSchema;

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Description-level spec exposed to the provider, independent of any
/// particular invocation.
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: JsonSchema,
}

impl ToolSpec {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
        }
    }
}
