use crate::ids::WorkspaceId;
use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use ts_rs::TS;

/// A workspace is created by user action and destroyed only on explicit
/// removal; the core never auto-deletes one. `project_path` anchors the
/// Runtime's working directory and the instruction-file search root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    #[ts(type = "string")]
    pub project_path: PathBuf,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, project_path: PathBuf) -> Self {
        Self {
            id: WorkspaceId::new(),
            name: name.into(),
            project_path,
            created_at: Utc::now(),
        }
    }
}
