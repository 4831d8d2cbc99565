use crate::bus::WorkspaceBus;
use dashmap::DashMap;
use mux_protocol::WorkspaceId;
use std::sync::Arc;

/// Lazily creates and owns one `WorkspaceBus` per workspace.
#[derive(Default)]
pub struct IpcRegistry {
    buses: DashMap<WorkspaceId, Arc<WorkspaceBus>>,
}

impl IpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self, workspace_id: WorkspaceId) -> Arc<WorkspaceBus> {
        self.buses
            .entry(workspace_id)
            .or_insert_with(|| Arc::new(WorkspaceBus::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_workspace_id_returns_the_same_bus() {
        let registry = IpcRegistry::new();
        let id = WorkspaceId::new();
        let a = registry.bus(id);
        let b = registry.bus(id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_workspace_ids_get_different_buses() {
        let registry = IpcRegistry::new();
        let a = registry.bus(WorkspaceId::new());
        let b = registry.bus(WorkspaceId::new());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
