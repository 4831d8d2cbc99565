/// Cross-stream, per-workspace state that outlives any single `startStream`
/// call: the response id to chain into the next request for continuity,
/// cleared (not resent) once a provider reports it as lost.
#[derive(Debug, Default)]
pub struct SessionState {
    pub previous_response_id: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}
