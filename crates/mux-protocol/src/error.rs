use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

/// Closed taxonomy of errors surfaced to IPC subscribers and persisted on
/// committed partial messages. Keeping this closed (rather than a free-form
/// string) is what lets the UI render a specific recovery action per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorType {
    ApiKeyNotFound,
    InvalidModelString,
    ModelNotFound,
    ContextExceeded,
    RateLimited,
    ProviderTransient,
    Unknown,
}

impl StreamErrorType {
    /// Configuration errors are detected before any provider call is made and
    /// are returned synchronously from `sendMessage` rather than as a stream event.
    pub fn is_configuration_error(self) -> bool {
        matches!(
            self,
            StreamErrorType::ApiKeyNotFound
                | StreamErrorType::InvalidModelString
                | StreamErrorType::ModelNotFound
        )
    }
}

/// Error metadata attached to a committed message (`metadata.error` /
/// `metadata.errorType` in spec terms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct MessageError {
    pub error_type: StreamErrorType,
    pub message: String,
}
