//! No concrete provider SDK ships in this repository (spec scope: "specified
//! only by the event shapes and capabilities the core consumes"). Two
//! transports live here instead: `EchoProviderTransport`, a reference
//! implementation in the spirit of `codex-core`'s `passthrough` adapter (a
//! stand-in that proves the wiring without speaking to a real API), wrapped
//! by `CliProviderTransport`, which does the api-key-resolution step a real
//! HTTP adapter would do before its first request.

use async_trait::async_trait;
use mux_core::ProviderEvent;
use mux_core::ProviderRequest;
use mux_core::ProviderTransport;
use mux_protocol::StreamErrorType;
use tokio::sync::mpsc;

/// Echoes the last user turn back as the assistant response. Good enough to
/// exercise the full stream/tool/compaction pipeline end to end without a
/// real model behind it.
pub struct EchoProviderTransport;

#[async_trait]
impl ProviderTransport for EchoProviderTransport {
    async fn stream(&self, request: ProviderRequest, events: mpsc::Sender<ProviderEvent>) {
        let last_user_turn = request
            .transcript
            .iter()
            .rev()
            .find(|(role, _)| *role == mux_protocol::Role::User)
            .map(|(_, text)| text.clone())
            .unwrap_or_default();

        let reply = format!("(echo) {last_user_turn}");
        if events.send(ProviderEvent::TextDelta(reply)).await.is_err() {
            return;
        }
        let _ = events
            .send(ProviderEvent::Finish {
                usage: None,
                provider_metadata: None,
                response_id: None,
            })
            .await;
    }
}

pub struct CliProviderTransport {
    api_key_env: String,
    inner: Box<dyn ProviderTransport>,
}

impl CliProviderTransport {
    pub fn new(api_key_env: String, inner: Box<dyn ProviderTransport>) -> Self {
        Self { api_key_env, inner }
    }
}

#[async_trait]
impl ProviderTransport for CliProviderTransport {
    async fn stream(&self, request: ProviderRequest, events: mpsc::Sender<ProviderEvent>) {
        if std::env::var_os(&self.api_key_env).is_none() {
            let _ = events
                .send(ProviderEvent::Error {
                    message: format!("environment variable {} is not set", self.api_key_env),
                    error_type: Some(StreamErrorType::ApiKeyNotFound),
                })
                .await;
            return;
        }
        self.inner.stream(request, events).await;
    }
}
