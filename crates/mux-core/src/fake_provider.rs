//! Scripted `ProviderTransport` for tests, following the same
//! pre-script-then-replay idiom as `mux-runtime`'s `FakeRuntime`.

use crate::provider::ProviderEvent;
use crate::provider::ProviderRequest;
use crate::provider::ProviderTransport;
use async_trait::async_trait;
use dashmap::DashMap;
use mux_protocol::StreamErrorType;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Notify;

pub enum Script {
    /// Replays a fixed sequence of events, ignoring the incoming request.
    Events(Vec<ProviderEvent>),
    /// Blocks emitting any event until aborted, then sends nothing further
    /// (the Manager's own abort path is what produces `stream-abort`).
    BlocksUntilAborted,
    /// Fails every call with the given message, useful for the lost-response-id
    /// and configuration-error scenarios.
    AlwaysError {
        message: String,
        error_type: Option<StreamErrorType>,
    },
}

#[derive(Default)]
pub struct FakeProviderTransport {
    /// Scripts are consumed in order per call index, so a test can script a
    /// failing first call and a succeeding retry.
    scripts: DashMap<usize, Script>,
    call_count: AtomicUsize,
    abort: std::sync::Mutex<Option<Arc<Notify>>>,
    pub requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl FakeProviderTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_call(&self, call_index: usize, script: Script) {
        self.scripts.insert(call_index, script);
    }

    /// Aborts whichever call is currently blocked on `BlocksUntilAborted`.
    pub fn abort_current(&self) {
        if let Some(notify) = self.abort.lock().unwrap().as_ref() {
            notify.notify_waiters();
        }
    }
}

#[async_trait]
impl ProviderTransport for FakeProviderTransport {
    async fn stream(&self, request: ProviderRequest, events: mpsc::Sender<ProviderEvent>) {
        let call_index = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        match self.scripts.remove(&call_index).map(|(_, s)| s) {
            Some(Script::Events(scripted)) => {
                for event in scripted {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Some(Script::BlocksUntilAborted) => {
                let notify = Arc::new(Notify::new());
                *self.abort.lock().unwrap() = Some(notify.clone());
                notify.notified().await;
            }
            Some(Script::AlwaysError { message, error_type }) => {
                let _ = events.send(ProviderEvent::Error { message, error_type }).await;
            }
            None => {
                let _ = events
                    .send(ProviderEvent::Finish {
                        usage: None,
                        provider_metadata: None,
                        response_id: None,
                    })
                    .await;
            }
        }
    }
}
