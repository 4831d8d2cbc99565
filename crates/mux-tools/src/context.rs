//! Cancellable tool execution context: a workspace `Runtime` plus an abort
//! signal shared with the Stream Manager, following the same flag+`Notify`
//! idiom `mux-runtime`'s `FakeProcess` uses for its scripted-kill path.

use mux_runtime::Runtime;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

pub struct AbortHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl AbortSignal {
    pub fn new() -> (Self, AbortHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        (
            Self {
                flag: flag.clone(),
                notify: notify.clone(),
            },
            AbortHandle { flag, notify },
        )
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `abort` has been called. A tool calls this inside a
    /// `tokio::select!` alongside its own work to react to interruption.
    pub async fn aborted(&self) {
        while !self.is_aborted() {
            self.notify.notified().await;
        }
    }
}

impl AbortHandle {
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

pub struct ToolContext {
    pub runtime: Arc<dyn Runtime>,
    pub abort: AbortSignal,
}

impl ToolContext {
    pub fn new(runtime: Arc<dyn Runtime>, abort: AbortSignal) -> Self {
        Self { runtime, abort }
    }
}
