//! IPC Event Bus (C9): per-workspace pub/sub with replay-then-live
//! subscription, always ending in `caught-up` once the caller has drained
//! history. Delivery is ordered and lossless per subscriber because every
//! subscriber gets its own `broadcast::Receiver`.

mod bus;
mod registry;

pub use bus::Subscription;
pub use bus::WorkspaceBus;
pub use registry::IpcRegistry;
