//! Crash-safe per-workspace durable storage (C2/C3): an append-only JSONL
//! history log plus a single-slot partial-message snapshot. Every mutating
//! operation is observable on the next `read` even across a process
//! restart, which is what lets the Stream Manager treat a crash mid-stream
//! as just another kind of interruption.

mod error;
mod history;
mod partial;

pub use error::Result;
pub use error::StoreError;
pub use history::FileHistoryStore;
pub use history::HistoryStore;
pub use partial::FilePartialStore;
pub use partial::PartialStore;
