//! Protocol types shared across the workspace stream orchestrator: the data
//! model (`Message`, `Part`, ...), the IPC event alphabet, and the
//! request/response shapes of the IPC surface. This crate has no I/O and no
//! business logic; it exists so the orchestrator crates and a future
//! non-Rust frontend binding agree on one wire format.

pub mod commands;
pub mod error;
pub mod events;
pub mod ids;
pub mod message;
pub mod usage;
pub mod workspace;

pub use commands::*;
pub use error::*;
pub use events::*;
pub use ids::*;
pub use message::*;
pub use usage::*;
pub use workspace::*;
