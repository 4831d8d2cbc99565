//! Abstract filesystem + process execution surface (C1). A `Runtime` is
//! passed into every stream and tool invocation rather than reached for as
//! global state, which is what lets tests substitute an in-memory variant.

mod error;
mod local;
mod process;
mod remote;
mod runtime;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use error::Result;
pub use error::RuntimeError;
pub use local::LocalRuntime;
pub use process::ExitStatus;
pub use process::Process;
pub use process::Signal;
pub use process::SpawnOptions;
pub use remote::RemoteRuntime;
pub use runtime::Runtime;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRuntime;
#[cfg(any(test, feature = "test-support"))]
pub use fake::ScriptedExit;
