//! System-Message Builder (C4): instruction file discovery, scoped-section
//! parsing (`Mode:`/`Model:`), and the six-step composition order.

mod compose;
mod discover;
mod error;
mod sections;

pub use compose::build_system_message;
pub use compose::SystemMessageInputs;
pub use discover::discover_instructions;
pub use error::InstructionsError;
pub use error::Result;
pub use sections::compile_model_pattern;
pub use sections::parse;
pub use sections::InstructionDocument;
pub use sections::ModeSection;
pub use sections::ModelSection;
