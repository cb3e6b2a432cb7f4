pub mod artifacts;
pub mod builtin;
pub mod registry;

pub use artifacts::ArtifactStore;
pub use builtin::register_builtin_tools;
pub use registry::{ToolHandler, ToolRegistry, ToolSpec};
