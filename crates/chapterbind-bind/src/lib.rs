pub mod assemble;
pub mod pipeline;
pub mod workspace;

pub use assemble::assemble;
pub use pipeline::{Pipeline, PipelineConfig};
pub use workspace::Workspace;
