pub mod extractor;
pub mod pipeline;
pub mod response;

pub use extractor::Extractor;
pub use pipeline::{Pipeline, PipelineOutcome, PipelineRunner, ToolCommand, ToolError};
pub use response::{FailureAction, ResponseState, ResponseTracker};
