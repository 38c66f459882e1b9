pub mod artifact;
pub mod service;
pub mod state;

pub use artifact::TempArtifact;
pub use service::{TranscriptionResult, TranscriptionService};
pub use state::{PipelineStage, RunTracker};
