//! The five-stage verifiable-inference pipeline.

pub mod events;
pub mod fallback;
pub mod log_sink;
pub mod normalize;
pub mod orchestrator;
pub mod outcome;
pub mod steps;

pub use events::{EventPublisher, PipelineEvent};
pub use log_sink::LogSink;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RunOutcome};
pub use outcome::StageOutcome;
pub use steps::StepStateMachine;
