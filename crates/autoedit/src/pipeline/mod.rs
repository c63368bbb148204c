pub mod board;
pub mod config;
pub mod mode;
pub mod progress;
pub mod record;
pub mod runner;
pub mod summary;

pub use board::{BoardStep, StepBoard};
pub use config::WorkflowConfig;
pub use mode::ProcessingMode;
pub use progress::{
    NoopPhases, NoopProgress, PhaseReporter, ProgressReporter, StagePhase, StepStatus,
};
pub use record::{ResultRecord, WorkflowStepResult};
pub use runner::Workflow;
