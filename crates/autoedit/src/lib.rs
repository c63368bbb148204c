pub mod config;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod pipeline;
pub mod stages;
pub mod storage;

pub use config::{load_config, Config};
pub use error::{AutoEditError, ConfigError, Result, StorageError};
pub use pipeline::{
    NoopProgress, ProcessingMode, ProgressReporter, ResultRecord, StepBoard, StepStatus,
    Workflow, WorkflowConfig, WorkflowStepResult,
};
pub use stages::{Captioner, Editor, EncodedImage, StageError};
pub use storage::{ResultSink, ResultStore, StoredResult};
