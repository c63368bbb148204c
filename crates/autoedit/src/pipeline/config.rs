use std::path::PathBuf;

use crate::config::{CaptionConfig, Config, EditConfig};

/// The part of the file config a `Workflow` needs.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub output_directory: PathBuf,
    pub persist_results: bool,
    pub keep_warm: bool,
    pub caption: CaptionConfig,
    pub edit: EditConfig,
}

impl WorkflowConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_directory: PathBuf::from(&config.output_directory),
            persist_results: config.persist_results,
            keep_warm: config.edit.keep_warm,
            caption: config.caption.clone(),
            edit: config.edit.clone(),
        }
    }
}
