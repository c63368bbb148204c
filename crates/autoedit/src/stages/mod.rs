//! Caption and edit stages.
//!
//! Each stage has a model-backed variant and a fallback variant. Which one a
//! workflow gets is decided once, at construction, by probing the configured
//! backend. Built without the "ai" feature, the fallbacks are always used.

pub mod error;
pub mod model;
pub mod placeholder;
pub mod prompts;
#[cfg(feature = "ai")]
pub mod remote;
pub mod resident;

use tracing::info;

use crate::config::{CaptionConfig, EditConfig};
use crate::pipeline::progress::PhaseReporter;

pub use crate::imaging::EncodedImage;
pub use error::StageError;
pub use model::{
    CaptionLoader, CaptionModel, CaptionRequest, CaptionSettings, EditLoader, EditModel,
    EditRequest, EditSettings, ModelCaptioner, ModelEditor,
};
pub use placeholder::{PassthroughEditor, PlaceholderCaptioner, PLACEHOLDER_MARKER};
pub use resident::ResidentModel;

pub const CAPTION_STAGE: &str = "caption";
pub const EDIT_STAGE: &str = "edit";

/// Turns an image plus a casual brief into concrete edit directives.
pub trait Captioner: Send + Sync {
    fn caption(
        &self,
        image: &[u8],
        prompt: &str,
        progress: &dyn PhaseReporter,
    ) -> Result<String, StageError>;

    /// Short name used in logs and step details.
    fn backend(&self) -> &str;

    fn is_loaded(&self) -> bool {
        false
    }

    fn release(&self) {}
}

/// Applies edit directives to an image.
pub trait Editor: Send + Sync {
    /// With `keep_warm` unset the model is released once the call finishes.
    fn edit(
        &self,
        image: &[u8],
        refined_prompt: &str,
        keep_warm: bool,
        progress: &dyn PhaseReporter,
    ) -> Result<EncodedImage, StageError>;

    fn backend(&self) -> &str;

    fn is_loaded(&self) -> bool {
        false
    }

    fn release(&self) {}
}

pub fn build_captioner(config: &CaptionConfig) -> Box<dyn Captioner> {
    match detect_captioner(config) {
        Ok(captioner) => {
            info!(backend = captioner.backend(), "Caption stage ready");
            captioner
        }
        Err(e) => {
            info!("Using placeholder captioner: {}", e);
            Box::new(PlaceholderCaptioner)
        }
    }
}

pub fn build_editor(config: &EditConfig) -> Box<dyn Editor> {
    match detect_editor(config) {
        Ok(editor) => {
            info!(backend = editor.backend(), "Edit stage ready");
            editor
        }
        Err(e) => {
            info!("Using passthrough editor: {}", e);
            Box::new(PassthroughEditor)
        }
    }
}

#[cfg(feature = "ai")]
fn detect_captioner(config: &CaptionConfig) -> Result<Box<dyn Captioner>, StageError> {
    let loader = remote::RemoteCaptionLoader::probe(config)?;
    Ok(Box::new(ModelCaptioner::new(
        loader,
        CaptionSettings::from(config),
    )))
}

#[cfg(not(feature = "ai"))]
fn detect_captioner(_config: &CaptionConfig) -> Result<Box<dyn Captioner>, StageError> {
    Err(StageError::Unavailable {
        stage: CAPTION_STAGE,
        reason: "built without the `ai` feature".to_string(),
    })
}

#[cfg(feature = "ai")]
fn detect_editor(config: &EditConfig) -> Result<Box<dyn Editor>, StageError> {
    let loader = remote::RemoteEditLoader::probe(config)?;
    Ok(Box::new(ModelEditor::new(loader, EditSettings::from(config))))
}

#[cfg(not(feature = "ai"))]
fn detect_editor(_config: &EditConfig) -> Result<Box<dyn Editor>, StageError> {
    Err(StageError::Unavailable {
        stage: EDIT_STAGE,
        reason: "built without the `ai` feature".to_string(),
    })
}
