//! Model-backed stage variants. Loading and inference are delegated to a
//! loader/model pair so the same stage logic drives any backend.

use image::DynamicImage;
use tracing::{debug, info};

use crate::config::{CaptionConfig, EditConfig};
use crate::imaging::{self, EncodedImage};
use crate::pipeline::progress::{PhaseReporter, StagePhase, StepStatus};

use super::error::StageError;
use super::prompts::{assemble_edit_prompt, EDIT_NEGATIVE_PROMPT, JOYCAPTION_PROMPT};
use super::resident::ResidentModel;
use super::{Captioner, Editor};

/// Wraps an actual model load in ModelLoad phase events. Not called when the
/// model is already resident.
fn load_reporting<M>(
    name: &str,
    progress: &dyn PhaseReporter,
    load: impl FnOnce() -> Result<M, StageError>,
) -> Result<M, StageError> {
    progress.phase(
        StagePhase::ModelLoad,
        StepStatus::Active,
        &format!("Loading {} model...", name),
    );
    let model = load()?;
    progress.phase(
        StagePhase::ModelLoad,
        StepStatus::Complete,
        &format!("{} model loaded successfully.", name),
    );
    Ok(model)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSettings {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self::from(&CaptionConfig::default())
    }
}

impl From<&CaptionConfig> for CaptionSettings {
    fn from(config: &CaptionConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

pub struct CaptionRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub image: &'a DynamicImage,
    pub settings: &'a CaptionSettings,
}

pub trait CaptionModel: Send {
    fn generate(&self, request: &CaptionRequest<'_>) -> Result<String, StageError>;

    fn unload(&self) {}
}

pub trait CaptionLoader: Send + Sync {
    type Model: CaptionModel;

    fn name(&self) -> &str;

    fn load(&self) -> Result<Self::Model, StageError>;
}

pub struct ModelCaptioner<L: CaptionLoader> {
    loader: L,
    resident: ResidentModel<L::Model>,
    settings: CaptionSettings,
}

impl<L: CaptionLoader> ModelCaptioner<L> {
    pub fn new(loader: L, settings: CaptionSettings) -> Self {
        Self {
            loader,
            resident: ResidentModel::new(),
            settings,
        }
    }
}

impl<L: CaptionLoader> Captioner for ModelCaptioner<L> {
    fn caption(
        &self,
        image: &[u8],
        prompt: &str,
        progress: &dyn PhaseReporter,
    ) -> Result<String, StageError> {
        let name = self.loader.name();
        let image = imaging::decode(image).map_err(StageError::Decode)?;
        let request = CaptionRequest {
            system_prompt: JOYCAPTION_PROMPT,
            user_prompt: prompt,
            image: &image,
            settings: &self.settings,
        };

        let text = self.resident.with_model(
            || load_reporting(name, progress, || self.loader.load()),
            |model| {
                progress.phase(
                    StagePhase::Inference,
                    StepStatus::Active,
                    &format!("Generating caption with {}...", name),
                );
                model.generate(&request)
            },
        )?;

        progress.phase(
            StagePhase::Inference,
            StepStatus::Complete,
            "Caption generation complete.",
        );
        debug!(chars = text.len(), "Caption generated");
        Ok(text.trim().to_string())
    }

    fn backend(&self) -> &str {
        self.loader.name()
    }

    fn is_loaded(&self) -> bool {
        self.resident.is_loaded()
    }

    fn release(&self) {
        if let Some(model) = self.resident.release() {
            model.unload();
            info!(backend = self.loader.name(), "Released caption model");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSettings {
    pub seed: u64,
    pub true_cfg_scale: f32,
    pub num_inference_steps: u32,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self::from(&EditConfig::default())
    }
}

impl From<&EditConfig> for EditSettings {
    fn from(config: &EditConfig) -> Self {
        Self {
            seed: config.seed,
            true_cfg_scale: config.true_cfg_scale,
            num_inference_steps: config.num_inference_steps,
        }
    }
}

pub struct EditRequest<'a> {
    pub image: &'a DynamicImage,
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub settings: &'a EditSettings,
}

pub trait EditModel: Send {
    fn edit(&self, request: &EditRequest<'_>) -> Result<DynamicImage, StageError>;

    fn unload(&self) {}
}

pub trait EditLoader: Send + Sync {
    type Model: EditModel;

    fn name(&self) -> &str;

    fn load(&self) -> Result<Self::Model, StageError>;
}

pub struct ModelEditor<L: EditLoader> {
    loader: L,
    resident: ResidentModel<L::Model>,
    settings: EditSettings,
}

impl<L: EditLoader> ModelEditor<L> {
    pub fn new(loader: L, settings: EditSettings) -> Self {
        Self {
            loader,
            resident: ResidentModel::new(),
            settings,
        }
    }
}

impl<L: EditLoader> Editor for ModelEditor<L> {
    fn edit(
        &self,
        image: &[u8],
        refined_prompt: &str,
        keep_warm: bool,
        progress: &dyn PhaseReporter,
    ) -> Result<EncodedImage, StageError> {
        let name = self.loader.name();
        let source = imaging::decode(image).map_err(StageError::Decode)?;
        let prompt = assemble_edit_prompt(refined_prompt);
        let request = EditRequest {
            image: &source,
            prompt: &prompt,
            negative_prompt: EDIT_NEGATIVE_PROMPT,
            settings: &self.settings,
        };

        let outcome = self.resident.with_model(
            || load_reporting(name, progress, || self.loader.load()),
            |model| {
                progress.phase(
                    StagePhase::Inference,
                    StepStatus::Active,
                    &format!("Applying {}...", name),
                );
                model.edit(&request)
            },
        );

        if !keep_warm {
            self.release();
        }
        let edited = outcome?;
        progress.phase(
            StagePhase::Inference,
            StepStatus::Complete,
            &format!("{} applied successfully.", name),
        );

        progress.phase(
            StagePhase::Encode,
            StepStatus::Active,
            "Encoding result as PNG...",
        );
        let bytes = imaging::encode_png(&edited).map_err(StageError::Encode)?;
        progress.phase(StagePhase::Encode, StepStatus::Complete, "Result encoded.");

        Ok(EncodedImage::png(bytes))
    }

    fn backend(&self) -> &str {
        self.loader.name()
    }

    fn is_loaded(&self) -> bool {
        self.resident.is_loaded()
    }

    fn release(&self) {
        if let Some(model) = self.resident.release() {
            model.unload();
            info!(backend = self.loader.name(), "Released edit model");
        }
    }
}
