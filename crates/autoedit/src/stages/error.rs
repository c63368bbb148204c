use thiserror::Error;

/// Errors raised by the caption and edit stages.
///
/// `Unavailable` only comes out of capability detection and selects the
/// fallback variant. Everything else is a runtime failure and reaches the
/// caller of `Workflow::process` unchanged.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} backend unavailable: {reason}")]
    Unavailable { stage: &'static str, reason: String },

    #[error("Failed to load {stage} model: {message}")]
    ModelLoad { stage: &'static str, message: String },

    #[error("{stage} inference failed: {message}")]
    Inference { stage: &'static str, message: String },

    #[error("Failed to decode input image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode output image: {0}")]
    Encode(#[source] image::ImageError),
}

impl StageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
