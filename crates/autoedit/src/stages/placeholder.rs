//! Keyword-based stand-ins used when no model backend is available.

use tracing::debug;

use crate::imaging::EncodedImage;
use crate::pipeline::progress::{PhaseReporter, StagePhase, StepStatus};

use super::error::StageError;
use super::{Captioner, Editor};

/// Prefix on every placeholder caption so it cannot pass for model output.
pub const PLACEHOLDER_MARKER: &str = "[placeholder]";

struct StylePattern {
    keywords: &'static [&'static str],
    directives: &'static str,
}

/// Known stylistic briefs and the edits they usually expand to.
const PATTERNS: &[StylePattern] = &[
    StylePattern {
        keywords: &["vintage", "retro", "old photo", "nostalgic"],
        directives: "add sepia tone, reduce saturation slightly, add subtle film grain",
    },
    StylePattern {
        keywords: &["sci-fi", "scifi", "futuristic", "cyberpunk"],
        directives: "shift color grading to cool blue tones, add subtle neon highlights, increase contrast slightly",
    },
    StylePattern {
        keywords: &["professional", "polished", "clean up", "sharper"],
        directives: "balance white balance, increase sharpness slightly, reduce background noise",
    },
    StylePattern {
        keywords: &["cinematic", "movie", "film look"],
        directives: "apply teal and orange color grading, deepen shadows slightly, add soft vignette",
    },
    StylePattern {
        keywords: &["rich", "luxury", "expensive"],
        directives: "add luxury wristwatch, refine jacket fabric to fine wool",
    },
    StylePattern {
        keywords: &["black and white", "monochrome", "grayscale", "b&w"],
        directives: "convert to black and white, increase contrast slightly",
    },
    StylePattern {
        keywords: &["warm", "sunset", "golden hour"],
        directives: "shift white balance warmer, add soft golden light",
    },
    StylePattern {
        keywords: &["elf", "fantasy"],
        directives: "add subtle pointed ears, add silver circlet on head",
    },
];

/// Directive list for a brief: a matched pattern, or the normalized brief.
fn directives_for(prompt: &str) -> String {
    let lower = prompt.to_lowercase();
    for pattern in PATTERNS {
        if pattern.keywords.iter().any(|k| lower.contains(k)) {
            return pattern.directives.to_string();
        }
    }
    prompt.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct PlaceholderCaptioner;

impl Captioner for PlaceholderCaptioner {
    fn caption(
        &self,
        _image: &[u8],
        prompt: &str,
        progress: &dyn PhaseReporter,
    ) -> Result<String, StageError> {
        progress.phase(
            StagePhase::Inference,
            StepStatus::Active,
            "Caption model unavailable, deriving directives from the brief...",
        );

        let directives = directives_for(prompt);
        if directives.is_empty() {
            return Ok(String::new());
        }
        debug!(directives = %directives, "Placeholder caption");
        Ok(format!("{} {}", PLACEHOLDER_MARKER, directives))
    }

    fn backend(&self) -> &str {
        "placeholder"
    }
}

/// Returns the original image untouched.
pub struct PassthroughEditor;

impl Editor for PassthroughEditor {
    fn edit(
        &self,
        image: &[u8],
        _refined_prompt: &str,
        _keep_warm: bool,
        progress: &dyn PhaseReporter,
    ) -> Result<EncodedImage, StageError> {
        progress.phase(
            StagePhase::Inference,
            StepStatus::Active,
            "Edit model unavailable, returning the original image...",
        );
        Ok(EncodedImage::sniffed(image.to_vec()))
    }

    fn backend(&self) -> &str {
        "passthrough"
    }
}
