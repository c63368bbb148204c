use std::fmt;

use serde::{Deserialize, Serialize};

pub const CAPTION_EXTRACTION: &str = "Caption Extraction";
pub const PROMPT_ORCHESTRATION: &str = "Prompt Orchestration";
pub const IMAGE_EDITING: &str = "Image Editing";
pub const FINALIZATION: &str = "Finalization";

const CASUAL_PLAN: &[&str] = &[
    CAPTION_EXTRACTION,
    PROMPT_ORCHESTRATION,
    IMAGE_EDITING,
    FINALIZATION,
];
const PROFESSIONAL_PLAN: &[&str] = &[IMAGE_EDITING, FINALIZATION];

/// Casual mode captions the image and refines the brief; professional mode
/// sends the brief to the editor verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    #[default]
    Casual,
    Professional,
}

impl ProcessingMode {
    /// Any label starting with "pro" (case-insensitive) is professional.
    pub fn from_label(label: &str) -> Self {
        if label.to_lowercase().starts_with("pro") {
            Self::Professional
        } else {
            Self::Casual
        }
    }

    pub fn is_professional(self) -> bool {
        matches!(self, Self::Professional)
    }

    /// Display steps a renderer should draw for this mode, in order.
    pub fn progress_labels(self) -> &'static [&'static str] {
        match self {
            Self::Casual => CASUAL_PLAN,
            Self::Professional => PROFESSIONAL_PLAN,
        }
    }

    /// Display index of the first edit-stage step.
    pub(crate) fn edit_slot(self) -> usize {
        match self {
            Self::Casual => 2,
            Self::Professional => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Professional => "professional",
        }
    }
}

impl From<&str> for ProcessingMode {
    fn from(label: &str) -> Self {
        Self::from_label(label)
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
