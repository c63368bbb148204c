use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::imaging::EncodedImage;

use super::progress::StepStatus;

/// Outcome of one logical workflow step, as recorded in a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStepResult {
    pub name: String,
    pub status: StepStatus,
    pub detail: String,
}

impl WorkflowStepResult {
    pub fn complete(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Complete,
            detail: detail.into(),
        }
    }
}

/// Output of one `Workflow::process` call. Read-only once returned, apart
/// from the duration the caller attaches.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    user_prompt: String,
    caption: String,
    refined_prompt: String,
    final_image: Option<EncodedImage>,
    original_image: Option<Vec<u8>>,
    steps: Vec<WorkflowStepResult>,
    created_at: DateTime<Utc>,
    duration_seconds: Option<f64>,
    stored_id: Option<String>,
}

impl ResultRecord {
    pub(crate) fn new(
        user_prompt: String,
        caption: String,
        refined_prompt: String,
        final_image: Option<EncodedImage>,
        original_image: Option<Vec<u8>>,
        steps: Vec<WorkflowStepResult>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_prompt,
            caption,
            refined_prompt,
            final_image,
            original_image,
            steps,
            created_at,
            duration_seconds: None,
            stored_id: None,
        }
    }

    /// Record for an empty upload: no image, no steps, brief passed through.
    pub(crate) fn empty(prompt: &str, created_at: DateTime<Utc>) -> Self {
        Self::new(
            prompt.to_string(),
            String::new(),
            prompt.to_string(),
            None,
            None,
            Vec::new(),
            created_at,
        )
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn refined_prompt(&self) -> &str {
        &self.refined_prompt
    }

    pub fn final_image(&self) -> Option<&EncodedImage> {
        self.final_image.as_ref()
    }

    pub fn final_image_format(&self) -> Option<&str> {
        self.final_image.as_ref().map(EncodedImage::format)
    }

    pub fn original_image(&self) -> Option<&[u8]> {
        self.original_image.as_deref()
    }

    pub fn steps(&self) -> &[WorkflowStepResult] {
        &self.steps
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Id the result was stored under, if it was persisted.
    pub fn stored_id(&self) -> Option<&str> {
        self.stored_id.as_deref()
    }

    pub(crate) fn with_stored_id(mut self, id: String) -> Self {
        self.stored_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record() {
        let now = Utc::now();
        let record = ResultRecord::empty("brighten", now);
        assert_eq!(record.user_prompt(), "brighten");
        assert_eq!(record.refined_prompt(), "brighten");
        assert_eq!(record.caption(), "");
        assert!(record.final_image().is_none());
        assert!(record.final_image_format().is_none());
        assert!(record.original_image().is_none());
        assert!(record.steps().is_empty());
        assert_eq!(record.created_at(), now);
    }

    #[test]
    fn test_format_follows_image() {
        let record = ResultRecord::new(
            "p".to_string(),
            String::new(),
            "p".to_string(),
            Some(EncodedImage::new(vec![1, 2], "jpeg")),
            Some(vec![1, 2]),
            vec![WorkflowStepResult::complete("Image Editing", "done")],
            Utc::now(),
        );
        assert_eq!(record.final_image_format(), Some("JPEG"));
        assert!(record.duration_seconds().is_none());
        assert_eq!(record.with_duration(1.5).duration_seconds(), Some(1.5));
    }

    #[test]
    fn test_step_serializes_lowercase_status() {
        let step = WorkflowStepResult::complete("Finalization", "ok");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["name"], "Finalization");
    }
}
