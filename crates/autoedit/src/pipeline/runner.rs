use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::StorageError;
use crate::imaging::{self, EncodedImage};
use crate::stages::{self, Captioner, Editor, StageError};
use crate::storage::{ResultSink, ResultStore, StoredResult};

use super::config::WorkflowConfig;
use super::mode::{
    ProcessingMode, CAPTION_EXTRACTION, FINALIZATION, IMAGE_EDITING, PROMPT_ORCHESTRATION,
};
use super::progress::{ProgressRelay, ProgressReporter};
use super::record::{ResultRecord, WorkflowStepResult};
use super::summary::{truncate_summary, CAPTION_SUMMARY_LIMIT, PROMPT_SUMMARY_LIMIT};

/// Sequences captioning, prompt refinement and editing for one image at a time.
pub struct Workflow {
    captioner: Box<dyn Captioner>,
    editor: Box<dyn Editor>,
    sink: Option<Arc<dyn ResultSink>>,
    keep_warm: bool,
    // Held for the whole of `process`; stores the last `created_at` handed out.
    run_lock: Mutex<Option<DateTime<Utc>>>,
}

impl Workflow {
    /// Production constructor. Probes the configured backends and opens the
    /// result store when persistence is enabled.
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, StorageError> {
        let captioner = stages::build_captioner(&config.caption);
        let editor = stages::build_editor(&config.edit);

        let mut workflow = Self::new(captioner, editor).with_keep_warm(config.keep_warm);
        if config.persist_results {
            let store = ResultStore::open(&config.output_directory)?;
            workflow = workflow.with_sink(Arc::new(store));
        }
        Ok(workflow)
    }

    /// Builds a workflow around explicit stages, without persistence.
    pub fn new(captioner: Box<dyn Captioner>, editor: Box<dyn Editor>) -> Self {
        Self {
            captioner,
            editor,
            sink: None,
            keep_warm: false,
            run_lock: Mutex::new(None),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Keep the edit model resident after casual-mode runs too.
    pub fn with_keep_warm(mut self, keep_warm: bool) -> Self {
        self.keep_warm = keep_warm;
        self
    }

    pub fn captioner_backend(&self) -> &str {
        self.captioner.backend()
    }

    pub fn editor_backend(&self) -> &str {
        self.editor.backend()
    }

    /// Drops any resident caption and edit models.
    pub fn release_models(&self) {
        self.captioner.release();
        self.editor.release();
    }

    /// Runs the workflow for one image.
    ///
    /// An empty `image` returns immediately with no image and no steps.
    /// Stage failures are returned unchanged; storage failures are logged
    /// and do not affect the returned record.
    pub fn process(
        &self,
        prompt: &str,
        image: &[u8],
        mode: ProcessingMode,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<ResultRecord, StageError> {
        let mut last_stamp = self
            .run_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let run_id = Uuid::new_v4();
        let _span = info_span!("workflow", run_id = %run_id, mode = %mode).entered();

        if image.is_empty() {
            debug!("Empty image, nothing to do");
            return Ok(ResultRecord::empty(prompt, next_stamp(&mut last_stamp)));
        }

        let relay = ProgressRelay::new(progress, mode.progress_labels());
        let mut steps = Vec::with_capacity(4);

        let (caption, refined_prompt) = if mode.is_professional() {
            steps.push(WorkflowStepResult::complete(
                PROMPT_ORCHESTRATION,
                "Professional mode: brief forwarded to the editor without refinement.",
            ));
            (String::new(), prompt.to_string())
        } else {
            let caption = self.run_caption(&relay, image, prompt)?;
            steps.push(WorkflowStepResult::complete(
                CAPTION_EXTRACTION,
                caption_detail(&caption),
            ));

            relay.activate(1, "Orchestrating edit prompt...");
            let refined_prompt = if caption.trim().is_empty() {
                debug!("Empty caption, falling back to the user prompt");
                prompt.to_string()
            } else {
                caption.clone()
            };
            let refined_summary = truncate_summary(&refined_prompt, PROMPT_SUMMARY_LIMIT);
            relay.complete(1, &refined_summary);
            steps.push(WorkflowStepResult::complete(
                PROMPT_ORCHESTRATION,
                format!("Refined instructions prepared: {}", refined_summary),
            ));
            (caption, refined_prompt)
        };

        let keep_warm = mode.is_professional() || self.keep_warm;
        let edited = self.run_edit(&relay, mode, image, &refined_prompt, keep_warm)?;
        steps.push(WorkflowStepResult::complete(
            IMAGE_EDITING,
            format!("Edited with {}.", self.editor.backend()),
        ));

        let final_slot = mode.progress_labels().len() - 1;
        relay.activate(final_slot, "Finalizing result...");
        steps.push(WorkflowStepResult::complete(
            FINALIZATION,
            format!(
                "Result encoded as {} ({}).",
                edited.format(),
                imaging::format_filesize(edited.bytes().len() as u64)
            ),
        ));

        let mut record = ResultRecord::new(
            prompt.to_string(),
            caption,
            refined_prompt,
            Some(edited),
            Some(image.to_vec()),
            steps,
            next_stamp(&mut last_stamp),
        );

        match self.persist(&record) {
            Some(stored) => {
                relay.complete(final_slot, &format!("Result ready and saved as {}.", stored.id));
                record = record.with_stored_id(stored.id);
            }
            None => relay.complete(final_slot, "Result ready."),
        }

        info!(
            steps = record.steps().len(),
            format = record.final_image_format().unwrap_or_default(),
            "Workflow finished"
        );
        Ok(record)
    }

    fn run_caption(
        &self,
        relay: &ProgressRelay<'_>,
        image: &[u8],
        prompt: &str,
    ) -> Result<String, StageError> {
        let _step = info_span!("caption", backend = self.captioner.backend()).entered();
        relay.activate(0, "Extracting caption...");

        let caption = self.captioner.caption(image, prompt, &relay.stage(0, None))?;
        relay.complete(0, &caption_detail(&caption));
        Ok(caption)
    }

    fn run_edit(
        &self,
        relay: &ProgressRelay<'_>,
        mode: ProcessingMode,
        image: &[u8],
        refined_prompt: &str,
        keep_warm: bool,
    ) -> Result<EncodedImage, StageError> {
        let _step = info_span!("edit", backend = self.editor.backend(), keep_warm).entered();
        let slot = mode.edit_slot();
        relay.activate(slot, "Preparing image editor...");

        let edited = self.editor.edit(
            image,
            refined_prompt,
            keep_warm,
            &relay.stage(slot, Some(slot + 1)),
        )?;
        relay.complete(slot, "Edited image generated.");
        Ok(edited)
    }

    fn persist(&self, record: &ResultRecord) -> Option<StoredResult> {
        let sink = self.sink.as_ref()?;
        let _step = info_span!("persist").entered();
        match sink.save(record) {
            Ok(stored) => {
                info!(id = %stored.id, "Result saved");
                Some(stored)
            }
            Err(e) => {
                warn!("Failed to save result: {}", e);
                None
            }
        }
    }
}

fn caption_detail(caption: &str) -> String {
    if caption.trim().is_empty() {
        "No caption produced.".to_string()
    } else {
        truncate_summary(caption, CAPTION_SUMMARY_LIMIT)
    }
}

/// Current time, clamped so stamps never go backwards.
fn next_stamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    let stamp = match *last {
        Some(previous) if previous > now => previous,
        _ => now,
    };
    *last = Some(stamp);
    stamp
}
