#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use autoedit::error::StorageError;
use autoedit::imaging;
use autoedit::pipeline::{PhaseReporter, StagePhase};
use autoedit::{
    Captioner, Editor, EncodedImage, ProgressReporter, ResultRecord, ResultSink, StageError,
    StepStatus, StoredResult,
};
use image::{DynamicImage, Rgb, RgbImage};

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 128]));
    imaging::encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(usize, StepStatus, String)>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<(usize, StepStatus, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, step_index: usize, status: StepStatus, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((step_index, status, message.to_string()));
    }
}

/// Shared view into what a fake stage saw.
#[derive(Clone, Default)]
pub struct Calls {
    pub count: Arc<AtomicUsize>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub busy: Arc<AtomicBool>,
    pub overlapped: Arc<AtomicBool>,
}

impl Calls {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn enter(&self, prompt: &str) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Captioner that returns a canned reply and reports both work phases.
pub struct FakeCaptioner {
    pub reply: String,
    pub calls: Calls,
    pub delay: Duration,
}

impl FakeCaptioner {
    pub fn new(reply: &str) -> (Self, Calls) {
        let calls = Calls::default();
        (
            Self {
                reply: reply.to_string(),
                calls: calls.clone(),
                delay: Duration::ZERO,
            },
            calls,
        )
    }
}

impl Captioner for FakeCaptioner {
    fn caption(
        &self,
        _image: &[u8],
        prompt: &str,
        progress: &dyn PhaseReporter,
    ) -> Result<String, StageError> {
        self.calls.enter(prompt);
        progress.phase(StagePhase::ModelLoad, StepStatus::Active, "Loading fake captioner...");
        progress.phase(StagePhase::ModelLoad, StepStatus::Complete, "Loaded.");
        progress.phase(StagePhase::Inference, StepStatus::Active, "Captioning...");
        thread::sleep(self.delay);
        progress.phase(StagePhase::Inference, StepStatus::Complete, "Captioned.");
        self.calls.leave();
        Ok(self.reply.clone())
    }

    fn backend(&self) -> &str {
        "fake-caption"
    }
}

/// Editor that flips the image horizontally and walks through all phases.
pub struct FakeEditor {
    pub calls: Calls,
    pub fail: bool,
}

impl FakeEditor {
    pub fn new() -> (Self, Calls) {
        let calls = Calls::default();
        (
            Self {
                calls: calls.clone(),
                fail: false,
            },
            calls,
        )
    }

    pub fn failing() -> Self {
        Self {
            calls: Calls::default(),
            fail: true,
        }
    }
}

impl Editor for FakeEditor {
    fn edit(
        &self,
        image: &[u8],
        refined_prompt: &str,
        _keep_warm: bool,
        progress: &dyn PhaseReporter,
    ) -> Result<EncodedImage, StageError> {
        self.calls.enter(refined_prompt);
        progress.phase(StagePhase::ModelLoad, StepStatus::Active, "Loading fake editor...");
        progress.phase(StagePhase::Inference, StepStatus::Active, "Editing...");
        let result = if self.fail {
            Err(StageError::Inference {
                stage: "edit",
                message: "diffusion crashed".to_string(),
            })
        } else {
            progress.phase(StagePhase::Encode, StepStatus::Active, "Encoding...");
            let decoded = imaging::decode(image).map_err(StageError::Decode)?;
            imaging::encode_png(&decoded.fliph())
                .map(EncodedImage::png)
                .map_err(StageError::Encode)
        };
        self.calls.leave();
        result
    }

    fn backend(&self) -> &str {
        "fake-edit"
    }
}

/// Sink that always fails.
pub struct BrokenSink;

impl ResultSink for BrokenSink {
    fn save(&self, _record: &ResultRecord) -> Result<StoredResult, StorageError> {
        Err(StorageError::WriteFile {
            path: "/dev/full/results.json".into(),
            source: std::io::Error::other("disk full"),
        })
    }
}

/// Checks the ordering guarantees of a progress stream against a plan of
/// `steps` display steps.
pub fn assert_well_ordered(events: &[(usize, StepStatus, String)], steps: usize) {
    assert!(!events.is_empty(), "no progress events");

    let mut last_index = 0;
    let mut completed: Vec<bool> = vec![false; steps];
    let mut activated: Vec<bool> = vec![false; steps];

    for (index, status, message) in events {
        let index = *index;
        assert!(index < steps, "index {index} out of range ({message})");
        assert!(index >= last_index, "index went backwards to {index} ({message})");
        assert!(!completed[index], "event after completion of step {index}");
        if index > last_index {
            assert!(
                (last_index == 0 && !activated[0]) || completed[last_index],
                "step {last_index} left open when {index} started"
            );
        }
        match status {
            StepStatus::Active => activated[index] = true,
            StepStatus::Complete => {
                assert!(activated[index], "step {index} completed before active");
                completed[index] = true;
            }
            other => panic!("unexpected status {other:?}"),
        }
        last_index = index;
    }

    let (index, status, _) = events.last().unwrap();
    assert_eq!(*index, steps - 1);
    assert_eq!(*status, StepStatus::Complete);
}
