use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// State of one display step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Complete,
    Error,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Unrecognized values fall back to `Pending`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "complete" => Self::Complete,
            "error" => Self::Error,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives `(step_index, status, message)` updates from the workflow.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, step_index: usize, status: StepStatus, message: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, StepStatus, &str) + Send + Sync,
{
    fn report(&self, step_index: usize, status: StepStatus, message: &str) {
        self(step_index, status, message)
    }
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _step_index: usize, _status: StepStatus, _message: &str) {}
}

/// Symbolic sub-steps a stage goes through. Display indices are assigned by
/// the workflow, never by the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    ModelLoad,
    Inference,
    Encode,
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ModelLoad => "model_load",
            Self::Inference => "inference",
            Self::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// Stage-side progress port.
pub trait PhaseReporter {
    fn phase(&self, phase: StagePhase, status: StepStatus, message: &str);
}

/// Discards phase updates. Handy when driving a stage directly.
pub struct NoopPhases;

impl PhaseReporter for NoopPhases {
    fn phase(&self, _phase: StagePhase, _status: StepStatus, _message: &str) {}
}

/// Forwards events to the caller's reporter while keeping the sequence
/// ordered: indices never go backwards, a step is activated before it is
/// completed, and the current step is completed before a later one starts.
pub(crate) struct ProgressRelay<'a> {
    reporter: Option<&'a dyn ProgressReporter>,
    labels: &'static [&'static str],
    // (index, completed)
    current: Cell<Option<(usize, bool)>>,
}

impl<'a> ProgressRelay<'a> {
    pub(crate) fn new(
        reporter: Option<&'a dyn ProgressReporter>,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            reporter,
            labels,
            current: Cell::new(None),
        }
    }

    fn clamp(&self, index: usize) -> usize {
        index.min(self.labels.len().saturating_sub(1))
    }

    fn emit(&self, index: usize, status: StepStatus, message: &str) {
        debug!(step = index, status = %status, "{}", message);
        if let Some(reporter) = self.reporter {
            reporter.report(index, status, message);
        }
    }

    /// Completes the current step if it is still open and earlier than `index`.
    fn close_before(&self, index: usize) {
        if let Some((current, false)) = self.current.get() {
            if current < index {
                let label = self.labels.get(current).copied().unwrap_or("Step");
                self.emit(current, StepStatus::Complete, &format!("{} complete.", label));
                self.current.set(Some((current, true)));
            }
        }
    }

    fn is_behind(&self, index: usize) -> bool {
        match self.current.get() {
            Some((current, _)) if index < current => true,
            Some((current, true)) if index == current => true,
            _ => false,
        }
    }

    pub(crate) fn activate(&self, index: usize, message: &str) {
        let index = self.clamp(index);
        if self.is_behind(index) {
            debug!(step = index, "Ignoring activation of a finished step");
            return;
        }
        self.close_before(index);
        self.emit(index, StepStatus::Active, message);
        self.current.set(Some((index, false)));
    }

    pub(crate) fn complete(&self, index: usize, message: &str) {
        let index = self.clamp(index);
        if self.is_behind(index) {
            debug!(step = index, "Ignoring completion of a finished step");
            return;
        }
        if self.current.get() != Some((index, false)) {
            self.close_before(index);
            self.emit(index, StepStatus::Active, message);
        }
        self.emit(index, StepStatus::Complete, message);
        self.current.set(Some((index, true)));
    }

    /// View handed to a stage. Work phases land on `work_slot`, encoding on
    /// `encode_slot` when the stage has one.
    pub(crate) fn stage(
        &self,
        work_slot: usize,
        encode_slot: Option<usize>,
    ) -> StageProgress<'_, 'a> {
        StageProgress {
            relay: self,
            work_slot,
            encode_slot,
        }
    }
}

pub(crate) struct StageProgress<'r, 'a> {
    relay: &'r ProgressRelay<'a>,
    work_slot: usize,
    encode_slot: Option<usize>,
}

impl PhaseReporter for StageProgress<'_, '_> {
    fn phase(&self, phase: StagePhase, status: StepStatus, message: &str) {
        let slot = match phase {
            StagePhase::Encode => self.encode_slot.unwrap_or(self.work_slot),
            StagePhase::ModelLoad | StagePhase::Inference => self.work_slot,
        };
        match status {
            StepStatus::Active => self.relay.activate(slot, message),
            other => debug!(phase = %phase, status = %other, "{}", message),
        }
    }
}
