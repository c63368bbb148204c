//! Caller-side view of workflow progress.

use super::mode::ProcessingMode;
use super::progress::StepStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardStep {
    pub label: String,
    pub status: StepStatus,
    pub message: String,
}

/// Step list a front end redraws on every progress event.
///
/// Activating a step completes everything before it; completing a step
/// activates the next one if it is still pending. Errors never advance.
#[derive(Debug, Clone)]
pub struct StepBoard {
    steps: Vec<BoardStep>,
    current: usize,
}

impl StepBoard {
    pub fn new(labels: &[&str]) -> Self {
        let steps = labels
            .iter()
            .map(|label| BoardStep {
                label: label.to_string(),
                status: StepStatus::Pending,
                message: String::new(),
            })
            .collect();
        Self { steps, current: 0 }
    }

    pub fn for_mode(mode: ProcessingMode) -> Self {
        Self::new(mode.progress_labels())
    }

    pub fn steps(&self) -> &[BoardStep] {
        &self.steps
    }

    /// Index of the step most recently touched.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn apply(&mut self, step_index: usize, status: StepStatus, message: &str) {
        let Some(last) = self.steps.len().checked_sub(1) else {
            return;
        };
        let index = step_index.min(last);

        match status {
            StepStatus::Active => {
                for step in &mut self.steps[..index] {
                    step.status = StepStatus::Complete;
                }
                self.current = index;
            }
            StepStatus::Complete => {
                self.current = index;
                if let Some(next) = self.steps.get_mut(index + 1) {
                    if next.status == StepStatus::Pending {
                        next.status = StepStatus::Active;
                        self.current = index + 1;
                    }
                }
            }
            StepStatus::Error | StepStatus::Pending => self.current = index,
        }

        let step = &mut self.steps[index];
        step.status = status;
        step.message = message.to_string();
    }

    /// Same as [`apply`](Self::apply) for statuses arriving as strings.
    pub fn apply_raw(&mut self, step_index: usize, status: &str, message: &str) {
        self.apply(step_index, StepStatus::parse_lossy(status), message);
    }

    /// Marks the current step as failed.
    pub fn fail_current(&mut self, message: &str) {
        self.apply(self.current, StepStatus::Error, message);
    }

    pub fn is_finished(&self) -> bool {
        self.steps
            .iter()
            .all(|s| s.status == StepStatus::Complete)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let marker = match step.status {
                StepStatus::Pending => "[ ]",
                StepStatus::Active => "[>]",
                StepStatus::Complete => "[x]",
                StepStatus::Error => "[!]",
            };
            out.push_str(marker);
            out.push(' ');
            out.push_str(&step.label);
            if !step.message.is_empty() {
                out.push_str(": ");
                out.push_str(&step.message);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(board: &StepBoard) -> Vec<StepStatus> {
        board.steps().iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_new_board_is_pending() {
        let board = StepBoard::for_mode(ProcessingMode::Casual);
        assert_eq!(board.steps().len(), 4);
        assert!(board.steps().iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_active_completes_prior_steps() {
        let mut board = StepBoard::for_mode(ProcessingMode::Casual);
        board.apply(2, StepStatus::Active, "Loading model...");
        assert_eq!(
            statuses(&board),
            vec![
                StepStatus::Complete,
                StepStatus::Complete,
                StepStatus::Active,
                StepStatus::Pending,
            ]
        );
        assert_eq!(board.steps()[2].message, "Loading model...");
        assert_eq!(board.current(), 2);
    }

    #[test]
    fn test_complete_activates_next_pending() {
        let mut board = StepBoard::for_mode(ProcessingMode::Casual);
        board.apply(0, StepStatus::Active, "");
        board.apply(0, StepStatus::Complete, "caption");
        assert_eq!(board.steps()[1].status, StepStatus::Active);
        assert_eq!(board.current(), 1);

        board.apply(3, StepStatus::Complete, "done");
        assert_eq!(board.steps()[3].status, StepStatus::Complete);
    }

    #[test]
    fn test_error_does_not_advance() {
        let mut board = StepBoard::for_mode(ProcessingMode::Casual);
        board.apply(1, StepStatus::Active, "");
        board.fail_current("Processing failed. Please try again.");
        assert_eq!(
            statuses(&board),
            vec![
                StepStatus::Complete,
                StepStatus::Error,
                StepStatus::Pending,
                StepStatus::Pending,
            ]
        );
    }

    #[test]
    fn test_index_clamped_and_unknown_status_pending() {
        let mut board = StepBoard::for_mode(ProcessingMode::Professional);
        board.apply(9, StepStatus::Active, "far");
        assert_eq!(board.steps()[1].status, StepStatus::Active);

        board.apply_raw(1, "bogus", "");
        assert_eq!(board.steps()[1].status, StepStatus::Pending);
    }

    #[test]
    fn test_empty_board_ignores_events() {
        let mut board = StepBoard::new(&[]);
        board.apply(0, StepStatus::Active, "x");
        assert!(board.steps().is_empty());
    }

    #[test]
    fn test_render_and_finished() {
        let mut board = StepBoard::for_mode(ProcessingMode::Professional);
        board.apply(0, StepStatus::Complete, "edited");
        board.apply(1, StepStatus::Complete, "Result ready");
        assert!(board.is_finished());
        assert_eq!(
            board.render(),
            "[x] Image Editing: edited\n[x] Finalization: Result ready\n"
        );
    }
}
