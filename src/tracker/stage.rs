use crate::api::{PodcastStatus, TaskType};
use serde::Serialize;

/// Audio task progress from which the backend is uploading and verifying the file.
pub const QUALITY_PROGRESS_THRESHOLD: u8 = 80;

/// The five UI-visible generation phases, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Upload,
    Processing,
    Generation,
    Quality,
    Complete,
}

pub const STAGES: [Stage; 5] = [
    Stage::Upload,
    Stage::Processing,
    Stage::Generation,
    Stage::Quality,
    Stage::Complete,
];

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Upload => "Paper upload",
            Stage::Processing => "Processing",
            Stage::Generation => "Audio generation",
            Stage::Quality => "Quality check",
            Stage::Complete => "Complete",
        }
    }
}

/// Position of `stage` in [`STAGES`].
pub fn compute_stage_index(stage: Stage) -> usize {
    STAGES
        .iter()
        .position(|s| *s == stage)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Completed,
    Active,
    Pending,
    Error,
}

/// Per-step rendering state for the whole pipeline.
pub fn step_states(current: Stage, has_error: bool) -> [StepState; 5] {
    let current_index = compute_stage_index(current);
    let mut states = [StepState::Pending; 5];
    for (index, state) in states.iter_mut().enumerate() {
        *state = if index < current_index {
            StepState::Completed
        } else if index == current_index {
            if has_error {
                StepState::Error
            } else {
                StepState::Active
            }
        } else {
            StepState::Pending
        };
    }
    states
}

/// Maps backend status to a stage. `None` means "keep the last active stage"
/// (terminal failure).
pub fn map_stage(
    status: PodcastStatus,
    task_type: Option<TaskType>,
    progress: u8,
) -> Option<Stage> {
    match status {
        PodcastStatus::Pending => Some(Stage::Upload),
        PodcastStatus::Processing => match task_type {
            Some(TaskType::ScriptGeneration) => Some(Stage::Processing),
            Some(TaskType::AudioGeneration) if progress >= QUALITY_PROGRESS_THRESHOLD => {
                Some(Stage::Quality)
            }
            Some(TaskType::AudioGeneration) => Some(Stage::Generation),
            None => Some(Stage::Processing),
        },
        PodcastStatus::Completed => Some(Stage::Complete),
        PodcastStatus::Failed | PodcastStatus::Cancelled => None,
    }
}

/// One-line pipeline rendering used by the CLI, e.g. `[x] Upload > [>] Processing > [ ] ...`.
pub fn render_pipeline(current: Stage, has_error: bool) -> String {
    STAGES
        .iter()
        .zip(step_states(current, has_error))
        .map(|(stage, state)| {
            let mark = match state {
                StepState::Completed => "x",
                StepState::Active => ">",
                StepState::Pending => " ",
                StepState::Error => "!",
            };
            format!("[{}] {}", mark, stage.label())
        })
        .collect::<Vec<_>>()
        .join(" > ")
}
