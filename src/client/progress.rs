use crate::task::{Stage, Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Active,
    Done,
}

impl StepState {
    fn marker(self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::Active => "[>]",
            Self::Done => "[x]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStep {
    pub key: &'static str,
    pub title: &'static str,
    pub progress: u8,
    pub state: StepState,
}

/// The four-step indicator shown while a task runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBoard {
    pub steps: [StageStep; 4],
    pub overall: u8,
}

const STEPS: [(&str, &str); 4] = [
    ("prepare", "prepare files"),
    ("segment", "segment documents"),
    ("embedding", "generate embeddings"),
    ("complete", "complete"),
];

impl StageBoard {
    pub fn from_task(task: &Task) -> Self {
        let finished = task.stage == Stage::Finished || task.status == TaskStatus::Completed;
        let reached = if finished {
            4
        } else {
            match task.stage {
                Stage::Preparing => 0,
                Stage::Segmenting => 1,
                Stage::Embedding => 2,
                Stage::Finished => 4,
            }
        };
        let active_progress = match task.stage {
            Stage::Segmenting => task.segment_progress,
            Stage::Embedding => task.embedding_progress,
            _ => 0,
        };
        let steps = std::array::from_fn(|index| {
            let (key, title) = STEPS[index];
            let (state, progress) = if index < reached {
                (StepState::Done, 100)
            } else if index == reached && task.status == TaskStatus::Running {
                (StepState::Active, active_progress.min(100))
            } else {
                (StepState::Pending, 0)
            };
            StageStep {
                key,
                title,
                progress,
                state,
            }
        });
        Self {
            steps,
            overall: if finished { 100 } else { task.progress.min(100) },
        }
    }

    pub fn active(&self) -> Option<&StageStep> {
        self.steps.iter().find(|step| step.state == StepState::Active)
    }

    pub fn render(&self) -> String {
        let mut out = format!("overall {:>3}%", self.overall);
        for step in &self.steps {
            out.push_str(&format!(
                "\n  {} {:<20} {:>3}%",
                step.state.marker(),
                step.title,
                step.progress
            ));
        }
        out
    }
}
