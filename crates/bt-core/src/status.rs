use serde::{Deserialize, Serialize};

/// Execution status of a single task.
///
/// `Ignored` is sticky: a task in that state skips its own update until the
/// status is cleared from outside. `Error` is an ordinary outcome a task may
/// choose to report, not a failure of the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    None,
    Success,
    Failure,
    Running,
    Ignored,
    Error,
}

impl TaskStatus {
    pub fn is_running(self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    /// A status that ends the current run of a task.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Error
        )
    }

    /// Swaps success and failure; every other status passes through.
    pub fn invert(self) -> Self {
        match self {
            TaskStatus::Success => TaskStatus::Failure,
            TaskStatus::Failure => TaskStatus::Success,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::None => "NONE",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Ignored => "IGNORED",
            TaskStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
