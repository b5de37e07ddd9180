use std::sync::Arc;

use crate::pipeline::{FileTask, TaskError, TaskErrorKind};
use crate::storage::FileStorage;

/// One file task queued on the pool, tagged with its submission position
/// so results can be put back in order.
#[derive(Debug)]
pub struct Job {
    pub position: usize,
    pub task: FileTask,
    pub storage: Arc<FileStorage>,
}

impl Job {
    pub fn new(position: usize, task: FileTask, storage: Arc<FileStorage>) -> Self {
        Self {
            position,
            task,
            storage,
        }
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub position: usize,
    pub task: FileTask,
}

impl JobResult {
    pub fn completed(position: usize, task: FileTask) -> Self {
        Self { position, task }
    }

    /// The runner never returned; `task` is the copy taken before it started.
    pub fn crashed(position: usize, mut task: FileTask, reason: &str) -> Self {
        task.fail(TaskError::file(TaskErrorKind::Worker, reason));
        Self { position, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TaskStatus;
    use crate::processor::DocumentFormat;
    use std::path::PathBuf;

    fn task() -> FileTask {
        FileTask::new(
            "b1",
            "scan.png",
            "image/png",
            DocumentFormat::Image,
            PathBuf::from("/data/scan.png"),
            "eng",
            0.95,
        )
    }

    #[test]
    fn test_job_result_completed() {
        let result = JobResult::completed(3, task());
        assert_eq!(result.position, 3);
        assert_eq!(result.task.status, TaskStatus::Queued);
    }

    #[test]
    fn test_job_result_crashed() {
        let result = JobResult::crashed(0, task(), "runner panicked: boom");

        assert_eq!(result.task.status, TaskStatus::Failed);
        assert_eq!(result.task.errors.len(), 1);
        assert_eq!(result.task.errors[0].kind, TaskErrorKind::Worker);
        assert!(result.task.errors[0].message.contains("boom"));
    }
}
