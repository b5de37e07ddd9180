//! Batch summaries: what each file in the most recent completed batch came
//! out as, and the store that keeps one per session.

pub mod store;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{FileTask, TaskError, TaskStatus};

pub use store::SummaryStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub session_id: String,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub language: String,
    pub accuracy_threshold: f64,
    /// Submission order.
    pub files: Vec<FileOutcome>,
    /// Mean file accuracy over succeeded and partial files; 0 when there are none.
    pub aggregate_accuracy: f64,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub task_id: String,
    pub name: String,
    pub status: TaskStatus,
    pub accuracy: f64,
    pub meets_threshold: bool,
    pub duration_seconds: f64,
    pub page_count: usize,
    pub errors: Vec<TaskError>,
    pub text_path: Option<PathBuf>,
    pub layout_path: Option<PathBuf>,
    pub mean_page_duration_seconds: Option<f64>,
    pub pages: Vec<PageOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    pub page: usize,
    pub confidence: f64,
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub attempts: u32,
}

impl FileOutcome {
    pub fn from_task(task: &FileTask) -> Self {
        let pages: Vec<PageOutcome> = task
            .pages
            .iter()
            .map(|page| PageOutcome {
                page: page.index,
                confidence: page.confidence,
                error: page.error.as_ref().map(|e| e.to_string()),
                duration_seconds: page.duration.as_secs_f64(),
                attempts: page.attempts,
            })
            .collect();

        let mean_page_duration_seconds = if pages.is_empty() {
            None
        } else {
            Some(pages.iter().map(|p| p.duration_seconds).sum::<f64>() / pages.len() as f64)
        };

        let (text_path, layout_path) = match &task.artifacts {
            Some(artifacts) => (
                Some(artifacts.text_path.clone()),
                Some(artifacts.layout_path.clone()),
            ),
            None => (None, None),
        };

        Self {
            task_id: task.id.clone(),
            name: task.name.clone(),
            status: task.status,
            accuracy: task.accuracy,
            meets_threshold: task.meets_threshold(),
            duration_seconds: task.duration.as_secs_f64(),
            page_count: task.page_count,
            errors: task.errors.clone(),
            text_path,
            layout_path,
            mean_page_duration_seconds,
            pages,
        }
    }
}

impl BatchSummary {
    /// Builds the summary for a finished batch. `tasks` must already be in
    /// submission order and all terminal.
    pub fn from_tasks(
        session_id: &str,
        batch_id: &str,
        created_at: DateTime<Utc>,
        language: &str,
        accuracy_threshold: f64,
        tasks: &[FileTask],
    ) -> Self {
        let files: Vec<FileOutcome> = tasks.iter().map(FileOutcome::from_task).collect();

        let mut counts = StatusCounts {
            total: files.len(),
            ..StatusCounts::default()
        };
        for file in &files {
            match file.status {
                TaskStatus::Succeeded => counts.succeeded += 1,
                TaskStatus::Partial => counts.partial += 1,
                _ => counts.failed += 1,
            }
        }

        let scored: Vec<f64> = files
            .iter()
            .filter(|f| matches!(f.status, TaskStatus::Succeeded | TaskStatus::Partial))
            .map(|f| f.accuracy)
            .collect();
        let aggregate_accuracy = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - created_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Self {
            session_id: session_id.to_string(),
            batch_id: batch_id.to_string(),
            created_at,
            completed_at,
            duration_seconds,
            language: language.to_string(),
            accuracy_threshold,
            files,
            aggregate_accuracy,
            counts,
        }
    }

    pub fn any_failed(&self) -> bool {
        self.counts.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::pipeline::{PageResult, TaskErrorKind};
    use crate::processor::DocumentFormat;

    fn task(name: &str, confidences: &[Option<f64>]) -> FileTask {
        let mut task = FileTask::new(
            "b1",
            name,
            "application/pdf",
            DocumentFormat::Pdf,
            PathBuf::from(format!("/data/{}", name)),
            "eng",
            0.95,
        );
        task.pages = confidences
            .iter()
            .enumerate()
            .map(|(i, c)| match c {
                Some(confidence) => PageResult {
                    index: i + 1,
                    text: String::new(),
                    layout: String::new(),
                    confidence: *confidence,
                    error: None,
                    duration: Duration::from_millis(100),
                    attempts: 1,
                },
                None => PageResult::failed(
                    i + 1,
                    TaskError::page(TaskErrorKind::Engine, i + 1, "crash"),
                    Duration::from_millis(300),
                    2,
                ),
            })
            .collect();
        task.classify();
        task
    }

    #[test]
    fn test_summary_keeps_submission_order_and_counts() {
        let tasks = vec![
            task("a.pdf", &[Some(0.9), Some(0.8)]),
            task("b.pdf", &[None]),
            task("c.pdf", &[Some(0.6), None]),
        ];

        let summary = BatchSummary::from_tasks("s1", "b1", Utc::now(), "eng", 0.95, &tasks);

        let names: Vec<&str> = summary.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(
            summary.counts,
            StatusCounts {
                total: 3,
                succeeded: 1,
                partial: 1,
                failed: 1
            }
        );
        // (0.85 + 0.6) / 2; the failed file is left out.
        assert!((summary.aggregate_accuracy - 0.725).abs() < 1e-9);
        assert!(summary.any_failed());
    }

    #[test]
    fn test_aggregate_is_zero_without_scored_files() {
        let tasks = vec![task("a.pdf", &[None])];
        let summary = BatchSummary::from_tasks("s1", "b1", Utc::now(), "eng", 0.95, &tasks);
        assert_eq!(summary.aggregate_accuracy, 0.0);
    }

    #[test]
    fn test_file_outcome_page_outline() {
        let outcome = FileOutcome::from_task(&task("a.pdf", &[Some(0.9), None]));

        assert_eq!(outcome.pages.len(), 2);
        assert_eq!(outcome.pages[1].attempts, 2);
        assert!(outcome.pages[1].error.is_some());
        let mean = outcome.mean_page_duration_seconds.unwrap();
        assert!((mean - 0.2).abs() < 1e-9);
        assert!(!outcome.meets_threshold);
    }

    #[test]
    fn test_summary_json_roundtrip() {
        let tasks = vec![task("a.pdf", &[Some(0.97)])];
        let summary = BatchSummary::from_tasks("s1", "b1", Utc::now(), "eng", 0.95, &tasks);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"status\":\"succeeded\""));
        let back: BatchSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch_id, summary.batch_id);
        assert_eq!(back.created_at, summary.created_at);
        assert_eq!(back.counts, summary.counts);
        assert_eq!(back.files[0].status, TaskStatus::Succeeded);
    }
}
