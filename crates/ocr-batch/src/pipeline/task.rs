use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::processor::DocumentFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Partial,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Partial)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Partial => "partial",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskErrorKind {
    /// The document could not be opened or paged at all.
    Split,
    Rasterize,
    Engine,
    Storage,
    /// The runner itself died; nothing else is known.
    Worker,
}

/// Why a file, or one of its pages, did not come out clean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    pub message: String,
}

impl TaskError {
    pub fn file(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            page: None,
            message: message.into(),
        }
    }

    pub fn page(kind: TaskErrorKind, page: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            page: Some(page),
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TaskErrorKind::Split => "split",
            TaskErrorKind::Rasterize => "rasterize",
            TaskErrorKind::Engine => "engine",
            TaskErrorKind::Storage => "storage",
            TaskErrorKind::Worker => "worker",
        };
        match self.page {
            Some(page) => write!(f, "{} error on page {}: {}", kind, page, self.message),
            None => write!(f, "{} error: {}", kind, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// 1-based.
    pub index: usize,
    pub text: String,
    pub layout: String,
    pub confidence: f64,
    pub error: Option<TaskError>,
    pub duration: Duration,
    pub attempts: u32,
}

impl PageResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn failed(index: usize, error: TaskError, duration: Duration, attempts: u32) -> Self {
        Self {
            index,
            text: String::new(),
            layout: String::new(),
            confidence: 0.0,
            error: Some(error),
            duration,
            attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskArtifacts {
    pub text_path: PathBuf,
    pub layout_path: PathBuf,
}

/// One uploaded file moving through the pipeline. Owned by exactly one
/// runner until it reaches a terminal status.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub id: String,
    pub batch_id: String,
    /// Name as supplied by the uploader.
    pub name: String,
    pub declared_type: String,
    pub format: DocumentFormat,
    /// Stored upload inside the session root.
    pub source_path: PathBuf,
    pub language: String,
    pub accuracy_threshold: f64,
    pub status: TaskStatus,
    pub page_count: usize,
    pub duration: Duration,
    pub pages: Vec<PageResult>,
    pub errors: Vec<TaskError>,
    pub accuracy: f64,
    pub artifacts: Option<TaskArtifacts>,
}

impl FileTask {
    pub fn new(
        batch_id: &str,
        name: &str,
        declared_type: &str,
        format: DocumentFormat,
        source_path: PathBuf,
        language: &str,
        accuracy_threshold: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            batch_id: batch_id.to_string(),
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            format,
            source_path,
            language: language.to_string(),
            accuracy_threshold,
            status: TaskStatus::Queued,
            page_count: 0,
            duration: Duration::ZERO,
            pages: Vec::new(),
            errors: Vec::new(),
            accuracy: 0.0,
            artifacts: None,
        }
    }

    /// Terminal failure with a single descriptor and no pages.
    pub fn fail(&mut self, error: TaskError) {
        self.status = TaskStatus::Failed;
        self.page_count = 0;
        self.pages.clear();
        self.accuracy = 0.0;
        self.errors.push(error);
    }

    /// Derives accuracy and status from the recorded pages.
    pub fn classify(&mut self) {
        self.page_count = self.pages.len();

        let clean: Vec<f64> = self
            .pages
            .iter()
            .filter(|p| p.is_ok())
            .map(|p| p.confidence)
            .collect();

        self.accuracy = if clean.is_empty() {
            0.0
        } else {
            clean.iter().sum::<f64>() / clean.len() as f64
        };

        self.status = if clean.is_empty() {
            TaskStatus::Failed
        } else if clean.len() == self.pages.len() {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Partial
        };
    }

    /// Informational only; never affects `status`.
    pub fn meets_threshold(&self) -> bool {
        self.status != TaskStatus::Failed && self.accuracy >= self.accuracy_threshold
    }
}
