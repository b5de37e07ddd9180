pub mod dispatcher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use dispatcher::{BatchDispatcher, BatchHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
}

/// Dispatcher-side record of a submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub session_id: String,
    /// Submission order.
    pub task_ids: Vec<String>,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Media type as declared by the uploader, e.g. `application/pdf`.
    pub declared_type: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes,
            declared_type: declared_type.into(),
        }
    }
}

/// Per-batch overrides. Anything left `None` falls back to the dispatcher's
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub language: Option<String>,
    pub accuracy_threshold: Option<f64>,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub engine_available: bool,
}
