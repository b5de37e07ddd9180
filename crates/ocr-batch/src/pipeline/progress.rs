use std::time::Duration;

use log::info;

use super::task::TaskStatus;

/// Events emitted by the runner while a file is processed.
/// Recognized text is never included.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    TaskStarted {
        task_id: String,
        name: String,
    },
    PageRecognized {
        task_id: String,
        page: usize,
        page_count: usize,
        ok: bool,
    },
    TaskFinished {
        task_id: String,
        status: TaskStatus,
        accuracy: f64,
        duration: Duration,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and library callers that do not care.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes one log line per event; used by the command-line runner.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::TaskStarted { name, .. } => info!("[START] {}", name),
            ProgressEvent::PageRecognized {
                page,
                page_count,
                ok,
                ..
            } => info!(
                "  page {}/{} {}",
                page,
                page_count,
                if ok { "ok" } else { "failed" }
            ),
            ProgressEvent::TaskFinished {
                status,
                accuracy,
                duration,
                ..
            } => info!(
                "[DONE] status={} accuracy={:.4} elapsed={:.2}s",
                status,
                accuracy,
                duration.as_secs_f64()
            ),
        }
    }
}
