pub mod config;
pub mod progress;
pub mod runner;
pub mod task;

pub use config::PipelineConfig;
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{render_text, FileTaskRunner};
pub use task::{FileTask, PageResult, TaskArtifacts, TaskError, TaskErrorKind, TaskStatus};
