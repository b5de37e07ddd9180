pub mod batch;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod storage;
pub mod summary;
pub mod worker;

pub use batch::{
    BatchDispatcher, BatchHandle, BatchJob, BatchOptions, BatchStatus, HealthStatus, UploadedFile,
};
pub use config::{load_config, Config};
pub use error::{
    ConfigError, EngineError, IsolationViolation, OcrBatchError, Result, SplitError, StorageError,
    SubmitError, SummaryError, ValidationError,
};
pub use pipeline::{FileTask, PageResult, TaskError, TaskErrorKind, TaskStatus};
pub use processor::{DocumentFormat, OcrEngine, Rasterizer};
pub use summary::{BatchSummary, FileOutcome};
