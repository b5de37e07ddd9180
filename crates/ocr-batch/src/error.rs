use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrBatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Isolation violation: {0}")]
    Isolation(#[from] IsolationViolation),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Batch rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Summary unavailable: {0}")]
    Summary(#[from] SummaryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Rejected input. Raised before any upload is written or any task runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Batch contains no files")]
    EmptyBatch,

    #[error("Session identifier must not be empty")]
    EmptySession,

    #[error("Unsupported declared type '{declared_type}' for file '{name}'")]
    UnsupportedType { name: String, declared_type: String },

    #[error("Invalid file name '{0}'")]
    InvalidFileName(String),

    #[error("Invalid option '{option}': {reason}")]
    InvalidOption { option: &'static str, reason: String },
}

/// A document could not be split into pages, or one page could not be rasterized.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable document: {0}")]
    Corrupt(String),

    #[error("Failed to rasterize page {page}: {reason}")]
    Rasterize { page: usize, reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("OCR engine failed: {0}")]
    Failed(String),

    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Path '{path}' escapes session root '{root}'")]
pub struct IsolationViolation {
    pub path: PathBuf,
    pub root: PathBuf,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize '{path}': {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error(transparent)]
    Isolation(#[from] IsolationViolation),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed")]
    ChannelClosed,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors surfaced synchronously by `submit_batch`.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Isolation(#[from] IsolationViolation),

    #[error("Failed to start batch coordinator: {0}")]
    Spawn(String),
}

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("No summary recorded for this session yet")]
    NotFound,

    #[error("Batch coordinator stopped before the summary was saved")]
    Interrupted,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Summary file '{path}' is unreadable: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<IsolationViolation> for SummaryError {
    fn from(err: IsolationViolation) -> Self {
        SummaryError::Storage(StorageError::Isolation(err))
    }
}

pub type Result<T> = std::result::Result<T, OcrBatchError>;
