use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::processor::RetryPolicy;

/// Runtime settings resolved once from the loaded [`Config`]. Nothing here
/// changes after the dispatcher is built.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_directory: PathBuf,
    pub worker_count: usize,
    pub language: String,
    pub accuracy_threshold: f64,
    pub dpi: u32,
    pub max_image_side: u32,
    pub page_parallelism: usize,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_directory: config.data_directory.clone(),
            worker_count: config.worker_count.max(1),
            language: config.ocr.language_hint(),
            accuracy_threshold: config.defaults.accuracy_threshold,
            dpi: config.ocr.dpi,
            max_image_side: config.ocr.max_image_side,
            page_parallelism: config.ocr.page_parallelism.max(1),
            retry: RetryPolicy {
                attempts: config.ocr.attempts.max(1),
                timeout: Duration::from_secs(config.ocr.page_timeout_seconds),
            },
        }
    }
}
