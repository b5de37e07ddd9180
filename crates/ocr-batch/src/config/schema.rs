use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            data_directory: default_data_directory(),
            worker_count: default_worker_count(),
            ocr: OcrConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

fn default_data_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ocr-batch")
}

fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language codes, joined with `+` when handed to the engine.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_max_image_side")]
    pub max_image_side: u32,
    #[serde(default = "default_page_timeout_seconds")]
    pub page_timeout_seconds: u64,
    /// Total engine attempts per page, first try included.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_page_parallelism")]
    pub page_parallelism: usize,
}

fn default_languages() -> Vec<String> {
    vec!["chi_sim".to_string(), "eng".to_string()]
}

fn default_dpi() -> u32 {
    250
}

fn default_max_image_side() -> u32 {
    2400
}

fn default_page_timeout_seconds() -> u64 {
    120
}

fn default_attempts() -> u32 {
    2
}

fn default_page_parallelism() -> usize {
    2
}

impl OcrConfig {
    pub fn language_hint(&self) -> String {
        if self.languages.is_empty() {
            default_languages().join("+")
        } else {
            self.languages.join("+")
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            dpi: default_dpi(),
            max_image_side: default_max_image_side(),
            page_timeout_seconds: default_page_timeout_seconds(),
            attempts: default_attempts(),
            page_parallelism: default_page_parallelism(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_accuracy_threshold")]
    pub accuracy_threshold: f64,
}

fn default_accuracy_threshold() -> f64 {
    0.95
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold: default_accuracy_threshold(),
        }
    }
}
