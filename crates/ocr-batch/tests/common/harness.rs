//! Test harness for isolated batch execution.
//!
//! The `TestHarness` owns a temporary data directory and builds a
//! `BatchDispatcher` wired to scripted doubles, so batches run end to end
//! without Tesseract or poppler installed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use ocr_batch::batch::{BatchDispatcher, BatchOptions, UploadedFile};
use ocr_batch::error::{EngineError, SplitError};
use ocr_batch::pipeline::PipelineConfig;
use ocr_batch::processor::{EngineOutput, OcrEngine, Rasterizer, RetryPolicy};
use ocr_batch::summary::BatchSummary;

/// OCR double keyed on the exact image bytes it receives.
///
/// Unknown inputs succeed with the default confidence. Inputs registered
/// with `fail_times` fail that many calls before succeeding.
pub struct ScriptedEngine {
    default_confidence: f64,
    confidences: HashMap<Vec<u8>, f64>,
    failures: HashMap<Vec<u8>, u32>,
    calls: Mutex<HashMap<Vec<u8>, u32>>,
    available: bool,
}

impl ScriptedEngine {
    pub fn new(default_confidence: f64) -> Self {
        Self {
            default_confidence,
            confidences: HashMap::new(),
            failures: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            available: true,
        }
    }

    pub fn confidence(mut self, image: &[u8], confidence: f64) -> Self {
        self.confidences.insert(image.to_vec(), confidence);
        self
    }

    pub fn fail_times(mut self, image: &[u8], times: u32) -> Self {
        self.failures.insert(image.to_vec(), times);
        self
    }

    pub fn fail_always(self, image: &[u8]) -> Self {
        self.fail_times(image, u32::MAX)
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Engine invocations seen for `image` so far.
    pub fn calls_for(&self, image: &[u8]) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(image)
            .copied()
            .unwrap_or(0)
    }
}

impl OcrEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&self, image: &[u8], language: &str) -> Result<EngineOutput, EngineError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(image.to_vec()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(&failures) = self.failures.get(image) {
            if call <= failures {
                return Err(EngineError::Failed(format!("scripted failure #{}", call)));
            }
        }

        let label = String::from_utf8(image.to_vec()).unwrap_or_else(|_| "image".to_string());
        Ok(EngineOutput {
            text: format!("{} [{}]", label, language),
            layout: format!("<div class='ocr_page' title='{}'></div>", label),
            confidence: self
                .confidences
                .get(image)
                .copied()
                .unwrap_or(self.default_confidence),
        })
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Engine that holds every call for `delay` and records the highest number
/// of calls in flight at once.
pub struct InFlightEngine {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl OcrEngine for InFlightEngine {
    fn name(&self) -> &str {
        "concurrency"
    }

    fn recognize(&self, _: &[u8], _: &str) -> Result<EngineOutput, EngineError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(EngineOutput {
            text: "text".to_string(),
            layout: String::new(),
            confidence: 0.9,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Rasterizer double: page `n` renders as the bytes `page-n`.
pub struct LabelRasterizer {
    failing_pages: Vec<usize>,
}

impl LabelRasterizer {
    pub fn new() -> Self {
        Self {
            failing_pages: Vec::new(),
        }
    }

    pub fn failing(pages: &[usize]) -> Self {
        Self {
            failing_pages: pages.to_vec(),
        }
    }
}

impl Rasterizer for LabelRasterizer {
    fn rasterize(&self, _: &Path, page: usize, _: u32) -> Result<Vec<u8>, SplitError> {
        if self.failing_pages.contains(&page) {
            return Err(SplitError::Rasterize {
                page,
                reason: "scripted rasterizer failure".to_string(),
            });
        }
        Ok(format!("page-{}", page).into_bytes())
    }

    fn page_count(&self, _: &Path) -> Result<usize, SplitError> {
        Err(SplitError::Corrupt("fallback page count unavailable".to_string()))
    }
}

/// Isolated environment for batch integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(&data_dir).expect("Failed to create data dir");

        Self { temp_dir, data_dir }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            data_directory: self.data_dir.clone(),
            worker_count: 2,
            language: "chi_sim+eng".to_string(),
            accuracy_threshold: 0.95,
            dpi: 72,
            max_image_side: 2400,
            page_parallelism: 2,
            retry: RetryPolicy {
                attempts: 2,
                timeout: Duration::from_secs(10),
            },
        }
    }

    pub fn dispatcher(&self, engine: Arc<ScriptedEngine>) -> BatchDispatcher {
        self.dispatcher_with(engine, LabelRasterizer::new())
    }

    pub fn dispatcher_with(
        &self,
        engine: Arc<ScriptedEngine>,
        rasterizer: LabelRasterizer,
    ) -> BatchDispatcher {
        BatchDispatcher::new(self.pipeline_config(), engine, Arc::new(rasterizer))
    }

    /// Submits and blocks until the summary is saved.
    pub fn run_batch(
        &self,
        dispatcher: &BatchDispatcher,
        session_id: &str,
        files: Vec<UploadedFile>,
    ) -> BatchSummary {
        dispatcher
            .submit_batch(session_id, files, BatchOptions::default())
            .expect("Batch was rejected")
            .wait()
            .expect("Batch did not produce a summary")
    }

    /// Every regular file under the data directory.
    pub fn all_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path, out);
                    } else {
                        out.push(path);
                    }
                }
            }
        }

        let mut files = Vec::new();
        walk(&self.data_dir, &mut files);
        files
    }
}
