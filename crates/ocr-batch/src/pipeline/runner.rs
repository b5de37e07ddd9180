use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};
use serde::Serialize;
use tracing::{debug, info_span, warn};

use crate::error::{SplitError, StorageError};
use crate::processor::{DocumentSplitter, PageRecognizer, PageSource, RasterPage, Rasterizer};
use crate::sanitize;
use crate::storage::FileStorage;

use super::progress::{NoopProgress, ProgressEvent, ProgressReporter};
use super::task::{FileTask, PageResult, TaskArtifacts, TaskError, TaskErrorKind, TaskStatus};

/// Drives one file from upload to artifacts: split, recognize every page,
/// classify, persist. Never panics on bad input; every failure ends up in
/// the returned task.
pub struct FileTaskRunner {
    recognizer: PageRecognizer,
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
    page_parallelism: usize,
    progress: Arc<dyn ProgressReporter>,
}

impl FileTaskRunner {
    pub fn new(
        recognizer: PageRecognizer,
        rasterizer: Arc<dyn Rasterizer>,
        dpi: u32,
        page_parallelism: usize,
    ) -> Self {
        Self {
            recognizer,
            rasterizer,
            dpi,
            page_parallelism: page_parallelism.max(1),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn recognizer(&self) -> &PageRecognizer {
        &self.recognizer
    }

    pub fn run(&self, mut task: FileTask, storage: &FileStorage) -> FileTask {
        let filename = sanitize::redact_path(&task.source_path);
        let _task_span = info_span!("file_task",
            task_id = %task.id,
            filename = %filename,
            session = storage.root().fingerprint(),
        )
        .entered();

        let started = Instant::now();
        task.status = TaskStatus::Running;
        self.progress.report(ProgressEvent::TaskStarted {
            task_id: task.id.clone(),
            name: task.name.clone(),
        });

        // Step 1: Split
        let source = {
            let _step = info_span!("split").entered();
            self.step_split(&task)
        };

        // Step 2+3: Recognize and classify
        match source {
            Ok(source) => {
                let _step = info_span!("recognize", page_count = source.page_count()).entered();
                task.pages = self.step_recognize(&task, source);
                task.errors
                    .extend(task.pages.iter().filter_map(|p| p.error.clone()));
                task.classify();

                if task.page_count == 0 {
                    task.fail(TaskError::file(
                        TaskErrorKind::Split,
                        "document contains no pages",
                    ));
                }
            }
            Err(e) => {
                warn!("Failed to split document: {}", e);
                task.fail(TaskError::file(TaskErrorKind::Split, e.to_string()));
            }
        }

        // Step 4: Persist
        {
            let _step = info_span!("persist").entered();
            if let Err(e) = self.step_persist(&mut task, storage) {
                warn!("Failed to persist artifacts: {}", e);
                task.fail(TaskError::file(TaskErrorKind::Storage, e.to_string()));
            }
        }

        task.duration = started.elapsed();
        debug!(
            status = %task.status,
            accuracy = task.accuracy,
            page_count = task.page_count,
            elapsed_ms = task.duration.as_millis() as u64,
            "file task finished"
        );
        self.progress.report(ProgressEvent::TaskFinished {
            task_id: task.id.clone(),
            status: task.status,
            accuracy: task.accuracy,
            duration: task.duration,
        });

        task
    }

    fn step_split(&self, task: &FileTask) -> Result<PageSource, SplitError> {
        DocumentSplitter::for_format(task.format, Arc::clone(&self.rasterizer), self.dpi)
            .split(&task.source_path)
    }

    /// Pages are rasterized lazily on this thread and recognized on up to
    /// `page_parallelism` scoped threads. Results come back in completion
    /// order and are sorted by page index before returning.
    fn step_recognize(&self, task: &FileTask, source: PageSource) -> Vec<PageResult> {
        let page_count = source.page_count();
        let workers = self.page_parallelism.min(page_count).max(1);

        let mut results: Vec<PageResult> = if workers == 1 {
            source
                .map(|page| self.recognize_page(task, page, page_count))
                .collect()
        } else {
            let (page_tx, page_rx) = bounded::<RasterPage>(workers);
            let (result_tx, result_rx) = unbounded::<PageResult>();

            thread::scope(|scope| {
                for _ in 0..workers {
                    let page_rx = page_rx.clone();
                    let result_tx = result_tx.clone();
                    scope.spawn(move || {
                        for page in page_rx.iter() {
                            let result = self.recognize_page(task, page, page_count);
                            if result_tx.send(result).is_err() {
                                break;
                            }
                        }
                    });
                }
                drop(page_rx);
                drop(result_tx);

                for page in source {
                    if page_tx.send(page).is_err() {
                        break;
                    }
                }
                drop(page_tx);

                result_rx.iter().collect()
            })
        };

        results.sort_by_key(|page| page.index);
        results
    }

    fn recognize_page(&self, task: &FileTask, page: RasterPage, page_count: usize) -> PageResult {
        let started = Instant::now();
        let index = page.index;

        let result = match page.image {
            Err(e) => PageResult::failed(
                index,
                TaskError::page(TaskErrorKind::Rasterize, index, e.to_string()),
                started.elapsed(),
                0,
            ),
            Ok(image) => match self.recognizer.recognize(image, &task.language) {
                Ok(recognized) => PageResult {
                    index,
                    text: recognized.output.text,
                    layout: recognized.output.layout,
                    confidence: recognized.output.confidence,
                    error: None,
                    duration: started.elapsed(),
                    attempts: recognized.attempts,
                },
                Err(failure) => PageResult::failed(
                    index,
                    TaskError::page(TaskErrorKind::Engine, index, failure.to_string()),
                    started.elapsed(),
                    failure.attempts,
                ),
            },
        };

        self.progress.report(ProgressEvent::PageRecognized {
            task_id: task.id.clone(),
            page: index,
            page_count,
            ok: result.is_ok(),
        });

        result
    }

    fn step_persist(&self, task: &mut FileTask, storage: &FileStorage) -> Result<(), StorageError> {
        let stored_name = task
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| task.id.clone());

        let text = render_text(&task.pages);
        let text_path = storage.write_output(
            &task.batch_id,
            &format!("{}.txt", stored_name),
            text.as_bytes(),
        )?;

        let layout_name = format!("{}.layout.json", stored_name);
        let layout = render_layout(task).map_err(|e| StorageError::Serialize {
            path: layout_name.clone().into(),
            source: e,
        })?;
        let layout_path = storage.write_output(&task.batch_id, &layout_name, &layout)?;

        task.artifacts = Some(TaskArtifacts {
            text_path,
            layout_path,
        });
        Ok(())
    }
}

/// Concatenated page text, each page introduced by `=== [PAGE n] ===` and
/// followed by a blank line. Failed pages keep their marker.
pub fn render_text(pages: &[PageResult]) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut markers = Vec::with_capacity(pages.len());
    for page in pages {
        markers.push(format!("=== [PAGE {}] ===", page.index));
    }

    for (page, marker) in pages.iter().zip(&markers) {
        lines.push(marker);
        let text = page.text.trim_end();
        if !text.is_empty() {
            lines.push(text);
        }
        lines.push("");
    }

    lines.join("\n")
}

#[derive(Serialize)]
struct LayoutDocument<'a> {
    file: &'a str,
    pages: Vec<LayoutPage<'a>>,
}

#[derive(Serialize)]
struct LayoutPage<'a> {
    page: usize,
    confidence: f64,
    error: Option<String>,
    layout: &'a str,
}

fn render_layout(task: &FileTask) -> Result<Vec<u8>, serde_json::Error> {
    let document = LayoutDocument {
        file: &task.name,
        pages: task
            .pages
            .iter()
            .map(|page| LayoutPage {
                page: page.index,
                confidence: page.confidence,
                error: page.error.as_ref().map(|e| e.to_string()),
                layout: &page.layout,
            })
            .collect(),
    };
    serde_json::to_vec_pretty(&document)
}
