use std::path::{Component, Path};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, warn};

use crate::config::Config;
use crate::error::{SubmitError, SummaryError, ValidationError};
use crate::pipeline::{
    FileTask, FileTaskRunner, NoopProgress, PipelineConfig, ProgressReporter, TaskError,
    TaskErrorKind,
};
use crate::processor::{
    DocumentFormat, OcrEngine, PageRecognizer, PopplerRasterizer, Rasterizer, TesseractEngine,
};
use crate::storage::{contained_join, FileStorage, SessionRoots};
use crate::summary::{BatchSummary, SummaryStore};
use crate::worker::{Job, JobResult, WorkerPool};

use super::{BatchJob, BatchOptions, BatchStatus, HealthStatus, UploadedFile};

/// Entry point for batch OCR: validates and stores uploads, runs every file
/// on a bounded worker pool and persists the session's summary.
pub struct BatchDispatcher {
    config: PipelineConfig,
    roots: SessionRoots,
    summaries: SummaryStore,
    rasterizer: Arc<dyn Rasterizer>,
    runner: Arc<FileTaskRunner>,
}

impl BatchDispatcher {
    /// Production constructor: Tesseract engine and poppler rasterizer.
    pub fn from_config(config: &Config) -> Self {
        let pipeline = PipelineConfig::from_config(config);
        let engine = Arc::new(TesseractEngine::new(
            &pipeline.language,
            pipeline.dpi,
            pipeline.max_image_side,
        ));
        Self::new(pipeline, engine, Arc::new(PopplerRasterizer::new()))
    }

    pub fn new(
        config: PipelineConfig,
        engine: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let roots = SessionRoots::new(&config.data_directory);
        let recognizer = PageRecognizer::new(engine, config.retry);
        let runner = Arc::new(build_runner(
            &config,
            recognizer,
            Arc::clone(&rasterizer),
            Arc::new(NoopProgress),
        ));

        Self {
            summaries: SummaryStore::new(roots.clone()),
            config,
            roots,
            rasterizer,
            runner,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        let recognizer = self.runner.recognizer().clone();
        self.runner = Arc::new(build_runner(
            &self.config,
            recognizer,
            Arc::clone(&self.rasterizer),
            progress,
        ));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validates the whole request before touching disk, stores the uploads
    /// and starts the batch in the background. Only validation and isolation
    /// problems are returned here; everything else ends up in the summary.
    pub fn submit_batch(
        &self,
        session_id: &str,
        files: Vec<UploadedFile>,
        options: BatchOptions,
    ) -> Result<BatchHandle, SubmitError> {
        let root = self.roots.resolve(session_id)?;
        if files.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let settings = self.resolve_options(&options, files.len())?;

        let batch_id = uuid::Uuid::new_v4().to_string();
        let uploads_dir = root.uploads_dir(&batch_id)?;

        let mut formats = Vec::with_capacity(files.len());
        for file in &files {
            let format = DocumentFormat::from_declared_type(&file.declared_type).ok_or_else(|| {
                ValidationError::UnsupportedType {
                    name: file.name.clone(),
                    declared_type: file.declared_type.clone(),
                }
            })?;
            check_upload_name(&uploads_dir, &file.name)?;
            formats.push(format);
        }

        let storage = Arc::new(FileStorage::new(root));
        let created_at = Utc::now();

        let tasks: Vec<FileTask> = files
            .into_iter()
            .zip(formats)
            .map(|(file, format)| {
                let stored = storage.store_upload(&batch_id, &file.name, &file.bytes);
                let source_path = match &stored {
                    Ok(path) => path.clone(),
                    Err(_) => uploads_dir.join(&file.name),
                };

                let mut task = FileTask::new(
                    &batch_id,
                    &file.name,
                    &file.declared_type,
                    format,
                    source_path,
                    &settings.language,
                    settings.accuracy_threshold,
                );
                if let Err(e) = stored {
                    warn!("Failed to store upload for task {}: {}", task.id, e);
                    task.fail(TaskError::file(TaskErrorKind::Storage, e.to_string()));
                }
                task
            })
            .collect();

        let job = Arc::new(Mutex::new(BatchJob {
            id: batch_id.clone(),
            session_id: session_id.to_string(),
            task_ids: tasks.iter().map(|t| t.id.clone()).collect(),
            status: BatchStatus::Pending,
            created_at,
        }));

        info!(
            "Accepted batch {} with {} file(s) for session {}",
            batch_id,
            tasks.len(),
            storage.root().fingerprint()
        );

        let (done_tx, done_rx) = bounded(1);
        let coordinator = Coordinator {
            job: Arc::clone(&job),
            runner: Arc::clone(&self.runner),
            summaries: self.summaries.clone(),
            storage,
            tasks,
            settings,
            created_at,
        };

        thread::Builder::new()
            .name(format!("ocr-batch-{}", &batch_id[..8]))
            .spawn(move || coordinator.run(done_tx))
            .map_err(|e| SubmitError::Spawn(e.to_string()))?;

        Ok(BatchHandle { job, done: done_rx })
    }

    /// Submits and blocks until the batch's summary is saved.
    pub fn run_batch(
        &self,
        session_id: &str,
        files: Vec<UploadedFile>,
        options: BatchOptions,
    ) -> crate::Result<BatchSummary> {
        let handle = self.submit_batch(session_id, files, options)?;
        Ok(handle.wait()?)
    }

    /// Latest completed batch for the session.
    pub fn get_summary(&self, session_id: &str) -> Result<BatchSummary, SummaryError> {
        self.summaries.load(session_id)
    }

    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            engine_available: self.runner.recognizer().engine().is_available(),
        }
    }

    fn resolve_options(
        &self,
        options: &BatchOptions,
        file_count: usize,
    ) -> Result<BatchSettings, ValidationError> {
        let language = match &options.language {
            Some(language) if language.trim().is_empty() => {
                return Err(ValidationError::InvalidOption {
                    option: "language",
                    reason: "must not be empty".to_string(),
                });
            }
            Some(language) => language.trim().to_string(),
            None => self.config.language.clone(),
        };

        let accuracy_threshold = options
            .accuracy_threshold
            .unwrap_or(self.config.accuracy_threshold);
        if !(0.0..=1.0).contains(&accuracy_threshold) {
            return Err(ValidationError::InvalidOption {
                option: "accuracy_threshold",
                reason: format!("{} is outside [0, 1]", accuracy_threshold),
            });
        }

        let workers = match options.workers {
            Some(0) => {
                return Err(ValidationError::InvalidOption {
                    option: "workers",
                    reason: "must be at least 1".to_string(),
                });
            }
            Some(workers) => workers,
            None => self.config.worker_count,
        };

        Ok(BatchSettings {
            language,
            accuracy_threshold,
            workers: workers.min(file_count).max(1),
        })
    }
}

fn build_runner(
    config: &PipelineConfig,
    recognizer: PageRecognizer,
    rasterizer: Arc<dyn Rasterizer>,
    progress: Arc<dyn ProgressReporter>,
) -> FileTaskRunner {
    FileTaskRunner::new(recognizer, rasterizer, config.dpi, config.page_parallelism)
        .with_progress(progress)
}

/// Upload names must be a single plain file name. Anything that walks out
/// of the uploads directory is an isolation violation; anything else odd
/// (empty, nested, `.`) is a validation error.
fn check_upload_name(uploads_dir: &Path, name: &str) -> Result<(), SubmitError> {
    contained_join(uploads_dir, Path::new(name))?;

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ValidationError::InvalidFileName(name.to_string()).into()),
    }
}

#[derive(Debug, Clone)]
struct BatchSettings {
    language: String,
    accuracy_threshold: f64,
    workers: usize,
}

/// Owns a batch from acceptance to the saved summary.
struct Coordinator {
    job: Arc<Mutex<BatchJob>>,
    runner: Arc<FileTaskRunner>,
    summaries: SummaryStore,
    storage: Arc<FileStorage>,
    tasks: Vec<FileTask>,
    settings: BatchSettings,
    created_at: DateTime<Utc>,
}

impl Coordinator {
    fn run(self, done: Sender<Result<BatchSummary, SummaryError>>) {
        let batch_id = lock(&self.job).id.clone();
        lock(&self.job).status = BatchStatus::Running;

        let tasks = self.run_tasks();

        let summary = BatchSummary::from_tasks(
            &lock(&self.job).session_id,
            &batch_id,
            self.created_at,
            &self.settings.language,
            self.settings.accuracy_threshold,
            &tasks,
        );

        let result = match self.summaries.save(&summary) {
            Ok(_) => Ok(summary),
            Err(e) => {
                error!("Failed to save summary for batch {}: {}", batch_id, e);
                Err(e)
            }
        };

        lock(&self.job).status = BatchStatus::Completed;
        info!("Batch {} completed", batch_id);

        // Nobody may be waiting on the handle.
        let _ = done.send(result);
    }

    /// Runs every queued task on the pool and returns all tasks, terminal,
    /// in submission order.
    fn run_tasks(&self) -> Vec<FileTask> {
        let mut slots: Vec<Option<FileTask>> = self
            .tasks
            .iter()
            .map(|t| t.status.is_terminal().then(|| t.clone()))
            .collect();
        let pending: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i)
            .collect();

        if !pending.is_empty() {
            let workers = self.settings.workers.min(pending.len());
            match WorkerPool::new(Arc::clone(&self.runner), workers) {
                Ok(pool) => {
                    let mut submitted = 0;
                    for &position in &pending {
                        let job = Job::new(
                            position,
                            self.tasks[position].clone(),
                            Arc::clone(&self.storage),
                        );
                        match pool.submit(job) {
                            Ok(()) => submitted += 1,
                            Err(e) => {
                                error!("Failed to queue task at position {}: {}", position, e);
                                break;
                            }
                        }
                    }

                    for _ in 0..submitted {
                        match pool.recv_result() {
                            Some(result) => slots[result.position] = Some(result.task),
                            None => break,
                        }
                    }
                    pool.wait();
                }
                Err(e) => error!("Failed to start worker pool: {}", e),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.unwrap_or_else(|| {
                    JobResult::crashed(
                        position,
                        self.tasks[position].clone(),
                        "worker stopped before reporting a result",
                    )
                    .task
                })
            })
            .collect()
    }
}

fn lock(job: &Mutex<BatchJob>) -> MutexGuard<'_, BatchJob> {
    job.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returned by [`BatchDispatcher::submit_batch`].
pub struct BatchHandle {
    job: Arc<Mutex<BatchJob>>,
    done: Receiver<Result<BatchSummary, SummaryError>>,
}

impl BatchHandle {
    /// Snapshot of the batch record; `status` moves as the batch runs.
    pub fn job(&self) -> BatchJob {
        lock(&self.job).clone()
    }

    /// Blocks until every file is terminal and the summary is saved.
    pub fn wait(self) -> Result<BatchSummary, SummaryError> {
        self.done.recv().unwrap_or(Err(SummaryError::Interrupted))
    }
}
