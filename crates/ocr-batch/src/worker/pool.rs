use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::FileTaskRunner;
use crate::worker::job::{Job, JobResult};

/// Fixed set of OS threads pulling jobs off a shared FIFO queue. Each
/// worker runs one file to completion before taking the next.
pub struct WorkerPool {
    job_sender: Sender<Job>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(runner: Arc<FileTaskRunner>, worker_count: usize) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = unbounded::<Job>();
        let (result_sender, result_receiver) = unbounded::<JobResult>();

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let worker_runner = Arc::clone(&runner);

            let handle = thread::Builder::new()
                .name(format!("ocr-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, job_rx, result_tx, worker_runner))
                .map_err(WorkerError::Spawn)?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Blocks for the next finished job; `None` once every worker is gone.
    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    /// Closes the queue and joins the workers. Jobs already queued still run.
    pub fn wait(self) {
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {}", i, panic_message(e.as_ref()));
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    result_sender: Sender<JobResult>,
    runner: Arc<FileTaskRunner>,
) {
    debug!("Worker {} started", worker_id);

    for job in job_receiver.iter() {
        let Job {
            position,
            task,
            storage,
        } = job;
        debug!("Worker {} processing task {}", worker_id, task.id);

        let fallback = task.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.run(task, &storage)));

        let result = match outcome {
            Ok(task) => JobResult::completed(position, task),
            Err(payload) => {
                let reason = format!("runner panicked: {}", panic_message(payload.as_ref()));
                error!("Worker {} {}", worker_id, reason);
                JobResult::crashed(position, fallback, &reason)
            }
        };

        if let Err(e) = result_sender.send(result) {
            error!("Worker {} failed to send result: {}", worker_id, e);
            break;
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
