use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

use ocr_batch::batch::{BatchDispatcher, BatchOptions};
use ocr_batch::config::{load_config, Config};
use ocr_batch::error::SummaryError;
use ocr_batch::pipeline::LogProgress;
use ocr_batch::sanitize::session_fingerprint;

use crate::inputs::{collect_inputs, to_upload};

const DEFAULT_CONFIG_FILE: &str = "ocr-batch.json";

#[derive(Parser, Debug)]
#[command(name = "ocr-batch", version)]
#[command(about = "Batch OCR for scanned PDFs and images, isolated per session")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config JSON. If omitted, uses ./ocr-batch.json if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (trace/debug/info/warn/error).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recognize every supported file under INPUT and save a session summary.
    Run {
        #[arg(long)]
        session: String,
        /// Tesseract language hint, e.g. chi_sim+eng.
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        workers: Option<usize>,
        /// Descend into subdirectories.
        #[arg(long)]
        recursive: bool,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print the latest summary of a session as JSON.
    Summary {
        #[arg(long)]
        session: String,
    },
    /// Report whether the OCR engine can be used.
    Health,
}

pub fn dispatch(args: Args) -> Result<ExitCode> {
    init_logging(&args)?;

    let config = resolve_config(args.config.as_deref())?;
    let dispatcher = BatchDispatcher::from_config(&config).with_progress(Arc::new(LogProgress));

    match args.cmd {
        Command::Run {
            session,
            lang,
            threshold,
            workers,
            recursive,
            inputs,
        } => {
            let options = BatchOptions {
                language: lang,
                accuracy_threshold: threshold,
                workers,
            };
            run(&dispatcher, &session, options, &inputs, recursive)
        }
        Command::Summary { session } => summary(&dispatcher, &session),
        Command::Health => health(&dispatcher),
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let stderr_layer = if args.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer);

    tracing_log::LogTracer::init().map_err(|e| anyhow!("failed to bridge log records: {e}"))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

fn resolve_config(user: Option<&Path>) -> Result<Config> {
    let path = match user {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    if !path.exists() {
        if user.is_some() {
            warn!("Config file {} not found, using defaults", path.display());
        }
        return Ok(Config::default());
    }

    load_config(&path).with_context(|| format!("load config: {}", path.display()))
}

fn run(
    dispatcher: &BatchDispatcher,
    session: &str,
    options: BatchOptions,
    inputs: &[PathBuf],
    recursive: bool,
) -> Result<ExitCode> {
    let files = collect_inputs(inputs, recursive);
    if files.is_empty() {
        eprintln!("No supported input files found");
        return Ok(ExitCode::from(2));
    }

    let uploads = files
        .iter()
        .map(|path| to_upload(path))
        .collect::<Result<Vec<_>>>()?;

    info!(
        session = %session_fingerprint(session),
        files = uploads.len(),
        "Submitting batch"
    );

    let summary = dispatcher
        .run_batch(session, uploads, options)
        .context("run batch")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "batch_id": summary.batch_id,
            "total": summary.counts.total,
            "succeeded": summary.counts.succeeded,
            "partial": summary.counts.partial,
            "failed": summary.counts.failed,
            "aggregate_accuracy": summary.aggregate_accuracy,
            "duration_seconds": summary.duration_seconds,
        }))?
    );

    if summary.any_failed() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn summary(dispatcher: &BatchDispatcher, session: &str) -> Result<ExitCode> {
    match dispatcher.get_summary(session) {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(SummaryError::NotFound) => {
            eprintln!("No summary recorded for this session");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e).context("load summary"),
    }
}

fn health(dispatcher: &BatchDispatcher) -> Result<ExitCode> {
    let status = dispatcher.health_check();
    println!("{}", serde_json::to_string(&status)?);

    if status.engine_available {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}
