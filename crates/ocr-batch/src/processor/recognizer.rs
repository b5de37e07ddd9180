use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::processor::ocr::{EngineOutput, OcrEngine};

/// Bounded retry for one page: `attempts` engine calls in total, each capped
/// at `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recognized {
    pub output: EngineOutput,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RecognitionFailure {
    pub error: EngineError,
    pub attempts: u32,
}

impl fmt::Display for RecognitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.error, self.attempts)
    }
}

/// Wraps an engine with the per-page timeout and retry policy.
#[derive(Clone)]
pub struct PageRecognizer {
    engine: Arc<dyn OcrEngine>,
    policy: RetryPolicy,
}

impl PageRecognizer {
    pub fn new(engine: Arc<dyn OcrEngine>, policy: RetryPolicy) -> Self {
        Self { engine, policy }
    }

    pub fn engine(&self) -> &Arc<dyn OcrEngine> {
        &self.engine
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs the engine with the same input until it succeeds or the policy's
    /// attempts are used up.
    pub fn recognize(
        &self,
        image: Vec<u8>,
        language: &str,
    ) -> Result<Recognized, RecognitionFailure> {
        let image: Arc<[u8]> = Arc::from(image);
        let attempts = self.policy.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let started = Instant::now();
            match self.attempt(Arc::clone(&image), language) {
                Ok(mut output) => {
                    output.confidence = normalize_confidence(output.confidence);
                    debug!(
                        engine = self.engine.name(),
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "page recognized"
                    );
                    return Ok(Recognized {
                        output,
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    warn!(
                        engine = self.engine.name(),
                        attempt,
                        attempts,
                        "page recognition failed: {}",
                        error
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(RecognitionFailure {
            error: last_error
                .unwrap_or_else(|| EngineError::Failed("no attempt was made".to_string())),
            attempts,
        })
    }

    /// One engine call on a helper thread so the timeout can be enforced.
    /// A timed-out call keeps running detached until the engine returns.
    fn attempt(&self, image: Arc<[u8]>, language: &str) -> Result<EngineOutput, EngineError> {
        let (tx, rx) = bounded(1);
        let engine = Arc::clone(&self.engine);
        let language = language.to_string();

        thread::Builder::new()
            .name("ocr-page".to_string())
            .spawn(move || {
                let _ = tx.send(engine.recognize(&image, &language));
            })
            .map_err(|e| EngineError::Failed(format!("Failed to spawn engine thread: {}", e)))?;

        match rx.recv_timeout(self.policy.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(self.policy.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Failed(
                "engine terminated without a result".to_string(),
            )),
        }
    }
}

fn normalize_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
