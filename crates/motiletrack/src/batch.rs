//! Batch orchestration over many image stacks.
//!
//! The runner walks a [`StackSource`], processes each stack through the
//! pipeline and writes one `tracks_<name>.csv` per stack into the output
//! directory. Presence of that file is the resume marker: an interrupted
//! batch rerun with the same output directory skips finished images instead
//! of recomputing them. A failure on one image marks it failed and moves on;
//! only configuration and output-directory problems abort the whole run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::pipeline::process_stack;
use crate::stack::FrameStack;

/// Provider of the image stacks of one batch.
///
/// Splitting enumeration from loading keeps at most one decoded stack in
/// memory at a time.
pub trait StackSource {
    /// Stable names of the available stacks, in processing order. The name
    /// becomes the `tracks_<name>.csv` file stem.
    fn entries(&self) -> Vec<String>;

    /// Load one stack by name.
    fn load(&self, name: &str) -> Result<FrameStack, TrackingError>;
}

/// Processing state of one image in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// Not reached before the run ended (cancellation).
    Pending,
    /// Currently being loaded and tracked.
    Processing,
    /// Processed and its table written in this run.
    Completed,
    /// Output already existed; left untouched.
    Skipped,
    /// Processing or writing failed; see the log for the cause.
    Failed,
}

/// Cooperative cancellation flag, checked between images.
///
/// Clone it into the signal handler or UI side; the in-flight image always
/// finishes so its table is never half-written.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one batch run.
#[derive(Debug)]
pub struct BatchReport {
    /// Per-image final state, in processing order.
    pub states: Vec<(String, ImageState)>,
    /// True when the run ended early on a cancellation request.
    pub cancelled: bool,
}

impl BatchReport {
    fn count(&self, state: ImageState) -> usize {
        self.states.iter().filter(|(_, s)| *s == state).count()
    }

    /// Number of images processed in this run.
    pub fn completed(&self) -> usize {
        self.count(ImageState::Completed)
    }

    /// Number of images skipped because their output already existed.
    pub fn skipped(&self) -> usize {
        self.count(ImageState::Skipped)
    }

    /// Number of images that failed.
    pub fn failed(&self) -> usize {
        self.count(ImageState::Failed)
    }
}

/// Sequential batch runner.
pub struct BatchRunner<S: StackSource> {
    source: S,
    output_dir: PathBuf,
    config: TrackingConfig,
    cancel: CancelToken,
    on_progress: Option<Box<dyn Fn(&str, ImageState) + Send>>,
}

impl<S: StackSource> BatchRunner<S> {
    /// Build a runner writing tables under `output_dir`.
    pub fn new(source: S, output_dir: &Path, config: TrackingConfig) -> Self {
        Self {
            source,
            output_dir: output_dir.to_path_buf(),
            config,
            cancel: CancelToken::new(),
            on_progress: None,
        }
    }

    /// Token that cancels this runner between images.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Register a callback invoked on every image state transition.
    pub fn on_progress(mut self, callback: impl Fn(&str, ImageState) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Destination table path for one stack name.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("tracks_{}.csv", name))
    }

    /// Run the batch to completion, cancellation, or a fatal error.
    pub fn run(&self) -> Result<BatchReport, TrackingError> {
        self.config.validate()?;
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            TrackingError::Precondition(format!(
                "cannot create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;
        self.config.log_config();

        let names = self.source.entries();
        let total = names.len();
        info!(total, output = %self.output_dir.display(), "batch start");

        let mut states: Vec<(String, ImageState)> = names
            .iter()
            .map(|n| (n.clone(), ImageState::Pending))
            .collect();
        let mut cancelled = false;

        for (idx, name) in names.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining = total - idx, "batch cancelled");
                cancelled = true;
                break;
            }

            let table_path = self.table_path(name);
            let state = if table_path.exists() {
                info!("[{}/{}] {}: output exists, skipping", idx + 1, total, name);
                ImageState::Skipped
            } else {
                states[idx].1 = ImageState::Processing;
                self.notify(name, ImageState::Processing);
                self.process_one(name, idx, total, &table_path)?
            };
            states[idx].1 = state;
            self.notify(name, state);
        }

        let report = BatchReport { states, cancelled };
        info!(
            completed = report.completed(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled,
            "batch finished"
        );
        Ok(report)
    }

    fn notify(&self, name: &str, state: ImageState) {
        if let Some(callback) = &self.on_progress {
            callback(name, state);
        }
    }

    fn process_one(
        &self,
        name: &str,
        idx: usize,
        total: usize,
        table_path: &Path,
    ) -> Result<ImageState, TrackingError> {
        info!("[{}/{}] {}: processing", idx + 1, total, name);
        let result = self
            .source
            .load(name)
            .and_then(|stack| process_stack(&stack, &self.config))
            .and_then(|table| table.write_csv(table_path));
        match result {
            Ok(()) => Ok(ImageState::Completed),
            Err(e) if e.is_fatal_for_batch() => Err(e),
            Err(e) => {
                error!("[{}/{}] {}: {}", idx + 1, total, name, e);
                Ok(ImageState::Failed)
            }
        }
    }
}
