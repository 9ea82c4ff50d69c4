//! Runs the strip pipeline over a whole [`FileList`].

use crate::collect::FileList;
use crate::encode::StripOptions;
use crate::{StripError, strip_metadata_and_save};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Advisory progress, published after each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based position of the file just finished.
    pub index: usize,
    pub total: usize,
    pub succeeded: usize,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub output_dir: PathBuf,
    /// Files queued when the run started.
    pub total: usize,
    pub succeeded: usize,
    /// Source path and error text for every file that failed.
    pub failures: Vec<(PathBuf, String)>,
    /// Paths written, in processing order.
    pub written: Vec<PathBuf>,
    /// The run stopped early at a cancellation request.
    pub cancelled: bool,
}

impl BatchResult {
    fn new(output_dir: &Path, total: usize) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            total,
            ..Self::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// One-line message for the user. Individual failures are not listed.
    pub fn summary(&self) -> String {
        if self.cancelled {
            format!(
                "Cancelled after {} of {} files: {} succeeded, {} failed.",
                self.attempted(),
                self.total,
                self.succeeded,
                self.failed()
            )
        } else if self.failures.is_empty() {
            format!(
                "Finished. {} images saved to \"{}\".",
                self.succeeded,
                self.output_dir.display()
            )
        } else {
            format!(
                "Finished with {} succeeded and {} failed.",
                self.succeeded,
                self.failed()
            )
        }
    }
}

/// Shared stop request, honoured between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Messages sent from a spawned batch.
#[derive(Debug)]
pub enum BatchEvent {
    Progress(Progress),
    Finished(Result<BatchResult, StripError>),
}

/// A batch running on its own thread.
#[derive(Debug)]
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
    worker: JoinHandle<FileList>,
}

impl BatchHandle {
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Blocks until the batch ends. Returns its result and the entries it did
    /// not process (empty unless cancelled, the output directory failed or the
    /// run panicked).
    pub fn wait(self) -> (Result<BatchResult, StripError>, FileList) {
        let mut finished = None;
        for event in self.events.iter() {
            if let BatchEvent::Finished(result) = event {
                finished = Some(result);
            }
        }
        let remaining = self.worker.join().unwrap_or_else(|_| {
            error!("batch thread died; queued files were lost");
            FileList::new()
        });
        (finished.unwrap_or(Err(StripError::WorkerStopped)), remaining)
    }
}

/// Processes files one at a time, in list order.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    options: StripOptions,
    cancel: CancelFlag,
}

impl BatchRunner {
    pub fn new(options: StripOptions) -> Self {
        Self {
            options,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Strips every file in `files` into `output_dir`.
    ///
    /// Per-file errors are recorded in the result and never stop the run. A
    /// failure to create `output_dir` aborts before any file is touched.
    /// Processed entries are removed from `files`.
    pub fn run(
        &self,
        files: &mut FileList,
        output_dir: &Path,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<BatchResult, StripError> {
        std::fs::create_dir_all(output_dir).map_err(|source| StripError::OutputDirectory {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let total = files.len();
        info!(total, output = %output_dir.display(), "starting batch");
        let mut result = BatchResult::new(output_dir, total);

        for (i, image) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(done = i, total, "batch cancelled");
                result.cancelled = true;
                break;
            }
            match strip_metadata_and_save(image.path(), output_dir, &self.options) {
                Ok(written) => {
                    debug!(src = %image, dst = %written.display(), "stripped");
                    result.succeeded += 1;
                    result.written.push(written);
                }
                Err(err) => {
                    warn!(path = %image, error = %err, "failed to strip metadata");
                    result
                        .failures
                        .push((image.path().to_path_buf(), err.to_string()));
                }
            }
            on_progress(Progress {
                index: i + 1,
                total,
                succeeded: result.succeeded,
            });
        }

        files.remove_front(result.attempted());
        info!(
            succeeded = result.succeeded,
            failed = result.failed(),
            "{}",
            result.summary()
        );
        Ok(result)
    }

    /// [`run`](Self::run), with a panic turned into
    /// [`StripError::WorkerStopped`]. The list is only drained when a run
    /// completes, so after a panic `files` still holds every queued entry.
    pub fn run_guarded(
        &self,
        files: &mut FileList,
        output_dir: &Path,
        on_progress: impl FnMut(Progress),
    ) -> Result<BatchResult, StripError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run(files, output_dir, on_progress)))
            .unwrap_or_else(|_| {
                error!(output = %output_dir.display(), "batch worker panicked");
                Err(StripError::WorkerStopped)
            })
    }

    /// Runs the batch on a background thread. Progress and the final result
    /// arrive on [`BatchHandle::events`]; the list comes back from
    /// [`BatchHandle::wait`].
    pub fn spawn(self, mut files: FileList, output_dir: PathBuf) -> BatchHandle {
        let (tx, events) = mpsc::channel();
        let worker = thread::spawn(move || {
            let outcome = self.run_guarded(&mut files, &output_dir, |progress| {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(BatchEvent::Progress(progress));
            });
            let _ = tx.send(BatchEvent::Finished(outcome));
            files
        });
        BatchHandle { events, worker }
    }
}
