//! The batch engine (C9): expand a list of CLI targets into a file list, then run a per-item
//! worker function across a bounded thread pool.
//!
//! Grounded in the same directory-walking shape the corpus uses for bulk CLI tools: a
//! `WalkBuilder` per root with standard VCS-ignore filters disabled (this isn't a linter walking
//! a git checkout, it's a document validator walking whatever directory it's pointed at), plus an
//! explicit extension/ignore-glob filter layered on top.

pub mod expand;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;
use crate::error::OperationalError;

/// Configuration for a batch run: concurrency, directory-walk limits, and file filters.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of worker threads. Always at least 1.
    pub workers: usize,
    /// Bounded channel capacity between the feeder and the workers.
    pub queue_size: usize,
    /// Maximum directory recursion depth; `None` means unlimited.
    pub max_depth: Option<usize>,
    /// Extensions to include (e.g. `.epub`, `.pdf`), lowercase and dot-prefixed. Empty means "no
    /// filter": every regular file is a candidate.
    pub allowed_extensions: Vec<String>,
    /// Glob patterns (matched against both the basename and the full path) to exclude.
    pub ignore_patterns: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1);
        Self {
            workers,
            queue_size: workers.saturating_mul(4).max(4),
            max_depth: None,
            allowed_extensions: vec![".epub".to_owned(), ".pdf".to_owned()],
            ignore_patterns: Vec::new(),
        }
    }
}

/// The outcome of running one item's worker function.
pub struct ItemResult<T> {
    /// The file that was processed.
    pub path: PathBuf,
    /// The worker's output, on success.
    pub value: Option<T>,
    /// The worker's failure, on error.
    pub err: Option<OperationalError>,
    /// How long the worker took for this item.
    pub duration: Duration,
}

/// The full set of per-item outcomes from a batch run, in completion order.
pub struct BatchResult<T> {
    /// One entry per item the target expansion produced, in the order workers finished them;
    /// not the order targets were expanded in.
    pub items: Vec<ItemResult<T>>,
    /// How many items the target expansion produced in total (including any still queued when
    /// cancellation was signalled).
    pub total: usize,
}

/// One progress notification, delivered serially from the collecting thread as each item
/// finishes, never concurrently, so a caller's callback never needs its own locking.
pub struct ProgressEvent<'a, T> {
    /// The file that just finished.
    pub path: &'a Path,
    /// How many items have finished so far, including this one.
    pub completed: usize,
    /// Total items expected.
    pub total: usize,
    /// The worker's failure for this item, if any.
    pub err: Option<&'a OperationalError>,
    /// The worker's output for this item, if it succeeded.
    pub value: Option<&'a T>,
}

/// Run `worker` across every file `targets` expands to, honoring `config` and `cancel`.
///
/// Spawns exactly `config.workers` worker threads plus one feeder thread; the calling thread acts
/// as the collector, receiving results in completion order and invoking `progress` (if given)
/// once per finished item.
pub fn run<T, F>(
    targets: &[String],
    config: &BatchConfig,
    cancel: &CancellationToken,
    worker: F,
    mut progress: Option<&mut dyn FnMut(ProgressEvent<'_, T>)>,
) -> BatchResult<T>
where
    T: Send,
    F: Fn(&Path) -> Result<T, OperationalError> + Send + Sync,
{
    let paths = expand::expand_targets(targets, config);
    let total = paths.len();
    let worker_count = config.workers.max(1);

    let (job_tx, job_rx) = crossbeam_channel::bounded::<PathBuf>(config.queue_size.max(1));
    let (result_tx, result_rx) = crossbeam_channel::bounded::<ItemResult<T>>(config.queue_size.max(1));

    let items = std::thread::scope(|scope| {
        let feeder_cancel = cancel.clone();
        scope.spawn(move || {
            for path in paths {
                if feeder_cancel.is_cancelled() {
                    break;
                }
                if job_tx.send(path).is_err() {
                    break;
                }
            }
        });

        for _ in 0..worker_count {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let worker_cancel = cancel.clone();
            let worker = &worker;
            scope.spawn(move || {
                while let Ok(path) = job_rx.recv() {
                    if worker_cancel.is_cancelled() {
                        break;
                    }
                    let started = Instant::now();
                    let outcome = worker(&path);
                    let duration = started.elapsed();
                    let item = match outcome {
                        Ok(value) => ItemResult { path, value: Some(value), err: None, duration },
                        Err(err) => ItemResult { path, value: None, err: Some(err), duration },
                    };
                    if result_tx.send(item).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        let mut items = Vec::with_capacity(total);
        let mut completed = 0usize;
        while let Ok(item) = result_rx.recv() {
            completed += 1;
            if let Some(callback) = progress.as_deref_mut() {
                callback(ProgressEvent {
                    path: &item.path,
                    completed,
                    total,
                    err: item.err.as_ref(),
                    value: item.value.as_ref(),
                });
            }
            items.push(item);
        }
        items
    });

    BatchResult { items, total }
}

/// The process-exit-code-shaped summary of a batch run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExitStatus {
    /// Every item validated cleanly.
    Ok = 0,
    /// At least one item had warnings but none had errors or internal failures.
    Warnings = 1,
    /// At least one item's validation report had errors.
    Errors = 2,
    /// At least one item's worker itself failed (an [`OperationalError`], not a finding).
    InternalError = 3,
}

impl ExitStatus {
    /// The numeric process exit code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Fold a batch of validation outcomes into a single [`ExitStatus`].
///
/// Internal failures outrank validation errors, which outrank warnings: a batch where one file
/// couldn't even be read is worse than one where every file was merely invalid.
pub fn aggregate_exit_status<'a>(
    items: impl IntoIterator<Item = &'a ItemResult<crate::diagnostics::ValidationReport>>,
) -> ExitStatus {
    let mut has_errors = false;
    let mut has_warnings = false;
    let mut has_internal_error = false;

    for item in items {
        if item.err.is_some() {
            has_internal_error = true;
            continue;
        }
        if let Some(report) = &item.value {
            if !report.errors.is_empty() {
                has_errors = true;
            } else if !report.warnings.is_empty() {
                has_warnings = true;
            }
        }
    }

    if has_internal_error {
        ExitStatus::InternalError
    } else if has_errors {
        ExitStatus::Errors
    } else if has_warnings {
        ExitStatus::Warnings
    } else {
        ExitStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn write_files(dir: &Path, names: &[&str]) {
        for name in names {
            let mut file = std::fs::File::create(dir.join(name)).unwrap();
            file.write_all(b"data").unwrap();
        }
    }

    #[test]
    fn worker_pool_uses_at_most_configured_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);

        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let config = BatchConfig {
            workers: 2,
            queue_size: 8,
            max_depth: None,
            allowed_extensions: vec![".pdf".to_owned()],
            ignore_patterns: Vec::new(),
        };
        let cancel = CancellationToken::new();
        let targets = vec![dir.path().to_string_lossy().into_owned()];

        let concurrent_in = concurrent.clone();
        let max_concurrent_in = max_concurrent.clone();
        let result = run(
            &targets,
            &config,
            &cancel,
            move |_path| {
                let now = concurrent_in.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent_in.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                concurrent_in.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), OperationalError>(())
            },
            None,
        );

        assert_eq!(result.items.len(), 4);
        assert!(max_concurrent.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn cancellation_stops_remaining_work_early() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]);

        let config = BatchConfig {
            workers: 1,
            queue_size: 1,
            max_depth: None,
            allowed_extensions: vec![".pdf".to_owned()],
            ignore_patterns: Vec::new(),
        };
        let cancel = CancellationToken::new();
        let cancel_for_worker = cancel.clone();
        let targets = vec![dir.path().to_string_lossy().into_owned()];

        let processed = Arc::new(AtomicUsize::new(0));
        let processed_in = processed.clone();
        let result = run(
            &targets,
            &config,
            &cancel,
            move |_path| {
                let count = processed_in.fetch_add(1, Ordering::SeqCst) + 1;
                if count == 2 {
                    cancel_for_worker.cancel();
                }
                Ok::<(), OperationalError>(())
            },
            None,
        );

        assert!(result.items.len() < 5, "cancellation should have cut the run short");
    }

    #[test]
    fn exit_status_prioritizes_internal_error_over_errors_over_warnings() {
        use crate::diagnostics::{FileType, FindingSink};

        let mut error_sink = FindingSink::new();
        error_sink.emit("PDF-HEADER-001", "bad header");
        let error_report =
            error_sink.into_report(PathBuf::from("a.pdf"), FileType::Pdf, chrono::Utc::now(), Duration::ZERO, Default::default());

        let items = vec![
            ItemResult { path: PathBuf::from("a.pdf"), value: Some(error_report), err: None, duration: Duration::ZERO },
            ItemResult {
                path: PathBuf::from("b.pdf"),
                value: None,
                err: Some(OperationalError::Cancelled),
                duration: Duration::ZERO,
            },
        ];
        assert_eq!(aggregate_exit_status(items.iter()), ExitStatus::InternalError);
    }
}
