//! Parallel per-file execution with failure isolation

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::io::{BatchReport, FileFailure, FileReport};

/// Threads for a batch: `requested`, or all cores when 0
pub fn thread_count(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        requested
    }
}

/// Files processed at once: the thread count, capped by the file count
pub fn worker_count(n_files: usize, requested: usize) -> usize {
    thread_count(requested).min(n_files).max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `task` over every file
///
/// The pool has `threads` workers so gene-level loops inside a task use
/// every thread; at most `worker_count` files are in flight at once. A file
/// whose task fails or panics is recorded in the report and does not affect
/// the other files. Reports keep the input order.
pub fn run_batch<F>(stage: &str, files: &[PathBuf], threads: usize, task: F) -> Result<BatchReport>
where
    F: Fn(&Path) -> Result<FileReport> + Sync + Send,
{
    if files.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: format!("{}: no input files", stage),
        });
    }

    let n_threads = thread_count(threads);
    let n_workers = worker_count(files.len(), threads);
    log::info!(
        "{}: {} files, {} at a time on {} threads",
        stage,
        files.len(),
        n_workers,
        n_threads
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
        .map_err(|e| PipelineError::InvalidInput {
            reason: format!("failed to start worker pool: {}", e),
        })?;

    let run_one = |path: &PathBuf| -> (PathBuf, Result<FileReport>) {
        log::debug!("{}: processing {}", stage, path.display());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(path))).unwrap_or_else(|payload| {
            Err(PipelineError::InvalidInput {
                reason: format!("task panicked: {}", panic_message(payload.as_ref())),
            })
        });
        (path.clone(), outcome)
    };

    let mut outcomes: Vec<(PathBuf, Result<FileReport>)> = Vec::with_capacity(files.len());
    pool.install(|| {
        for wave in files.chunks(n_workers) {
            outcomes.par_extend(wave.par_iter().map(&run_one));
        }
    });

    let mut report = BatchReport::new(stage);
    for (input, outcome) in outcomes {
        match outcome {
            Ok(file_report) => report.succeeded.push(file_report),
            Err(e) => report.failed.push(FileFailure {
                input,
                error: e.to_string(),
            }),
        }
    }
    report.log_summary();
    Ok(report)
}
