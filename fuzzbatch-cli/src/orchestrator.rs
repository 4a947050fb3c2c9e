//! Experiment Orchestrator
//!
//! Fans N run requests out over a bounded worker pool. Each pool thread owns
//! at most one fuzzer process tree at a time, and runs share no mutable
//! state, so no locking is involved.
//!
//! With `wait` set, [`ExperimentOrchestrator::run_experiments`] returns only
//! after every run has exited or been timed out, which is what makes a
//! following collection pass see final stats. Without it, the call returns
//! as soon as every run has been started.

use crate::supervisor::{RunLaunch, RunRequest, RunSupervisor, SupervisorError};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Errors that stop a whole dispatch
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A run request was malformed
    #[error(transparent)]
    Request(#[from] SupervisorError),

    /// The rayon pool could not be built
    #[error("Failed to build worker pool: {0}")]
    Pool(String),
}

/// What happened to one dispatched run
#[derive(Debug)]
pub struct RunResult {
    /// Directory the run wrote into
    pub output_directory: PathBuf,
    /// Launch failures stay here instead of aborting the other runs
    pub outcome: Result<RunLaunch, SupervisorError>,
}

impl RunResult {
    /// Whether the fuzzer process was spawned
    ///
    /// A wait or signal failure after the spawn still counts as launched:
    /// the run may have written stats.
    pub fn is_launched(&self) -> bool {
        !matches!(
            self.outcome,
            Err(SupervisorError::InvalidRequest(_) | SupervisorError::SpawnFailed { .. })
        )
    }
}

/// Dispatches runs to a [`RunSupervisor`] in parallel
#[derive(Debug, Clone)]
pub struct ExperimentOrchestrator {
    supervisor: RunSupervisor,
    jobs: usize,
}

impl ExperimentOrchestrator {
    /// Create an orchestrator running at most `jobs` runs at once
    pub fn new(supervisor: RunSupervisor, jobs: usize) -> Self {
        Self {
            supervisor,
            jobs: jobs.max(1),
        }
    }

    /// Create an orchestrator sized to the host's available parallelism
    pub fn with_available_parallelism(supervisor: RunSupervisor) -> Self {
        Self::new(supervisor, available_jobs())
    }

    /// Maximum number of concurrent runs
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Launch one run per output directory
    ///
    /// Results come back in `output_directories` order, whatever order the
    /// runs finish in.
    pub fn run_experiments(
        &self,
        command: &[String],
        timeout_secs: u64,
        wait: bool,
        output_directories: &[PathBuf],
    ) -> Result<Vec<RunResult>, OrchestratorError> {
        if output_directories.is_empty() {
            return Ok(Vec::new());
        }

        let requests = output_directories
            .iter()
            .map(|dir| RunRequest::new(command.to_vec(), timeout_secs, dir.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let pb = if wait {
            let pb = ProgressBar::new(requests.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message("runs finished");
            pb
        } else {
            ProgressBar::hidden()
        };

        let dispatch = |request: &RunRequest| {
            let result = RunResult {
                output_directory: request.output_directory().to_path_buf(),
                outcome: self.supervisor.launch(request, wait),
            };
            if let Err(e) = &result.outcome {
                if result.is_launched() {
                    warn!(
                        "lost track of run in {}: {}",
                        request.output_directory().display(),
                        e
                    );
                } else {
                    warn!(
                        "run in {} was not started: {}",
                        request.output_directory().display(),
                        e
                    );
                }
            }
            pb.inc(1);
            result
        };

        let results: Vec<RunResult> = if self.jobs == 1 || requests.len() == 1 {
            requests.iter().map(dispatch).collect()
        } else {
            let worker_count = self.jobs.min(requests.len());
            let pool = ThreadPoolBuilder::new()
                .num_threads(worker_count)
                .thread_name(|i| format!("fuzzbatch-run-{}", i))
                .build()
                .map_err(|e| OrchestratorError::Pool(e.to_string()))?;

            pool.install(|| requests.par_iter().map(dispatch).collect())
        };

        pb.finish_with_message(if wait { "all runs finished" } else { "all runs started" });
        Ok(results)
    }
}

/// Host parallelism, falling back to 1
pub fn available_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
