//! Campaign Pipeline
//!
//! One invocation of fuzzbatch: validate, lay out the output root, run the
//! fuzzer N times, and aggregate the results.
//!
//! | mode | runs | collection |
//! |------|------|------------|
//! | `e`  | started, not awaited | no |
//! | `c`  | none | yes, output root must exist |
//! | `ec` | awaited (exit or timeout) | yes |

use crate::collector::{CollectError, CollectedReport, collect_stats};
use crate::config::StatsConfig;
use crate::orchestrator::{ExperimentOrchestrator, OrchestratorError, RunResult};
use crate::plan::{ExperimentPlan, Mode, build_plan};
use crate::supervisor::{RunSupervisor, SupervisorSettings, split_command_line};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Misconfiguration detected before anything is started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// Execution requested without a command
    #[error("The fuzzer command is required in execution mode")]
    MissingCommand,

    /// Collect-only mode on a missing output root
    #[error("The output folder should exist in collection only mode: {}", .0.display())]
    MissingOutputRoot(PathBuf),

    /// The output root exists but is a file
    #[error("The output path is not a directory: {}", .0.display())]
    OutputRootNotDirectory(PathBuf),

    /// No output root given
    #[error("The output folder is required")]
    MissingOutput,

    /// Zero runs requested
    #[error("The number of experiments must be at least 1")]
    NoRuns,

    /// Zero-second budget
    #[error("The timeout must be at least 1 second")]
    ZeroTimeout,

    /// A flag or config value could not be parsed
    #[error("{0}")]
    InvalidSetting(String),
}

/// Failure of a campaign after settings were accepted, or a usage error
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Rejected before anything started
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The output root could not be created
    #[error("Failed to create output folder {}: {source}", path.display())]
    CreateOutputRoot {
        /// Output root
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Dispatch failed as a whole
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Collection failed
    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    /// Execute, collect, or both
    pub mode: Mode,
    /// Fuzzer command line without the output directory
    pub command: Option<String>,
    /// Directory holding `output_<i>` and the aggregate report
    pub output_root: PathBuf,
    /// Wall-clock budget of each run
    pub timeout_secs: u64,
    /// Number of runs
    pub runs: usize,
    /// Concurrent runs
    pub jobs: usize,
    /// Kill policy and process settings
    pub supervisor: SupervisorSettings,
    /// What to read and what to write during collection
    pub stats: StatsConfig,
}

/// What a campaign did
#[derive(Debug)]
pub struct CampaignOutcome {
    /// Run directory layout
    pub plan: ExperimentPlan,
    /// Empty in collect-only mode
    pub runs: Vec<RunResult>,
    /// `None` unless the mode collects
    pub report: Option<CollectedReport>,
}

impl CampaignOutcome {
    /// Runs that failed to start
    pub fn failed_launches(&self) -> impl Iterator<Item = &RunResult> {
        self.runs.iter().filter(|r| !r.is_launched())
    }
}

/// Run a campaign end to end
pub fn run_campaign(settings: &CampaignSettings) -> Result<CampaignOutcome, CampaignError> {
    let command = validate(settings)?;
    prepare_output_root(settings)?;

    let plan = build_plan(&settings.output_root, settings.runs);

    let runs = match command {
        Some(command) => {
            let wait = settings.mode.waits_for_runs();
            info!(
                "{} {} run(s) of {}s each into {} ({} at a time)",
                if wait { "running" } else { "starting" },
                settings.runs,
                settings.timeout_secs,
                plan.output_root.display(),
                settings.jobs.min(settings.runs)
            );
            let orchestrator = ExperimentOrchestrator::new(
                RunSupervisor::new(settings.supervisor.clone()),
                settings.jobs,
            );
            orchestrator.run_experiments(&command, settings.timeout_secs, wait, &plan.run_dirs)?
        }
        None => Vec::new(),
    };

    let report = if settings.mode.collect {
        let excluded: HashSet<PathBuf> = runs
            .iter()
            .filter(|r| !r.is_launched())
            .map(|r| r.output_directory.clone())
            .collect();
        Some(collect_stats(&plan, &settings.stats, &excluded)?)
    } else {
        None
    };

    Ok(CampaignOutcome { plan, runs, report })
}

/// Check settings, returning the tokenized command when runs are executed
fn validate(settings: &CampaignSettings) -> Result<Option<Vec<String>>, UsageError> {
    if settings.runs == 0 {
        return Err(UsageError::NoRuns);
    }

    if !settings.mode.execute {
        if !settings.output_root.exists() {
            return Err(UsageError::MissingOutputRoot(settings.output_root.clone()));
        }
        return Ok(None);
    }

    let command = settings
        .command
        .as_deref()
        .map(split_command_line)
        .filter(|tokens| !tokens.is_empty())
        .ok_or(UsageError::MissingCommand)?;

    if settings.timeout_secs == 0 {
        return Err(UsageError::ZeroTimeout);
    }

    Ok(Some(command))
}

fn prepare_output_root(settings: &CampaignSettings) -> Result<(), CampaignError> {
    let root = &settings.output_root;
    if root.exists() {
        if !root.is_dir() {
            return Err(UsageError::OutputRootNotDirectory(root.clone()).into());
        }
        return Ok(());
    }

    std::fs::create_dir_all(root).map_err(|source| CampaignError::CreateOutputRoot {
        path: root.clone(),
        source,
    })?;
    info!("created output folder {}", root.display());
    Ok(())
}
