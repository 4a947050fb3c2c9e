#![warn(missing_docs)]
//! # fuzzbatch
//!
//! Run a fuzzer N times in parallel under a wall-clock budget and condense
//! the runs' `fuzzer_stats` files into one report.
//!
//! - **Bounded runs**: each run lives in its own process group and is torn
//!   down with SIGTERM then SIGKILL once its budget is spent
//! - **Fire-and-forget**: execute-only mode returns immediately, leaving the
//!   runs bounded by the `timeout` wrapper
//! - **Aggregation**: selected fields per run, then median and sample
//!   standard deviation of the numeric ones
//!
//! ## Quick Start
//!
//! ```text
//! fuzzbatch -o ./exp -t 3600 -n 8 -c "afl-fuzz -i seeds -- ./target @@"
//! cat ./exp/all_stats
//! ```
//!
//! ## Library use
//!
//! ```ignore
//! use fuzzbatch::{CampaignSettings, Mode, run_campaign};
//!
//! let outcome = run_campaign(&settings)?;
//! if let Some(report) = outcome.report {
//!     println!("{}", report.text);
//! }
//! ```

// Re-export campaign types
pub use fuzzbatch_cli::{
    CampaignError, CampaignOutcome, CampaignSettings, CollectedReport, ExperimentOrchestrator,
    ExperimentPlan, FuzzConfig, KillPolicy, Mode, RunHandle, RunLaunch, RunRequest, RunResult,
    RunStatus, RunSupervisor, StatsConfig, SupervisorSettings, UsageError, build_plan,
    collect_stats, run_campaign,
};

// Re-export report types
pub use fuzzbatch_report::{
    AggregateReport, AggregateStat, DEFAULT_AGGREGATE_FILE, DEFAULT_FIELDS, DEFAULT_REPORT_FILE,
    ReportError, StatsRecord, aggregate, build_report, format_text_report, parse_stats_file,
};

// Re-export stats
pub use fuzzbatch_stats::{FieldSummary, StatsError, compute_field_summary, compute_median};

/// Run the fuzzbatch CLI.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     fuzzbatch::run()
/// }
/// ```
pub use fuzzbatch_cli::run;
