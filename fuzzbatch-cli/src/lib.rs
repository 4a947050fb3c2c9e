#![warn(missing_docs)]
//! fuzzbatch CLI Library
//!
//! Runs N independent, time-bounded instances of an external fuzzer, each
//! writing into its own `output_<i>` directory, then condenses every run's
//! stats file into one report with per-field medians and standard deviations.
//!
//! # Example
//!
//! ```text
//! fuzzbatch -m ec -o ./exp -t 3600 -n 8 -c "afl-fuzz -i seeds -- ./target @@"
//! ```
//!
//! launches `timeout`-bounded runs as `afl-fuzz -o ./exp/output_<i> -i seeds -- ./target @@`
//! and writes `./exp/all_stats` once all eight have ended.

mod campaign;
mod collector;
mod config;
mod orchestrator;
mod plan;
mod supervisor;

pub use campaign::{
    CampaignError, CampaignOutcome, CampaignSettings, UsageError, run_campaign,
};
pub use collector::{CollectError, CollectedReport, collect_stats};
pub use config::{CONFIG_FILE_NAME, FuzzConfig, KillPolicy, RunnerConfig, StatsConfig};
pub use orchestrator::{ExperimentOrchestrator, OrchestratorError, RunResult, available_jobs};
pub use plan::{ExperimentPlan, Mode, RUN_DIR_PREFIX, build_plan};
pub use supervisor::{
    RunHandle, RunLaunch, RunRequest, RunStatus, RunSupervisor, SupervisorError,
    SupervisorSettings, WRAPPER_TIMEOUT_EXIT_CODE, split_command_line,
};

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// fuzzbatch CLI arguments
#[derive(Parser, Debug)]
#[command(name = "fuzzbatch")]
#[command(
    author,
    version,
    about = "Utility for executing multiple fuzzer instances and/or collecting results"
)]
pub struct Cli {
    /// Mode of operation: e (execute), c (collect), or ec
    #[arg(short, long, default_value = "ec")]
    pub mode: String,

    /// Command to launch the fuzzer on the binary, minus the output directory
    #[arg(short, long, allow_hyphen_values = true)]
    pub command: Option<String>,

    /// Experiment output directory
    #[arg(short, long, required_unless_present = "print_config")]
    pub output: Option<PathBuf>,

    /// Timeout for each experiment, in seconds [default: 10]
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Number of experiments [default: 2]
    #[arg(short = 'n', long = "numexp", visible_alias = "runs")]
    pub runs: Option<usize>,

    /// Experiments running at once [default: available parallelism]
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Kill strategy for awaited runs: process-group or timeout-wrapper
    #[arg(long)]
    pub kill_policy: Option<String>,

    /// Configuration file (default: discover fuzzbatch.toml upwards)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print a default fuzzbatch.toml and exit
    #[arg(long)]
    pub print_config: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the fuzzbatch CLI with process arguments
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the fuzzbatch CLI with pre-parsed arguments
///
/// Usage errors are printed and end the program normally; everything else
/// propagates.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.print_config {
        print!("{}", FuzzConfig::default_toml());
        return Ok(());
    }

    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => FuzzConfig::load(path)?,
        None => FuzzConfig::discover().unwrap_or_default(),
    };

    let settings = match build_settings(&cli, &config) {
        Ok(settings) => settings,
        Err(usage) => {
            eprintln!("{}", usage);
            return Ok(());
        }
    };

    match run_campaign(&settings) {
        Ok(outcome) => {
            print_outcome(&outcome);
            // Detached handles are dropped here; those runs stay bounded by
            // their wrapper only.
            Ok(())
        }
        Err(CampaignError::Usage(usage)) => {
            eprintln!("{}", usage);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "fuzzbatch={level},fuzzbatch_cli={level},fuzzbatch_report={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Layer settings: built-in defaults → fuzzbatch.toml → CLI flags.
pub fn build_settings(cli: &Cli, config: &FuzzConfig) -> Result<CampaignSettings, UsageError> {
    let mode: Mode = cli.mode.parse().map_err(UsageError::InvalidSetting)?;
    let output_root = cli.output.clone().ok_or(UsageError::MissingOutput)?;

    let kill_policy: KillPolicy = match &cli.kill_policy {
        Some(policy) => policy.parse().map_err(UsageError::InvalidSetting)?,
        None => config.runner.kill_policy,
    };

    let grace_ns = FuzzConfig::parse_duration(&config.runner.grace_period).map_err(|e| {
        UsageError::InvalidSetting(format!("invalid runner.grace_period: {}", e))
    })?;

    let jobs = cli
        .jobs
        .or(config.runner.jobs)
        .unwrap_or_else(available_jobs)
        .max(1);

    Ok(CampaignSettings {
        mode,
        command: cli.command.clone(),
        output_root,
        timeout_secs: cli.timeout.unwrap_or(config.runner.timeout_secs),
        runs: cli.runs.unwrap_or(config.runner.runs),
        jobs,
        supervisor: SupervisorSettings {
            kill_policy,
            wrapper_program: config.runner.wrapper_program.clone(),
            output_flag: config.runner.output_flag.clone(),
            grace_period: Duration::from_nanos(grace_ns),
            ..SupervisorSettings::default()
        },
        stats: config.stats.clone(),
    })
}

fn print_outcome(outcome: &CampaignOutcome) {
    let failed = outcome.failed_launches().count();
    if !outcome.runs.is_empty() {
        println!(
            "{} of {} experiment(s) started under {}",
            outcome.runs.len() - failed,
            outcome.runs.len(),
            outcome.plan.output_root.display()
        );
    }
    for run in &outcome.runs {
        if let Err(e) = &run.outcome {
            eprintln!("  {}: {}", run.output_directory.display(), e);
        }
    }
    if let Some(report) = &outcome.report {
        println!(
            "Report written to: {} ({} run(s), {} skipped)",
            report.path.display(),
            report.parsed.len(),
            report.skipped.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fuzzbatch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&["-o", "./exp", "-c", "afl-fuzz -i in -- ./t"]);
        let settings = build_settings(&cli, &FuzzConfig::default()).unwrap();

        assert_eq!(settings.mode, Mode::EXECUTE_COLLECT);
        assert_eq!(settings.output_root, PathBuf::from("./exp"));
        assert_eq!(settings.timeout_secs, 10);
        assert_eq!(settings.runs, 2);
        assert!(settings.jobs >= 1);
        assert_eq!(settings.supervisor.kill_policy, KillPolicy::ProcessGroup);
        assert_eq!(settings.supervisor.grace_period, Duration::from_secs(2));
        assert_eq!(settings.command.as_deref(), Some("afl-fuzz -i in -- ./t"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = FuzzConfig::default();
        config.runner.timeout_secs = 60;
        config.runner.runs = 4;
        config.runner.jobs = Some(3);
        config.runner.grace_period = "250ms".to_string();

        let cli = parse(&["-o", "out", "-t", "5", "--kill-policy", "timeout-wrapper"]);
        let settings = build_settings(&cli, &config).unwrap();

        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.runs, 4);
        assert_eq!(settings.jobs, 3);
        assert_eq!(settings.supervisor.kill_policy, KillPolicy::TimeoutWrapper);
        assert_eq!(settings.supervisor.grace_period, Duration::from_millis(250));

        let cli = parse(&["-o", "out", "-n", "7", "-j", "2"]);
        let settings = build_settings(&cli, &config).unwrap();
        assert_eq!(settings.runs, 7);
        assert_eq!(settings.jobs, 2);
    }

    #[test]
    fn test_invalid_mode_is_usage_error() {
        let cli = parse(&["-o", "out", "-m", "x"]);
        assert!(matches!(
            build_settings(&cli, &FuzzConfig::default()),
            Err(UsageError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_output_required() {
        assert!(Cli::try_parse_from(["fuzzbatch", "-m", "c"]).is_err());
        assert!(Cli::try_parse_from(["fuzzbatch", "--print-config"]).is_ok());
    }

    #[test]
    fn test_command_with_leading_dash_value() {
        let cli = parse(&["-o", "out", "-c", "-x fuzz"]);
        assert_eq!(cli.command.as_deref(), Some("-x fuzz"));
    }
}
