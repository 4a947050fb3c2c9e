//! Configuration loading from fuzzbatch.toml
//!
//! Campaign defaults can be kept in a `fuzzbatch.toml` next to the fuzzing
//! setup. The file is discovered by walking up from the current directory.

use fuzzbatch_report::{DEFAULT_AGGREGATE_FILE, DEFAULT_FIELDS, DEFAULT_REPORT_FILE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the discovered configuration file
pub const CONFIG_FILE_NAME: &str = "fuzzbatch.toml";

/// fuzzbatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FuzzConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Stats collection configuration
    #[serde(default)]
    pub stats: StatsConfig,
}

/// How a run is held to its timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KillPolicy {
    /// Start the fuzzer as a process-group leader and signal the whole group
    /// on deadline: SIGTERM, grace period, then SIGKILL (default)
    #[default]
    ProcessGroup,
    /// Prefix the command with the `timeout` utility and let it do the killing
    TimeoutWrapper,
}

impl std::str::FromStr for KillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process-group" | "pgroup" => Ok(KillPolicy::ProcessGroup),
            "timeout-wrapper" | "wrapper" | "timeout" => Ok(KillPolicy::TimeoutWrapper),
            other => Err(format!("Unknown kill policy: {}", other)),
        }
    }
}

/// Runner configuration for campaign execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Wall-clock budget of each run, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of runs
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Concurrent runs (defaults to available parallelism)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Kill strategy for blocking runs
    #[serde(default)]
    pub kill_policy: KillPolicy,
    /// Delay between SIGTERM and SIGKILL (e.g., "2s", "500ms")
    #[serde(default = "default_grace_period")]
    pub grace_period: String,
    /// Time-bounding utility used by the wrapper policy
    #[serde(default = "default_wrapper_program")]
    pub wrapper_program: String,
    /// Flag the fuzzer takes its output directory with
    #[serde(default = "default_output_flag")]
    pub output_flag: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            runs: default_runs(),
            jobs: None,
            kill_policy: KillPolicy::default(),
            grace_period: default_grace_period(),
            wrapper_program: default_wrapper_program(),
            output_flag: default_output_flag(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_runs() -> usize {
    2
}
fn default_grace_period() -> String {
    "2s".to_string()
}
fn default_wrapper_program() -> String {
    "timeout".to_string()
}
fn default_output_flag() -> String {
    "-o".to_string()
}

/// Stats collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Stats file name inside each run directory
    #[serde(default = "default_report_file")]
    pub report_file: String,
    /// Aggregate report name inside the output root
    #[serde(default = "default_aggregate_file")]
    pub aggregate_file: String,
    /// Fields listed for each run
    #[serde(default = "default_fields")]
    pub selected_fields: Vec<String>,
    /// Fields summarized across runs
    #[serde(default = "default_fields")]
    pub summarized_fields: Vec<String>,
    /// Skip runs whose directory has no stats file instead of failing
    #[serde(default)]
    pub skip_missing_reports: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_file: default_report_file(),
            aggregate_file: default_aggregate_file(),
            selected_fields: default_fields(),
            summarized_fields: default_fields(),
            skip_missing_reports: false,
        }
    }
}

fn default_report_file() -> String {
    DEFAULT_REPORT_FILE.to_string()
}
fn default_aggregate_file() -> String {
    DEFAULT_AGGREGATE_FILE.to_string()
}
fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

impl FuzzConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# fuzzbatch configuration

[runner]
# Wall-clock budget of each run, in seconds
timeout_secs = 10
# Number of runs
runs = 2
# Concurrent runs (uncomment to override available parallelism)
# jobs = 4
# Kill strategy for blocking runs: "process-group" or "timeout-wrapper"
# Detached (execute-only) runs always use the wrapper.
kill_policy = "process-group"
# Delay between SIGTERM and SIGKILL for the process-group policy
grace_period = "2s"
# Time-bounding utility used by the wrapper
wrapper_program = "timeout"
# Flag the fuzzer takes its output directory with
output_flag = "-o"

[stats]
# Stats file each run writes into its output directory
report_file = "fuzzer_stats"
# Aggregate report written into the output root
aggregate_file = "all_stats"
# Fields listed for each run
selected_fields = ["paths_favored", "paths_total", "unique_crashes", "unique_hangs", "bitmap_cvg", "execs_per_sec"]
# Fields summarized (median, stdev) across runs
summarized_fields = ["paths_favored", "paths_total", "unique_crashes", "unique_hangs", "bitmap_cvg", "execs_per_sec"]
# Skip runs with no stats file instead of failing the whole report
skip_missing_reports = false
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if value < 0.0 {
            return Err(anyhow::anyhow!("Negative duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}
