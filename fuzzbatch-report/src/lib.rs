#![warn(missing_docs)]
//! fuzzbatch Report - Stats Parsing and Aggregation
//!
//! Reads each run's fuzzer stats file into a [`StatsRecord`] and combines the
//! records into a cross-run [`AggregateReport`], rendered as plain text.

mod record;
mod report;
mod text;

pub use record::{StatsRecord, parse_stats_file};
pub use report::{AggregateReport, AggregateStat, ExperimentSection, build_report};
pub use text::{SUMMARY_HEADING, aggregate, format_stat, format_text_report};

use std::path::PathBuf;
use thiserror::Error;

/// Stats file AFL-style fuzzers write into each output directory
pub const DEFAULT_REPORT_FILE: &str = "fuzzer_stats";

/// Aggregate report written into the output root
pub const DEFAULT_AGGREGATE_FILE: &str = "all_stats";

/// Fields listed per run and summarized across runs by default
pub const DEFAULT_FIELDS: &[&str] = &[
    "paths_favored",
    "paths_total",
    "unique_crashes",
    "unique_hangs",
    "bitmap_cvg",
    "execs_per_sec",
];

/// Errors raised while reading stats or building a report
#[derive(Debug, Error)]
pub enum ReportError {
    /// The output directory exists but holds no stats file
    #[error("stats file not found: {}", path.display())]
    MissingReport {
        /// Expected stats file location
        path: PathBuf,
    },

    /// Reading the stats file failed
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Stats file location
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A summarized field is missing from a run
    #[error("{experiment} has no value for summarized field '{field}'")]
    MissingField {
        /// Field name
        field: String,
        /// Experiment label
        experiment: String,
    },

    /// A summarized field is not a number
    #[error("{experiment}: field '{field}' is not numeric: '{value}'")]
    NonNumeric {
        /// Field name
        field: String,
        /// Experiment label
        experiment: String,
        /// Raw value
        value: String,
    },

    /// Statistics could not be computed for a field
    #[error("cannot summarize field '{field}': {source}")]
    Stats {
        /// Field name
        field: String,
        /// Underlying error
        #[source]
        source: fuzzbatch_stats::StatsError,
    },
}
