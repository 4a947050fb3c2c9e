//! Stats Collection
//!
//! Turns the final contents of a campaign's run directories into the
//! aggregate report file.
//!
//! Directories are read only once dispatch is over, and records are built
//! from what is on disk, never from the order in which runs finished.
//!
//! Tolerance rules:
//! - A run whose launch failed is skipped.
//! - A run directory that never materialized is skipped.
//! - A directory without a stats file aborts collection, unless
//!   `skip_missing_reports` is set, in which case it is skipped too.
//! - A summarized field missing or non-numeric in any parsed run aborts
//!   collection; there is no partial summary.

use crate::config::StatsConfig;
use crate::plan::ExperimentPlan;
use fuzzbatch_report::{ReportError, StatsRecord, aggregate, parse_stats_file};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the collection pass
#[derive(Debug, Error)]
pub enum CollectError {
    /// A stats file could not be read or the report not built
    #[error(transparent)]
    Report(#[from] ReportError),

    /// The aggregate file could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Aggregate file location
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// A written aggregate report
#[derive(Debug, Clone)]
pub struct CollectedReport {
    /// Location of the aggregate file
    pub path: PathBuf,
    /// Report text as written
    pub text: String,
    /// Run directories that contributed a record, in plan order
    pub parsed: Vec<PathBuf>,
    /// Run directories left out of the report
    pub skipped: Vec<PathBuf>,
}

/// Parse every usable run directory, then write the aggregate report
pub fn collect_stats(
    plan: &ExperimentPlan,
    stats: &StatsConfig,
    excluded: &HashSet<PathBuf>,
) -> Result<CollectedReport, CollectError> {
    let mut skipped = Vec::new();
    let mut candidates: Vec<&Path> = Vec::with_capacity(plan.run_dirs.len());

    for dir in &plan.run_dirs {
        if excluded.contains(dir) {
            warn!("skipping {}: run was not started", dir.display());
            skipped.push(dir.clone());
        } else if !dir.is_dir() {
            warn!("skipping {}: output directory does not exist", dir.display());
            skipped.push(dir.clone());
        } else {
            candidates.push(dir);
        }
    }

    let parsed: Vec<Result<StatsRecord, ReportError>> = candidates
        .par_iter()
        .map(|dir| parse_stats_file(dir, &stats.report_file))
        .collect();

    let mut records = Vec::with_capacity(parsed.len());
    let mut contributing = Vec::with_capacity(parsed.len());
    for (dir, result) in candidates.into_iter().zip(parsed) {
        match result {
            Ok(record) => {
                records.push(record);
                contributing.push(dir.to_path_buf());
            }
            Err(ReportError::MissingReport { path }) if stats.skip_missing_reports => {
                warn!("skipping {}: no {}", dir.display(), path.display());
                skipped.push(dir.to_path_buf());
            }
            Err(e) => return Err(e.into()),
        }
    }

    let text = aggregate(
        &records,
        stats.selected_fields.as_slice(),
        stats.summarized_fields.as_slice(),
    )?;

    let path = plan.output_root.join(&stats.aggregate_file);
    std::fs::write(&path, &text).map_err(|source| CollectError::Write {
        path: path.clone(),
        source,
    })?;
    info!(
        "aggregated {} run(s) into {} ({} skipped)",
        records.len(),
        path.display(),
        skipped.len()
    );

    Ok(CollectedReport {
        path,
        text,
        parsed: contributing,
        skipped,
    })
}
