#![warn(missing_docs)]
//! fuzzbatch Statistical Engine
//!
//! Summarizes one numeric fuzzer field across independent runs:
//! - Median via linear-interpolated percentiles
//! - Sample (Bessel-corrected) standard deviation
//! - Mean, min and max for diagnostics

mod percentiles;
mod summary;

pub use percentiles::{compute_median, compute_percentile};
pub use summary::{
    FieldSummary, MIN_SAMPLES, compute_field_summary, compute_mean, sample_std_dev,
};

use thiserror::Error;

/// Errors raised while summarizing a field
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Not enough runs for a sample standard deviation
    #[error("need at least {needed} samples, got {got}")]
    InsufficientSamples {
        /// Minimum sample count
        needed: usize,
        /// Sample count provided
        got: usize,
    },

    /// A sample was NaN or infinite
    #[error("sample {index} is not finite: {value}")]
    NonFinite {
        /// Position of the offending sample
        index: usize,
        /// The offending value
        value: f64,
    },
}
