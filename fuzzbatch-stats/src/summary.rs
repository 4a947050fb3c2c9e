//! Field Summaries
//!
//! Cross-run statistics for one numeric fuzzer field. Every run contributes
//! exactly one sample, so there is no outlier rejection: a run with an unusual
//! crash count is the signal, not noise.

use crate::StatsError;
use crate::percentiles::compute_median;

/// Summary of one field's values across runs
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSummary {
    /// Median across runs
    pub median: f64,
    /// Arithmetic mean across runs
    pub mean: f64,
    /// Sample (n-1) standard deviation
    pub std_dev: f64,
    /// Smallest value observed
    pub min: f64,
    /// Largest value observed
    pub max: f64,
    /// Number of runs contributing
    pub sample_count: usize,
}

/// Minimum number of samples needed for a sample standard deviation
pub const MIN_SAMPLES: usize = 2;

/// Arithmetic mean (0.0 when empty)
pub fn compute_mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Bessel-corrected standard deviation
///
/// Fails with [`StatsError::InsufficientSamples`] for fewer than two samples,
/// where the n-1 denominator is undefined.
pub fn sample_std_dev(samples: &[f64]) -> Result<f64, StatsError> {
    if samples.len() < MIN_SAMPLES {
        return Err(StatsError::InsufficientSamples {
            needed: MIN_SAMPLES,
            got: samples.len(),
        });
    }

    let mean = compute_mean(samples);
    let variance =
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    Ok(variance.sqrt())
}

/// Compute a full summary for one field
pub fn compute_field_summary(samples: &[f64]) -> Result<FieldSummary, StatsError> {
    if let Some(index) = samples.iter().position(|v| !v.is_finite()) {
        return Err(StatsError::NonFinite {
            index,
            value: samples[index],
        });
    }

    let std_dev = sample_std_dev(samples)?;

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(FieldSummary {
        median: compute_median(samples),
        mean: compute_mean(samples),
        std_dev,
        min,
        max,
        sample_count: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_run_summary() {
        let summary = compute_field_summary(&[100.0, 200.0]).unwrap();

        assert!((summary.median - 150.0).abs() < f64::EPSILON);
        assert!((summary.mean - 150.0).abs() < f64::EPSILON);
        assert!((summary.std_dev - 70.710_678_118_654_76).abs() < 1e-9);
        assert_eq!(summary.min, 100.0);
        assert_eq!(summary.max, 200.0);
        assert_eq!(summary.sample_count, 2);
    }

    #[test]
    fn test_median_differs_from_mean() {
        let summary = compute_field_summary(&[1.0, 2.0, 30.0]).unwrap();

        assert!((summary.median - 2.0).abs() < f64::EPSILON);
        assert!((summary.mean - 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_run_is_an_error() {
        let err = compute_field_summary(&[100.0]).unwrap_err();
        assert_eq!(err, StatsError::InsufficientSamples { needed: 2, got: 1 });

        assert!(sample_std_dev(&[]).is_err());
    }

    #[test]
    fn test_std_dev_of_identical_runs() {
        let std_dev = sample_std_dev(&[7.0, 7.0, 7.0]).unwrap();
        assert!((std_dev - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = compute_field_summary(&[1.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, StatsError::NonFinite { index: 1, .. }));
    }
}
