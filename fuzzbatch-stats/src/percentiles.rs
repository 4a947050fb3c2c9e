//! Order Statistics
//!
//! The median reported for a summarized field is the 50th percentile
//! computed here.

/// Percentile of per-run values, `percentile` in `0..=100`
///
/// Interpolates linearly between the two closest ranks, so the median of an
/// even number of runs is the midpoint of the middle pair. Out-of-range
/// percentiles are clamped and an empty slice yields 0.0.
///
/// ```
/// # use fuzzbatch_stats::compute_percentile;
/// let execs_per_sec = [400.0, 100.0, 300.0, 200.0];
/// assert_eq!(compute_percentile(&execs_per_sec, 50.0), 250.0);
/// ```
pub fn compute_percentile(samples: &[f64], percentile: f64) -> f64 {
    let mut ordered = samples.to_vec();
    ordered.sort_unstable_by(f64::total_cmp);

    let Some(last) = ordered.len().checked_sub(1) else {
        return 0.0;
    };

    let position = percentile.clamp(0.0, 100.0) / 100.0 * last as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let weight = position - below as f64;

    ordered[below] * (1.0 - weight) + ordered[above] * weight
}

/// Median of the samples (0.0 when empty)
pub fn compute_median(samples: &[f64]) -> f64 {
    compute_percentile(samples, 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_of_odd_run_count() {
        assert_eq!(compute_median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn test_median_of_even_run_count() {
        assert_eq!(compute_median(&[200.0, 100.0]), 150.0);
        assert_eq!(compute_median(&[1.0, 2.0, 10.0, 20.0]), 6.0);
    }

    #[test]
    fn test_interpolated_quartiles() {
        let crashes = [0.0, 4.0, 8.0, 12.0, 16.0];
        assert_eq!(compute_percentile(&crashes, 25.0), 4.0);
        assert_eq!(compute_percentile(&crashes, 10.0), 1.6);
        assert_eq!(compute_percentile(&crashes, 100.0), 16.0);
    }

    #[test]
    fn test_out_of_range_percentile_is_clamped() {
        let samples = [1.0, 2.0, 3.0];
        assert_eq!(compute_percentile(&samples, 150.0), 3.0);
        assert_eq!(compute_percentile(&samples, -5.0), 1.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(compute_median(&[42.0]), 42.0);
        assert_eq!(compute_median(&[]), 0.0);
    }
}
