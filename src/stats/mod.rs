//! Statistics
//!
//! Descriptive helpers shared by the distribution summary, the interval
//! estimators and the hypothesis tests. Distribution functions (normal,
//! Student's t, chi-square, binomial) come from `statrs`.
//!
//! Empty input never panics: means and spreads of nothing are `0.0`.

pub mod hypothesis;
pub mod intervals;

pub use hypothesis::{run_test, TestDetail, TestResult};
pub use intervals::{binomial_interval, t_interval, t_interval_from_moments, ConfidenceInterval};

/// Arithmetic mean (0 for empty input).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with Bessel's correction (0 for fewer than 2 values).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation (ddof = 1).
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Percentile of already sorted samples, linear interpolation between
/// nearest ranks. `percentile` is in `[0, 100]`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile_sorted(sorted: &[f64], percentile: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (percentile / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower_idx = rank.floor() as usize;
            let upper_idx = (lower_idx + 1).min(n - 1);
            let fraction = rank - lower_idx as f64;
            sorted[lower_idx] + fraction * (sorted[upper_idx] - sorted[lower_idx])
        }
    }
}

/// Percentile of unsorted samples.
#[must_use]
pub fn percentile(samples: &[f64], percentile: f64) -> f64 {
    percentile_sorted(&sorted_copy(samples), percentile)
}

/// Sorted copy with NaN-tolerant ordering.
#[must_use]
pub fn sorted_copy(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Streaming mean/variance (Welford). Used where a prefix of users grows
/// bucket by bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMoments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    /// Empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Add one observation.
    #[allow(clippy::cast_precision_loss)]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of observations.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Running mean (0 when empty).
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Running sample variance (0 for fewer than 2 observations).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-12);
        assert!((sample_variance(&data) - 32.0 / 7.0).abs() < 1e-12);
        assert!((sample_std(&data) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert!(mean(&[]).abs() < f64::EPSILON);
        assert!(sample_variance(&[1.0]).abs() < f64::EPSILON);
        assert!(percentile(&[], 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentile_interpolates() {
        let samples = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert!((percentile(&samples, 50.0) - 3.0).abs() < 1e-12);
        assert!((percentile(&samples, 25.0) - 2.0).abs() < 1e-12);
        assert!((percentile(&samples, 95.0) - 4.8).abs() < 1e-12);
        assert!((percentile(&[1.0, 2.0], 50.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_running_moments_match_batch() {
        let data = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let mut moments = RunningMoments::new();
        for x in data {
            moments.push(x);
        }
        assert_eq!(moments.count(), data.len());
        assert!((moments.mean() - mean(&data)).abs() < 1e-12);
        assert!((moments.sample_variance() - sample_variance(&data)).abs() < 1e-12);
    }
}
