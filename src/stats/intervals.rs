//! Confidence intervals
//!
//! - binomial: quantile interval of `Binomial(n, p_hat)` in counts, divided
//!   by `n` to give rates
//! - Student's t: `mean ± t_{(1+c)/2, n-1} * s / sqrt(n)`
//!
//! Degenerate inputs (no observations, a single observation, zero spread)
//! collapse the interval onto the point estimate instead of failing.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Binomial, ContinuousCDF, DiscreteCDF, StudentsT};

use super::{mean, sample_std};
use crate::{Error, Result};

/// Two-sided confidence interval, serialized as `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

impl ConfidenceInterval {
    /// Create an interval.
    #[must_use]
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Zero-width interval at `value`.
    #[must_use]
    pub const fn point(value: f64) -> Self {
        Self::new(value, value)
    }

    /// Whether `value` lies inside the interval (inclusive).
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// `upper - lower`
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl From<(f64, f64)> for ConfidenceInterval {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self::new(lower, upper)
    }
}

impl From<ConfidenceInterval> for (f64, f64) {
    fn from(ci: ConfidenceInterval) -> Self {
        (ci.lower, ci.upper)
    }
}

fn check_confidence(confidence: f64) -> Result<()> {
    if confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(Error::Domain(format!(
            "confidence level must be in (0, 1), got {confidence}"
        )))
    }
}

/// Smallest `k` with `P(X <= k) >= q` for `X ~ Binomial(n, p)`.
fn binomial_quantile(q: f64, n: u64, p: f64) -> Result<u64> {
    if p <= 0.0 {
        return Ok(0);
    }
    if p >= 1.0 {
        return Ok(n);
    }
    let dist = Binomial::new(p, n).map_err(|e| Error::Statistics(e.to_string()))?;
    let (mut lo, mut hi) = (0_u64, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if dist.cdf(mid) >= q {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(lo)
}

/// Binomial interval for `successes` out of `n`, as rates.
///
/// # Errors
///
/// Returns [`Error::Domain`] if `confidence` is outside `(0, 1)` or
/// `successes > n`.
#[allow(clippy::cast_precision_loss)]
pub fn binomial_interval(successes: u64, n: u64, confidence: f64) -> Result<ConfidenceInterval> {
    check_confidence(confidence)?;
    if successes > n {
        return Err(Error::Domain(format!(
            "successes ({successes}) exceed trials ({n})"
        )));
    }
    if n == 0 {
        return Ok(ConfidenceInterval::point(0.0));
    }
    let p_hat = successes as f64 / n as f64;
    let lower = binomial_quantile((1.0 - confidence) / 2.0, n, p_hat)?;
    let upper = binomial_quantile((1.0 + confidence) / 2.0, n, p_hat)?;
    Ok(ConfidenceInterval::new(
        lower as f64 / n as f64,
        upper as f64 / n as f64,
    ))
}

/// Student's t interval from summary moments.
///
/// # Errors
///
/// Returns [`Error::Domain`] for an invalid confidence level and
/// [`Error::Statistics`] if the t distribution cannot be built.
#[allow(clippy::cast_precision_loss)]
pub fn t_interval_from_moments(
    n: usize,
    mean: f64,
    std_dev: f64,
    confidence: f64,
) -> Result<ConfidenceInterval> {
    check_confidence(confidence)?;
    if n < 2 {
        return Ok(ConfidenceInterval::point(mean));
    }
    let sem = std_dev / (n as f64).sqrt();
    if !(sem > 0.0 && sem.is_finite()) {
        return Ok(ConfidenceInterval::point(mean));
    }
    let dist = StudentsT::new(0.0, 1.0, (n - 1) as f64)
        .map_err(|e| Error::Statistics(e.to_string()))?;
    let t_critical = dist.inverse_cdf((1.0 + confidence) / 2.0);
    let margin = t_critical * sem;
    Ok(ConfidenceInterval::new(mean - margin, mean + margin))
}

/// Student's t interval over raw values.
///
/// # Errors
///
/// See [`t_interval_from_moments`].
pub fn t_interval(values: &[f64], confidence: f64) -> Result<ConfidenceInterval> {
    t_interval_from_moments(values.len(), mean(values), sample_std(values), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial_interval_brackets_rate() {
        let ci = binomial_interval(10, 50, 0.95).unwrap();
        assert!(ci.contains(0.2));
        assert!(ci.lower > 0.05 && ci.lower < 0.2);
        assert!(ci.upper > 0.2 && ci.upper < 0.35);
    }

    #[test]
    fn test_binomial_interval_edges() {
        assert_eq!(binomial_interval(0, 0, 0.95).unwrap(), ConfidenceInterval::point(0.0));
        assert_eq!(binomial_interval(0, 20, 0.95).unwrap(), ConfidenceInterval::point(0.0));
        assert_eq!(binomial_interval(20, 20, 0.95).unwrap(), ConfidenceInterval::point(1.0));
        assert!(binomial_interval(21, 20, 0.95).is_err());
        assert!(binomial_interval(1, 2, 1.5).is_err());
    }

    #[test]
    fn test_binomial_interval_narrows_with_n() {
        let small = binomial_interval(20, 100, 0.95).unwrap();
        let large = binomial_interval(2_000, 10_000, 0.95).unwrap();
        assert!(large.width() < small.width());
    }

    #[test]
    fn test_t_interval_known_value() {
        // mean 5, s = 2, n = 4 -> sem 1, t_{0.975, 3} = 3.182446...
        let ci = t_interval_from_moments(4, 5.0, 2.0, 0.95).unwrap();
        assert!((ci.lower - (5.0 - 3.182_446_305)).abs() < 1e-6);
        assert!((ci.upper - (5.0 + 3.182_446_305)).abs() < 1e-6);
    }

    #[test]
    fn test_t_interval_degenerate() {
        assert_eq!(t_interval(&[], 0.95).unwrap(), ConfidenceInterval::point(0.0));
        assert_eq!(t_interval(&[3.0], 0.95).unwrap(), ConfidenceInterval::point(3.0));
        assert_eq!(t_interval(&[2.0, 2.0, 2.0], 0.95).unwrap(), ConfidenceInterval::point(2.0));
    }

    #[test]
    fn test_interval_serializes_as_pair() {
        let json = serde_json::to_string(&ConfidenceInterval::new(0.1, 0.3)).unwrap();
        assert_eq!(json, "[0.1,0.3]");
    }
}
