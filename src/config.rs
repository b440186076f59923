//! Analysis configuration
//!
//! Every tunable the engine uses lives here and is passed in explicitly;
//! there are no process-wide defaults.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::{Backend, Error, Result};

/// Significance level used when nothing else is configured
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Confidence level for per-variant intervals
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Fewest metrics for which FDR correction is applied
pub const DEFAULT_MIN_METRICS_FOR_CORRECTION: usize = 3;

/// Days after the first bucket before the lift series flags
/// `expected_significance`
pub const DEFAULT_LIFT_HORIZON_DAYS: i64 = 7;

/// Analysis configuration.
///
/// Deserializes from partial JSON; missing fields take their defaults.
///
/// ```
/// use trueno_ab::AnalysisConfig;
///
/// # fn main() -> trueno_ab::Result<()> {
/// let config = AnalysisConfig::from_json(r#"{"apply_correction": false}"#)?;
/// assert!(!config.apply_correction);
/// assert!((config.alpha - 0.05).abs() < f64::EPSILON);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Significance level for tests and FDR correction
    pub alpha: f64,
    /// Confidence level for intervals
    pub confidence_level: f64,
    /// Apply Benjamini-Hochberg correction across metrics
    pub apply_correction: bool,
    /// Fewest metrics for which correction runs
    pub min_metrics_for_correction: usize,
    /// Lift display heuristic horizon, in days
    pub lift_significance_horizon_days: i64,
    /// Per-metric execution strategy
    pub backend: Backend,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            apply_correction: true,
            min_metrics_for_correction: DEFAULT_MIN_METRICS_FOR_CORRECTION,
            lift_significance_horizon_days: DEFAULT_LIFT_HORIZON_DAYS,
            backend: Backend::CostBased,
        }
    }
}

impl AnalysisConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::InvalidInput`]
    /// for out-of-range values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the significance level.
    #[must_use]
    pub const fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the interval confidence level.
    #[must_use]
    pub const fn confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    /// Enable or disable FDR correction.
    #[must_use]
    pub const fn apply_correction(mut self, apply: bool) -> Self {
        self.apply_correction = apply;
        self
    }

    /// Set the execution backend.
    #[must_use]
    pub const fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Lift heuristic horizon as a duration.
    #[must_use]
    pub fn lift_horizon(&self) -> TimeDelta {
        TimeDelta::try_days(self.lift_significance_horizon_days).unwrap_or(TimeDelta::MAX)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::InvalidInput(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::InvalidInput(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.lift_significance_horizon_days < 0 {
            return Err(Error::InvalidInput(format!(
                "lift_significance_horizon_days must be >= 0, got {}",
                self.lift_significance_horizon_days
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert!((config.alpha - 0.05).abs() < f64::EPSILON);
        assert!((config.confidence_level - 0.95).abs() < f64::EPSILON);
        assert!(config.apply_correction);
        assert_eq!(config.min_metrics_for_correction, 3);
        assert_eq!(config.lift_horizon(), TimeDelta::days(7));
        assert_eq!(config.backend, Backend::CostBased);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config =
            AnalysisConfig::from_json(r#"{"alpha": 0.01, "backend": "Sequential"}"#).unwrap();
        assert!((config.alpha - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.backend, Backend::Sequential);
        assert!(config.apply_correction);
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        assert!(AnalysisConfig::from_json(r#"{"alpha": 1.5}"#).is_err());
        assert!(AnalysisConfig::default().confidence_level(0.0).validate().is_err());
        assert!(AnalysisConfig::from_json(r#"{"lift_significance_horizon_days": -1}"#).is_err());
    }

    #[test]
    fn test_builder_setters() {
        let config = AnalysisConfig::default()
            .alpha(0.1)
            .apply_correction(false)
            .backend(Backend::Parallel);
        assert!((config.alpha - 0.1).abs() < f64::EPSILON);
        assert!(!config.apply_correction);
        assert_eq!(config.backend, Backend::Parallel);
    }
}
