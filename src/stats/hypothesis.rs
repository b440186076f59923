//! Hypothesis testing: control (`"A"`) vs treatment (`"B"`)
//!
//! | Aggregation   | Test                                   |
//! |---------------|----------------------------------------|
//! | `Binary`      | chi-square independence, Yates, 1 d.f. |
//! | `Sum`/`Count` | Student's t, pooled variance           |
//!
//! Degenerate inputs never error: they report `statistic = 0` and
//! `p_value = 1`, except zero pooled variance with different means which
//! reports an infinite statistic and `p_value = 0`.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

use super::intervals::{binomial_interval, t_interval, ConfidenceInterval};
use super::{mean, sample_variance};
use crate::aggregation::{variant_values, UserMetricRow};
use crate::config::AnalysisConfig;
use crate::experiment::{Aggregation, CONTROL, TREATMENT};
use crate::{Error, Result};

/// Test-specific part of a [`TestResult`], tagged by the `test` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "test")]
pub enum TestDetail {
    /// Binary metrics
    #[serde(rename = "chi-square")]
    ChiSquare {
        /// Conversion rate of the control
        variant_a_rate: f64,
        /// Conversion rate of the treatment
        variant_b_rate: f64,
        /// Binomial interval of the control rate
        variant_a_ci: ConfidenceInterval,
        /// Binomial interval of the treatment rate
        variant_b_ci: ConfidenceInterval,
        /// `[[conv_A, n_A - conv_A], [conv_B, n_B - conv_B]]`
        contingency_table: [[u64; 2]; 2],
        /// Control users
        variant_a_n: u64,
        /// Treatment users
        variant_b_n: u64,
    },
    /// Sum and count metrics
    #[serde(rename = "t-test")]
    TTest {
        /// Control mean
        variant_a_mean: f64,
        /// Treatment mean
        variant_b_mean: f64,
        /// t interval of the control mean
        variant_a_ci: ConfidenceInterval,
        /// t interval of the treatment mean
        variant_b_ci: ConfidenceInterval,
        /// Control users
        variant_a_n: u64,
        /// Treatment users
        variant_b_n: u64,
        /// `n_A + n_B - 2`
        degrees_of_freedom: f64,
    },
}

impl TestDetail {
    /// `"chi-square"` or `"t-test"`
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ChiSquare { .. } => "chi-square",
            Self::TTest { .. } => "t-test",
        }
    }
}

/// Outcome of one metric's hypothesis test.
///
/// After FDR correction `p_value`/`significant` hold the corrected values
/// and the originals move to `p_value_raw`/`significant_raw`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    #[serde(flatten)]
    detail: TestDetail,
    statistic: f64,
    #[serde(rename = "p-value")]
    p_value: f64,
    #[serde(rename = "p_value_raw", skip_serializing_if = "Option::is_none")]
    p_value_raw: Option<f64>,
    lift: Option<f64>,
    significant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    significant_raw: Option<bool>,
}

impl TestResult {
    fn new(detail: TestDetail, statistic: f64, p_value: f64, lift: Option<f64>, alpha: f64) -> Self {
        Self {
            detail,
            statistic,
            p_value,
            p_value_raw: None,
            lift,
            significant: p_value < alpha,
            significant_raw: None,
        }
    }

    /// Test-specific fields.
    #[must_use]
    pub const fn detail(&self) -> &TestDetail {
        &self.detail
    }

    /// Test statistic (chi-square, or t of A minus B).
    #[must_use]
    pub const fn statistic(&self) -> f64 {
        self.statistic
    }

    /// Reported p-value (corrected when correction ran).
    #[must_use]
    pub const fn p_value(&self) -> f64 {
        self.p_value
    }

    /// Uncorrected p-value, present only after correction.
    #[must_use]
    pub const fn p_value_raw(&self) -> Option<f64> {
        self.p_value_raw
    }

    /// Relative lift of B over A, `None` when the control baseline is 0.
    #[must_use]
    pub const fn lift(&self) -> Option<f64> {
        self.lift
    }

    /// Significance at the configured alpha.
    #[must_use]
    pub const fn significant(&self) -> bool {
        self.significant
    }

    /// Uncorrected significance, present only after correction.
    #[must_use]
    pub const fn significant_raw(&self) -> Option<bool> {
        self.significant_raw
    }

    /// Move the current p-value and flag to the `_raw` slots and store the
    /// corrected ones.
    pub fn record_correction(&mut self, corrected_p_value: f64, significant: bool) {
        self.p_value_raw = Some(self.p_value);
        self.significant_raw = Some(self.significant);
        self.p_value = corrected_p_value;
        self.significant = significant;
    }
}

/// Run the test matching `aggregation` on a per-user table.
///
/// # Example
///
/// ```
/// use trueno_ab::aggregation::UserMetricRow;
/// use trueno_ab::experiment::Aggregation;
/// use trueno_ab::stats::run_test;
/// use trueno_ab::AnalysisConfig;
///
/// # fn main() -> trueno_ab::Result<()> {
/// let mut rows = Vec::new();
/// for i in 0..50 {
///     rows.push(UserMetricRow::new(format!("a{i}"), "A", if i < 10 { 1.0 } else { 0.0 }));
///     rows.push(UserMetricRow::new(format!("b{i}"), "B", if i < 15 { 1.0 } else { 0.0 }));
/// }
/// let result = run_test(&rows, Aggregation::Binary, &AnalysisConfig::default())?;
/// assert_eq!(result.detail().name(), "chi-square");
/// assert!((result.lift().unwrap() - 0.5).abs() < 1e-12);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`Error::Domain`] for an invalid confidence level and
/// [`Error::Statistics`] if a reference distribution cannot be built.
pub fn run_test(
    rows: &[UserMetricRow],
    aggregation: Aggregation,
    config: &AnalysisConfig,
) -> Result<TestResult> {
    let control = variant_values(rows, CONTROL);
    let treatment = variant_values(rows, TREATMENT);
    match aggregation {
        Aggregation::Binary => chi_square_test(&control, &treatment, config),
        Aggregation::Sum | Aggregation::Count => pooled_t_test(&control, &treatment, config),
    }
}

fn relative_lift(baseline: f64, treatment: f64) -> Option<f64> {
    (baseline.abs() > 0.0 && baseline.is_finite()).then(|| treatment / baseline - 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn chi_square_test(
    control: &[f64],
    treatment: &[f64],
    config: &AnalysisConfig,
) -> Result<TestResult> {
    let converted = |values: &[f64]| values.iter().filter(|v| **v > 0.0).count() as u64;
    let (n_a, n_b) = (control.len() as u64, treatment.len() as u64);
    let (conv_a, conv_b) = (converted(control), converted(treatment));

    let rate = |conv: u64, n: u64| if n == 0 { 0.0 } else { conv as f64 / n as f64 };
    let (rate_a, rate_b) = (rate(conv_a, n_a), rate(conv_b, n_b));

    let table = [[conv_a, n_a - conv_a], [conv_b, n_b - conv_b]];
    let (statistic, p_value) = match yates_chi_square(table) {
        Some(statistic) => {
            let dist = ChiSquared::new(1.0).map_err(|e| Error::Statistics(e.to_string()))?;
            (statistic, dist.sf(statistic))
        }
        None => {
            tracing::warn!(?table, "contingency table has a zero expected cell");
            (0.0, 1.0)
        }
    };

    let detail = TestDetail::ChiSquare {
        variant_a_rate: rate_a,
        variant_b_rate: rate_b,
        variant_a_ci: binomial_interval(conv_a, n_a, config.confidence_level)?,
        variant_b_ci: binomial_interval(conv_b, n_b, config.confidence_level)?,
        contingency_table: table,
        variant_a_n: n_a,
        variant_b_n: n_b,
    };
    Ok(TestResult::new(
        detail,
        statistic,
        p_value,
        relative_lift(rate_a, rate_b),
        config.alpha,
    ))
}

/// Chi-square statistic of a 2x2 table with Yates' continuity correction.
/// `None` when any expected count is zero.
#[allow(clippy::cast_precision_loss)]
fn yates_chi_square(table: [[u64; 2]; 2]) -> Option<f64> {
    let rows = [table[0][0] + table[0][1], table[1][0] + table[1][1]];
    let cols = [table[0][0] + table[1][0], table[0][1] + table[1][1]];
    let total = (rows[0] + rows[1]) as f64;

    let mut statistic = 0.0;
    for (i, row) in table.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = rows[i] as f64 * cols[j] as f64 / total;
            if !(expected > 0.0) {
                return None;
            }
            let diff = expected - observed as f64;
            let adjusted = observed as f64 + diff.signum() * diff.abs().min(0.5);
            statistic += (adjusted - expected).powi(2) / expected;
        }
    }
    Some(statistic)
}

#[allow(clippy::cast_precision_loss)]
fn pooled_t_test(control: &[f64], treatment: &[f64], config: &AnalysisConfig) -> Result<TestResult> {
    let (n_a, n_b) = (control.len(), treatment.len());
    let (mean_a, mean_b) = (mean(control), mean(treatment));
    let dof = (n_a + n_b).saturating_sub(2) as f64;

    let (statistic, p_value) = if n_a < 2 || n_b < 2 {
        tracing::warn!(n_a, n_b, "t-test needs at least two observations per variant");
        (0.0, 1.0)
    } else {
        let pooled = ((n_a - 1) as f64 * sample_variance(control)
            + (n_b - 1) as f64 * sample_variance(treatment))
            / dof;
        let std_err = (pooled * (1.0 / n_a as f64 + 1.0 / n_b as f64)).sqrt();
        if std_err > 0.0 && std_err.is_finite() {
            let t = (mean_a - mean_b) / std_err;
            let dist =
                StudentsT::new(0.0, 1.0, dof).map_err(|e| Error::Statistics(e.to_string()))?;
            (t, (2.0 * dist.sf(t.abs())).min(1.0))
        } else if (mean_a - mean_b).abs() > 0.0 {
            tracing::warn!(mean_a, mean_b, "zero pooled variance with different means");
            ((mean_a - mean_b).signum() * f64::INFINITY, 0.0)
        } else {
            tracing::warn!(mean_a, "zero pooled variance with equal means");
            (0.0, 1.0)
        }
    };

    let detail = TestDetail::TTest {
        variant_a_mean: mean_a,
        variant_b_mean: mean_b,
        variant_a_ci: t_interval(control, config.confidence_level)?,
        variant_b_ci: t_interval(treatment, config.confidence_level)?,
        variant_a_n: n_a as u64,
        variant_b_n: n_b as u64,
        degrees_of_freedom: dof,
    };
    Ok(TestResult::new(
        detail,
        statistic,
        p_value,
        relative_lift(mean_a, mean_b),
        config.alpha,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(a: &[f64], b: &[f64]) -> Vec<UserMetricRow> {
        let a_rows = a
            .iter()
            .enumerate()
            .map(|(i, v)| UserMetricRow::new(format!("a{i}"), "A", *v));
        let b_rows = b
            .iter()
            .enumerate()
            .map(|(i, v)| UserMetricRow::new(format!("b{i}"), "B", *v));
        a_rows.chain(b_rows).collect()
    }

    fn conversions(converted: usize, n: usize) -> Vec<f64> {
        (0..n).map(|i| if i < converted { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_chi_square_known_table() {
        let rows = rows(&conversions(10, 50), &conversions(15, 50));
        let result = run_test(&rows, Aggregation::Binary, &AnalysisConfig::default()).unwrap();

        let TestDetail::ChiSquare {
            variant_a_rate,
            variant_b_rate,
            contingency_table,
            variant_a_ci,
            ..
        } = result.detail().clone()
        else {
            panic!("expected chi-square detail");
        };
        assert!((variant_a_rate - 0.2).abs() < 1e-12);
        assert!((variant_b_rate - 0.3).abs() < 1e-12);
        assert_eq!(contingency_table, [[10, 40], [15, 35]]);
        assert!(variant_a_ci.contains(0.2));

        // Yates: |O - E| = 2.5 -> 2.0 in every cell
        let expected_stat = 4.0 * (2.0 / 12.5 + 2.0 / 37.5);
        assert!((result.statistic() - expected_stat).abs() < 1e-9);
        assert!((result.p_value() - 0.3556).abs() < 1e-3);
        assert!((result.lift().unwrap() - 0.5).abs() < 1e-12);
        assert!(!result.significant());
    }

    #[test]
    fn test_chi_square_zero_expected_cell() {
        // nobody converts anywhere -> expected conversions are 0
        let rows = rows(&conversions(0, 20), &conversions(0, 20));
        let result = run_test(&rows, Aggregation::Binary, &AnalysisConfig::default()).unwrap();
        assert!(result.statistic().abs() < f64::EPSILON);
        assert!((result.p_value() - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.lift(), None);
    }

    #[test]
    fn test_chi_square_missing_variant() {
        let rows = rows(&conversions(5, 20), &[]);
        let result = run_test(&rows, Aggregation::Binary, &AnalysisConfig::default()).unwrap();
        assert!((result.p_value() - 1.0).abs() < f64::EPSILON);
        let TestDetail::ChiSquare { variant_b_rate, variant_b_ci, .. } = result.detail().clone()
        else {
            panic!("expected chi-square detail");
        };
        assert!(variant_b_rate.abs() < f64::EPSILON);
        assert_eq!(variant_b_ci, ConfidenceInterval::point(0.0));
    }

    #[test]
    fn test_pooled_t_test_known_values() {
        let rows = rows(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 3.0, 4.0, 5.0, 6.0]);
        let result = run_test(&rows, Aggregation::Sum, &AnalysisConfig::default()).unwrap();
        assert_eq!(result.detail().name(), "t-test");
        // pooled variance 2.5, standard error 1, t = (3 - 4) / 1
        assert!((result.statistic() + 1.0).abs() < 1e-12);
        assert!((result.p_value() - 0.3466).abs() < 1e-3);
        assert!((result.lift().unwrap() - 1.0 / 3.0).abs() < 1e-12);
        let TestDetail::TTest { degrees_of_freedom, .. } = result.detail().clone() else {
            panic!("expected t-test detail");
        };
        assert!((degrees_of_freedom - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_t_test_zero_variance() {
        let different = rows(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]);
        let result = run_test(&different, Aggregation::Count, &AnalysisConfig::default()).unwrap();
        assert!(result.statistic().is_infinite() && result.statistic() < 0.0);
        assert!(result.p_value().abs() < f64::EPSILON);
        assert!(result.significant());

        let equal = rows(&[1.0, 1.0], &[1.0, 1.0]);
        let result = run_test(&equal, Aggregation::Count, &AnalysisConfig::default()).unwrap();
        assert!(result.statistic().abs() < f64::EPSILON);
        assert!((result.p_value() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_t_test_too_few_observations() {
        let rows = rows(&[4.0], &[1.0, 2.0, 3.0]);
        let result = run_test(&rows, Aggregation::Sum, &AnalysisConfig::default()).unwrap();
        assert!(result.statistic().abs() < f64::EPSILON);
        assert!((result.p_value() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_baseline_has_no_lift() {
        let rows = rows(&[0.0, 0.0, 0.0], &[0.0, 1.0, 2.0]);
        let result = run_test(&rows, Aggregation::Sum, &AnalysisConfig::default()).unwrap();
        assert_eq!(result.lift(), None);
    }

    #[test]
    fn test_record_correction_keeps_raw_values() {
        let rows = rows(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]);
        let mut result = run_test(&rows, Aggregation::Sum, &AnalysisConfig::default()).unwrap();
        result.record_correction(0.2, false);
        assert_eq!(result.p_value_raw(), Some(0.0));
        assert_eq!(result.significant_raw(), Some(true));
        assert!((result.p_value() - 0.2).abs() < f64::EPSILON);
        assert!(!result.significant());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["p_value_raw"], 0.0);
        assert_eq!(json["significant_raw"], true);
        assert_eq!(json["p-value"], 0.2);
    }

    #[test]
    fn test_serialized_keys() {
        let rows = rows(&conversions(10, 50), &conversions(15, 50));
        let result = run_test(&rows, Aggregation::Binary, &AnalysisConfig::default()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["test"], "chi-square");
        assert!(json["p-value"].is_number());
        assert!(json.get("p_value_raw").is_none());
        assert_eq!(json["contingency_table"], serde_json::json!([[10, 40], [15, 35]]));
        assert!(json["variant_a_ci"].is_array());
    }
}
