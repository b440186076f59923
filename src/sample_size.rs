//! Minimum sample size per variant for a two-proportion test
//!
//! ```text
//! n = (z_{1-α/2} √(2 p̄ (1 - p̄)) + z_{power} √(p1 (1 - p1) + p2 (1 - p2)))²
//!     ─────────────────────────────────────────────────────────────────
//!                             (p2 - p1)²
//! ```
//!
//! with `p2 = p1 (1 + mde)` and `p̄ = (p1 + p2) / 2`.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::{Error, Result};

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(Error::Domain(format!("{name} must be in (0, 1), got {value}")))
    }
}

/// Users needed in each variant to detect a relative change of `mde` from
/// `baseline_rate`.
///
/// ```
/// use trueno_ab::sample_size::calculate_sample_size;
///
/// # fn main() -> trueno_ab::Result<()> {
/// let n = calculate_sample_size(0.10, 0.20, 0.05, 0.80)?;
/// assert!(n > 3_000 && n < 4_500);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`Error::Domain`] if any input lies outside `(0, 1)`, if the
/// treatment rate `baseline_rate * (1 + mde)` reaches 1, or if it equals
/// the baseline.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::similar_names
)]
pub fn calculate_sample_size(baseline_rate: f64, mde: f64, alpha: f64, power: f64) -> Result<u64> {
    check_unit_interval("baseline_rate", baseline_rate)?;
    check_unit_interval("mde", mde)?;
    check_unit_interval("alpha", alpha)?;
    check_unit_interval("power", power)?;

    let p1 = baseline_rate;
    let p2 = baseline_rate * (1.0 + mde);
    if p2 >= 1.0 {
        return Err(Error::Domain(format!(
            "treatment rate {p2} must stay below 1 (baseline {p1}, mde {mde})"
        )));
    }
    if (p2 - p1).abs() <= f64::EPSILON {
        return Err(Error::Domain(
            "baseline and treatment rates are equal".to_string(),
        ));
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| Error::Statistics(e.to_string()))?;
    let z_alpha = normal.inverse_cdf(1.0 - alpha / 2.0);
    let z_power = normal.inverse_cdf(power);

    let p_pooled = (p1 + p2) / 2.0;
    let numerator = z_alpha.mul_add(
        (2.0 * p_pooled * (1.0 - p_pooled)).sqrt(),
        z_power * p1.mul_add(1.0 - p1, p2 * (1.0 - p2)).sqrt(),
    );
    let n = numerator.powi(2) / (p2 - p1).powi(2);
    Ok(n.ceil() as u64)
}

/// A sample-size calculation with its inputs and a plain-language summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplePlan {
    /// Users per variant
    pub sample_size_per_variant: u64,
    /// Users across control and treatment
    pub total_sample_size: u64,
    /// Baseline conversion rate
    pub baseline_rate: f64,
    /// Relative minimum detectable effect
    pub mde: f64,
    /// Significance level
    pub alpha: f64,
    /// Statistical power
    pub power: f64,
    /// Expected control rate (the baseline)
    pub expected_control_rate: f64,
    /// Expected treatment rate, `baseline * (1 + mde)`
    pub expected_treatment_rate: f64,
    /// Plain-language summary
    pub interpretation: String,
}

impl SamplePlan {
    /// Compute a plan.
    ///
    /// # Errors
    ///
    /// See [`calculate_sample_size`].
    pub fn compute(baseline_rate: f64, mde: f64, alpha: f64, power: f64) -> Result<Self> {
        let per_variant = calculate_sample_size(baseline_rate, mde, alpha, power)?;
        let treatment_rate = baseline_rate * (1.0 + mde);
        let interpretation = format!(
            "You need at least {} users in each variant (control and treatment) to detect a \
             {:.1}% relative change in your conversion rate (from {:.1}% to {:.1}%) with \
             {:.0}% power and {:.0}% significance level.",
            group_thousands(per_variant),
            mde * 100.0,
            baseline_rate * 100.0,
            treatment_rate * 100.0,
            power * 100.0,
            alpha * 100.0,
        );
        Ok(Self {
            sample_size_per_variant: per_variant,
            total_sample_size: per_variant * 2,
            baseline_rate,
            mde,
            alpha,
            power,
            expected_control_rate: baseline_rate,
            expected_treatment_rate: treatment_rate,
            interpretation,
        })
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// One selectable value with a display label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterOption {
    /// Numeric value
    pub value: f64,
    /// Display label
    pub label: &'static str,
    /// Marks the usual choice
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recommended: bool,
}

impl ParameterOption {
    const fn new(value: f64, label: &'static str, recommended: bool) -> Self {
        Self {
            value,
            label,
            recommended,
        }
    }
}

/// Guidance for choosing the relative MDE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MdeGuidance {
    /// Small effects
    pub aggressive: &'static str,
    /// Typical effects
    pub moderate: &'static str,
    /// Large effects
    pub conservative: &'static str,
}

/// Recommended calculator inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSizeDefaults {
    /// Significance levels
    pub alpha_options: Vec<ParameterOption>,
    /// Power levels
    pub power_options: Vec<ParameterOption>,
    /// MDE guidance
    pub mde_examples: MdeGuidance,
}

impl SampleSizeDefaults {
    /// The standard option sets: alpha 5% and power 80% recommended.
    #[must_use]
    pub fn recommended() -> Self {
        Self {
            alpha_options: vec![
                ParameterOption::new(0.01, "1% (Very conservative)", false),
                ParameterOption::new(0.05, "5% (Standard)", true),
                ParameterOption::new(0.10, "10% (Exploratory)", false),
            ],
            power_options: vec![
                ParameterOption::new(0.70, "70% (Minimum)", false),
                ParameterOption::new(0.80, "80% (Standard)", true),
                ParameterOption::new(0.90, "90% (High confidence)", false),
                ParameterOption::new(0.95, "95% (Very high confidence)", false),
            ],
            mde_examples: MdeGuidance {
                aggressive: "2-5% (requires large samples)",
                moderate: "10-20% (recommended for most tests)",
                conservative: "25%+ (easier to detect)",
            },
        }
    }
}
