//! Multiple-testing correction across the metrics of one run
//!
//! Benjamini-Hochberg step-up procedure, controlling the false-discovery
//! rate at `alpha`.

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::report::{CorrectionInfo, MetricReport};

/// Method name recorded when correction runs.
pub const BENJAMINI_HOCHBERG: &str = "benjamini-hochberg";

/// Corrected p-values and flags, parallel to the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionOutcome {
    /// Adjusted p-values, same order as the input
    pub corrected_p_values: Vec<f64>,
    /// Rejection decisions, same order as the input
    pub significant_flags: Vec<bool>,
    /// Procedure name
    pub method_name: &'static str,
}

/// Benjamini-Hochberg adjustment.
///
/// Sort ascending, scale `p_(i)` by `m / i`, take the running minimum from
/// the largest rank down and clip to 1. Ranks up to the largest `i` with
/// `p_(i) <= i / m * alpha` are significant.
///
/// ```
/// use trueno_ab::correction::benjamini_hochberg;
///
/// let outcome = benjamini_hochberg(&[0.01, 0.04, 0.03], 0.05);
/// assert!(outcome.significant_flags.iter().all(|s| *s));
/// assert!((outcome.corrected_p_values[0] - 0.03).abs() < 1e-12);
/// assert!((outcome.corrected_p_values[1] - 0.04).abs() < 1e-12);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn benjamini_hochberg(p_values: &[f64], alpha: f64) -> CorrectionOutcome {
    let m = p_values.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut corrected_p_values = vec![1.0; m];
    let mut running_min = 1.0_f64;
    for (rank0, &idx) in order.iter().enumerate().rev() {
        let scaled = p_values[idx] * m as f64 / (rank0 + 1) as f64;
        running_min = running_min.min(scaled);
        corrected_p_values[idx] = running_min.min(1.0);
    }

    let cutoff = order
        .iter()
        .enumerate()
        .filter(|&(rank0, &idx)| p_values[idx] <= (rank0 + 1) as f64 / m as f64 * alpha)
        .map(|(rank0, _)| rank0 + 1)
        .max()
        .unwrap_or(0);
    let mut significant_flags = vec![false; m];
    for &idx in order.iter().take(cutoff) {
        significant_flags[idx] = true;
    }

    CorrectionOutcome {
        corrected_p_values,
        significant_flags,
        method_name: BENJAMINI_HOCHBERG,
    }
}

/// Correct the reports' p-values in place when the policy allows.
///
/// Runs only when `config.apply_correction` is set and at least
/// `config.min_metrics_for_correction` metrics are present. Corrected
/// reports keep their raw p-value and flag under the `_raw` keys.
pub fn apply_correction(reports: &mut [MetricReport], config: &AnalysisConfig) -> CorrectionInfo {
    let n_metrics = reports.len();
    if !config.apply_correction {
        tracing::info!(n_metrics, "multiple-testing correction disabled by request");
        return CorrectionInfo::skipped("disabled by request", n_metrics, config.alpha);
    }
    if n_metrics < config.min_metrics_for_correction {
        tracing::info!(
            n_metrics,
            min = config.min_metrics_for_correction,
            "too few metrics for multiple-testing correction"
        );
        return CorrectionInfo::skipped(
            format!("fewer than {} metrics", config.min_metrics_for_correction),
            n_metrics,
            config.alpha,
        );
    }

    let raw: Vec<f64> = reports.iter().map(|r| r.test().p_value()).collect();
    let outcome = benjamini_hochberg(&raw, config.alpha);
    for ((report, &p), &significant) in reports
        .iter_mut()
        .zip(&outcome.corrected_p_values)
        .zip(&outcome.significant_flags)
    {
        report.test_mut().record_correction(p, significant);
    }
    tracing::debug!(
        n_metrics,
        significant = outcome.significant_flags.iter().filter(|s| **s).count(),
        "applied FDR correction"
    );
    CorrectionInfo::applied(outcome.method_name, n_metrics, config.alpha)
}
