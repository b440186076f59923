//! Analysis output
//!
//! [`AnalysisReport`] keeps metric reports in metric-set order and renders
//! the flat JSON mapping consumers expect:
//!
//! ```text
//! {
//!   "<metric_id>": { "test": ..., "p-value": ..., "daily_timeseries": [...], ... },
//!   ...
//!   "_correction_info": { "applied": ..., "method" | "reason": ... }
//! }
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::experiment::Aggregation;
use crate::stats::TestResult;
use crate::timeseries::{MetricTimeSeries, VariantDistribution};
use crate::Result;

/// Key of the correction record in [`AnalysisReport::to_json`].
pub const CORRECTION_INFO_KEY: &str = "_correction_info";

/// Everything computed for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReport {
    metric_id: String,
    aggregation: Aggregation,
    exposed_users: u64,
    #[serde(flatten)]
    test: TestResult,
    distribution: BTreeMap<String, VariantDistribution>,
    #[serde(flatten)]
    series: MetricTimeSeries,
}

impl MetricReport {
    /// Assemble a metric report.
    #[must_use]
    pub fn new(
        metric_id: impl Into<String>,
        aggregation: Aggregation,
        exposed_users: u64,
        test: TestResult,
        distribution: BTreeMap<String, VariantDistribution>,
        series: MetricTimeSeries,
    ) -> Self {
        Self {
            metric_id: metric_id.into(),
            aggregation,
            exposed_users,
            test,
            distribution,
            series,
        }
    }

    /// Get the metric ID.
    #[must_use]
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// Get the aggregation type.
    #[must_use]
    pub const fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Distinct users exposed in the experiment.
    #[must_use]
    pub const fn exposed_users(&self) -> u64 {
        self.exposed_users
    }

    /// Hypothesis test outcome.
    #[must_use]
    pub const fn test(&self) -> &TestResult {
        &self.test
    }

    /// Mutable test outcome, for the correction step.
    pub fn test_mut(&mut self) -> &mut TestResult {
        &mut self.test
    }

    /// Per-variant distribution.
    #[must_use]
    pub const fn distribution(&self) -> &BTreeMap<String, VariantDistribution> {
        &self.distribution
    }

    /// Time-based views.
    #[must_use]
    pub const fn series(&self) -> &MetricTimeSeries {
        &self.series
    }

    /// Render as a JSON object, with a `"significance"` of `"YES"`/`"NO"`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(record) = value.as_object_mut() {
            let flag = if self.test.significant() { "YES" } else { "NO" };
            record.insert("significance".to_string(), flag.into());
        }
        Ok(value)
    }
}

/// Whether and how multiple-testing correction was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionInfo {
    /// Correction ran
    pub applied: bool,
    /// Method name when applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Why correction was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Number of metrics considered
    pub n_metrics: usize,
    /// Significance level used
    pub alpha: f64,
}

impl CorrectionInfo {
    /// Correction ran with `method`.
    #[must_use]
    pub fn applied(method: impl Into<String>, n_metrics: usize, alpha: f64) -> Self {
        Self {
            applied: true,
            method: Some(method.into()),
            reason: None,
            n_metrics,
            alpha,
        }
    }

    /// Correction skipped because of `reason`.
    #[must_use]
    pub fn skipped(reason: impl Into<String>, n_metrics: usize, alpha: f64) -> Self {
        Self {
            applied: false,
            method: None,
            reason: Some(reason.into()),
            n_metrics,
            alpha,
        }
    }
}

/// Result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    experiment_id: String,
    metrics: Vec<MetricReport>,
    correction: CorrectionInfo,
}

impl AnalysisReport {
    /// Assemble a report; `metrics` must be in metric-set order.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        metrics: Vec<MetricReport>,
        correction: CorrectionInfo,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            metrics,
            correction,
        }
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Metric reports in metric-set order.
    #[must_use]
    pub fn metrics(&self) -> &[MetricReport] {
        &self.metrics
    }

    /// Look up a metric by ID.
    #[must_use]
    pub fn metric(&self, metric_id: &str) -> Option<&MetricReport> {
        self.metrics.iter().find(|m| m.metric_id() == metric_id)
    }

    /// Correction record.
    #[must_use]
    pub const fn correction(&self) -> &CorrectionInfo {
        &self.correction
    }

    /// Render `{metric_id: record, ..., "_correction_info": {...}}`.
    ///
    /// Non-finite numbers render as `null`; timestamps as RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut root = serde_json::Map::new();
        for metric in &self.metrics {
            root.insert(metric.metric_id().to_string(), metric.to_json()?);
        }
        root.insert(
            CORRECTION_INFO_KEY.to_string(),
            serde_json::to_value(&self.correction)?,
        );
        Ok(serde_json::Value::Object(root))
    }

    /// [`Self::to_json`] as a pretty-printed string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json()?)?)
    }
}

/// Outcome of [`crate::ExperimentAnalyzer::run`]: callers record request
/// metadata whether or not the analysis succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Analysis finished
    Completed(AnalysisReport),
    /// Analysis failed before producing a report
    Failed {
        /// Human-readable failure
        message: String,
    },
}

impl AnalysisOutcome {
    /// `"completed"` or `"failed"`
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// The report, if the analysis completed.
    #[must_use]
    pub const fn report(&self) -> Option<&AnalysisReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }

    /// The failure message, if the analysis failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Failed { message } => Some(message),
        }
    }
}

impl From<Result<AnalysisReport>> for AnalysisOutcome {
    fn from(result: Result<AnalysisReport>) -> Self {
        match result {
            Ok(report) => Self::Completed(report),
            Err(e) => Self::Failed {
                message: e.to_string(),
            },
        }
    }
}
