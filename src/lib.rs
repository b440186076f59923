//! # Trueno-AB: A/B Experiment Analysis Engine
//!
//! **Version**: 0.1.0
//!
//! Trueno-AB turns exposure logs (who saw which variant, when) and event logs
//! (what they did afterward) into statistically validated experiment results:
//! per-user metrics, time series, distribution summaries, hypothesis tests and
//! false-discovery-rate correction across metrics.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: exposures are indexed once per run and borrowed by
//!   every metric; no per-metric copies of the input tables
//! - **Poka-Yoke safety**: input tables are schema-checked on load, metric
//!   windows and aggregations are typed before analysis starts
//! - **Heijunka**: per-metric work is independent and levels across the rayon
//!   pool; correction waits for every p-value
//! - **Jidoka**: degenerate statistics report documented sentinels instead of
//!   panicking or producing `NaN`
//!
//! ## Pipeline
//!
//! ```text
//! exposures ──┐
//!             ├─> attribution ─> aggregation ─┬─> stats::run_test ─┐
//! events ─────┘        │                      ├─> distribution     ├─> correction ─> AnalysisReport
//!                      └──> timeseries <──────┘                    │
//!                                              (one pass per metric, fan-out)
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeDelta, TimeZone, Utc};
//! use trueno_ab::experiment::{EventRecord, ExposureRecord, MetricSet};
//! use trueno_ab::{Backend, ExperimentAnalyzer};
//!
//! # fn main() -> trueno_ab::Result<()> {
//! let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let mut exposures = Vec::new();
//! let mut events = Vec::new();
//! for i in 0..40 {
//!     let user = format!("user-{i}");
//!     let variant = if i % 2 == 0 { "A" } else { "B" };
//!     exposures.push(ExposureRecord::new(&user, "exp-1", variant, t0 + TimeDelta::hours(i)));
//!     if i % 3 == 0 {
//!         events.push(EventRecord::new(&user, "purchase", t0 + TimeDelta::hours(i + 1)));
//!     }
//! }
//!
//! let metrics = MetricSet::from_json(r#"{
//!     "conversion": {
//!         "metric_id": "conversion",
//!         "event": {"name": "purchase"},
//!         "window": {"start": "0 days", "end": "7 days"},
//!         "aggregation": "binary"
//!     }
//! }"#)?;
//!
//! let analyzer = ExperimentAnalyzer::builder()
//!     .backend(Backend::Sequential)
//!     .build()?;
//! let report = analyzer.analyze("exp-1", &exposures, &events, &metrics)?;
//!
//! let conversion = report.metric("conversion").unwrap();
//! assert_eq!(conversion.test().detail().name(), "chi-square");
//! assert!(!report.correction().applied);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregation;
pub mod attribution;
pub mod backend;
pub mod config;
pub mod correction;
pub mod error;
pub mod experiment;
pub mod report;
pub mod sample_size;
pub mod stats;
pub mod storage;
pub mod timeseries;

pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use report::{AnalysisOutcome, AnalysisReport, CorrectionInfo, MetricReport};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::aggregation::aggregate_per_user;
use crate::attribution::{attribute_with_index, ExposureIndex};
use crate::backend::BackendDispatcher;
use crate::experiment::{filter_experiment, EventRecord, ExposureRecord, MetricDefinition, MetricSet};
use crate::storage::{EventTable, ExposureTable};
use crate::timeseries::MetricTimeSeries;

/// Per-metric execution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Parallel when there is more than one metric and `rayon` is enabled
    CostBased,
    /// Fan metrics out over the rayon pool
    Parallel,
    /// One metric after another
    Sequential,
}

/// Analysis engine
///
/// Holds only configuration; every call is a pure function of its inputs.
#[derive(Debug, Clone, Default)]
pub struct ExperimentAnalyzer {
    config: AnalysisConfig,
}

impl ExperimentAnalyzer {
    /// Create a new analyzer builder
    #[must_use]
    pub fn builder() -> ExperimentAnalyzerBuilder {
        ExperimentAnalyzerBuilder::default()
    }

    /// Analyzer with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is out of range.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze every metric of `metrics` for one experiment.
    ///
    /// Exposures are restricted to `experiment_id` by string comparison.
    /// Metric reports come back in metric-set order, corrected for multiple
    /// testing when the configuration allows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no exposure belongs to the experiment,
    /// and propagates statistical errors from individual metrics.
    pub fn analyze(
        &self,
        experiment_id: &str,
        exposures: &[ExposureRecord],
        events: &[EventRecord],
        metrics: &MetricSet,
    ) -> Result<AnalysisReport> {
        let exposures = filter_experiment(exposures, experiment_id);
        if exposures.is_empty() {
            return Err(Error::NotFound(experiment_id.to_string()));
        }

        let backend = BackendDispatcher::resolve(self.config.backend, metrics.len());
        tracing::info!(
            experiment_id,
            exposures = exposures.len(),
            events = events.len(),
            metrics = metrics.len(),
            ?backend,
            "starting experiment analysis"
        );

        let index = ExposureIndex::new(&exposures);
        let exposed_users = exposures
            .iter()
            .map(ExposureRecord::user_id)
            .collect::<FxHashSet<_>>()
            .len() as u64;
        let job = MetricJob {
            exposures: &exposures,
            index: &index,
            events,
            exposed_users,
            config: &self.config,
        };

        let mut reports = job.run_all(metrics, backend)?;
        let correction = correction::apply_correction(&mut reports, &self.config);

        tracing::info!(
            experiment_id,
            metrics = reports.len(),
            correction_applied = correction.applied,
            "experiment analysis complete"
        );
        Ok(AnalysisReport::new(experiment_id, reports, correction))
    }

    /// [`Self::analyze`] over Arrow input tables.
    ///
    /// # Errors
    ///
    /// Returns table conversion errors, then anything [`Self::analyze`]
    /// returns.
    pub fn analyze_tables(
        &self,
        experiment_id: &str,
        exposures: &ExposureTable,
        events: &EventTable,
        metrics: &MetricSet,
    ) -> Result<AnalysisReport> {
        let exposures = exposures.to_records()?;
        let events = events.to_records()?;
        self.analyze(experiment_id, &exposures, &events, metrics)
    }

    /// Like [`Self::analyze`], but never fails: errors become
    /// [`AnalysisOutcome::Failed`] so callers can record the request either
    /// way.
    #[must_use]
    pub fn run(
        &self,
        experiment_id: &str,
        exposures: &[ExposureRecord],
        events: &[EventRecord],
        metrics: &MetricSet,
    ) -> AnalysisOutcome {
        let result = self.analyze(experiment_id, exposures, events, metrics);
        if let Err(e) = &result {
            tracing::warn!(experiment_id, error = %e, "experiment analysis failed");
        }
        result.into()
    }
}

/// Shared, read-only inputs of one run.
struct MetricJob<'a> {
    exposures: &'a [ExposureRecord],
    index: &'a ExposureIndex<'a>,
    events: &'a [EventRecord],
    exposed_users: u64,
    config: &'a AnalysisConfig,
}

impl MetricJob<'_> {
    fn run_all(&self, metrics: &MetricSet, backend: Backend) -> Result<Vec<MetricReport>> {
        match backend {
            #[cfg(feature = "rayon")]
            Backend::Parallel => {
                use rayon::prelude::*;
                let definitions: Vec<&MetricDefinition> = metrics.definitions().collect();
                definitions
                    .par_iter()
                    .map(|metric| self.run_one(metric))
                    .collect()
            }
            _ => metrics.definitions().map(|metric| self.run_one(metric)).collect(),
        }
    }

    fn run_one(&self, metric: &MetricDefinition) -> Result<MetricReport> {
        let windowed = attribute_with_index(self.index, self.events, metric);
        let rows = aggregate_per_user(self.exposures, &windowed, metric.aggregation());
        let test = stats::run_test(&rows, metric.aggregation(), self.config)?;
        let distribution = timeseries::distribution(&rows, metric.aggregation());
        let series =
            MetricTimeSeries::build(self.exposures, &windowed, &rows, metric, self.config)?;

        tracing::debug!(
            metric_id = metric.metric_id(),
            test = test.detail().name(),
            p_value = test.p_value(),
            windowed = windowed.len(),
            "metric analyzed"
        );
        Ok(MetricReport::new(
            metric.metric_id(),
            metric.aggregation(),
            self.exposed_users,
            test,
            distribution,
            series,
        ))
    }
}

/// Analyzer builder
#[derive(Debug, Default)]
pub struct ExperimentAnalyzerBuilder {
    config: AnalysisConfig,
}

impl ExperimentAnalyzerBuilder {
    /// Set backend selection strategy
    #[must_use]
    pub const fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the significance level
    #[must_use]
    pub const fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Set the interval confidence level
    #[must_use]
    pub const fn confidence_level(mut self, level: f64) -> Self {
        self.config.confidence_level = level;
        self
    }

    /// Enable or disable multiple-testing correction
    #[must_use]
    pub const fn apply_correction(mut self, apply: bool) -> Self {
        self.config.apply_correction = apply;
        self
    }

    /// Replace the whole configuration
    #[must_use]
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the analyzer
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is out of range
    pub fn build(self) -> Result<ExperimentAnalyzer> {
        ExperimentAnalyzer::new(self.config)
    }
}
