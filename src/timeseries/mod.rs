//! Time series over exposure-time buckets
//!
//! Every series is anchored to `exposure_time`: an event counts toward the
//! bucket in which its user was exposed, not the bucket in which it fired.
//!
//! ```text
//! exposures ─┬─> daily_series ──> cumulative_series ──> lift_series
//!            │
//! per-user ──┴─> confidence_series      distribution (whole-window)
//! ```

mod bucket;
mod distribution;
mod interval;
mod lift;

pub use bucket::BucketWidth;
pub use distribution::{distribution, Histogram, ValueSummary, VariantDistribution};
pub use interval::{confidence_series, ConfidencePoint};
pub use lift::{lift_series, LiftPoint};

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::aggregation::UserMetricRow;
use crate::attribution::WindowedEvent;
use crate::config::AnalysisConfig;
use crate::experiment::{Aggregation, ExposureRecord, MetricDefinition};
use crate::Result;

/// One `(bucket, variant)` cell of the daily series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    date: DateTime<Utc>,
    variant: String,
    metric_value: f64,
    exposed_users: u64,
    metric_total: f64,
}

impl TimeSeriesPoint {
    /// Bucket start.
    #[must_use]
    pub const fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Variant label.
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// `metric_total / exposed_users`, 0 for an empty bucket.
    #[must_use]
    pub const fn metric_value(&self) -> f64 {
        self.metric_value
    }

    /// Distinct users exposed in the bucket.
    #[must_use]
    pub const fn exposed_users(&self) -> u64 {
        self.exposed_users
    }

    /// Converters, value sum or event count of the bucket's cohort.
    #[must_use]
    pub const fn metric_total(&self) -> f64 {
        self.metric_total
    }
}

/// Running totals of one variant up to and including `date`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    date: DateTime<Utc>,
    variant: String,
    metric_value: f64,
    cumulative_exposed_users: u64,
    cumulative_metric_total: f64,
}

impl CumulativePoint {
    /// Bucket start.
    #[must_use]
    pub const fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Variant label.
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// `cumulative_metric_total / cumulative_exposed_users`, 0 when nobody
    /// is exposed yet.
    #[must_use]
    pub const fn metric_value(&self) -> f64 {
        self.metric_value
    }

    /// Exposed users so far.
    #[must_use]
    pub const fn cumulative_exposed_users(&self) -> u64 {
        self.cumulative_exposed_users
    }

    /// Metric total so far.
    #[must_use]
    pub const fn cumulative_metric_total(&self) -> f64 {
        self.cumulative_metric_total
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(total: f64, users: u64) -> f64 {
    if users == 0 {
        0.0
    } else {
        total / users as f64
    }
}

/// Distinct variant labels, sorted lexically.
#[must_use]
pub fn sorted_variants(exposures: &[ExposureRecord]) -> Vec<&str> {
    let mut variants: Vec<&str> = exposures
        .iter()
        .map(ExposureRecord::variant)
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    variants.sort_unstable();
    variants
}

/// Bucket grid spanning the earliest to the latest exposure.
#[must_use]
pub fn exposure_grid(exposures: &[ExposureRecord], width: BucketWidth) -> Vec<DateTime<Utc>> {
    let times = exposures.iter().map(ExposureRecord::exposure_time);
    match (times.clone().min(), times.max()) {
        (Some(first), Some(last)) => width.grid(first, last),
        _ => Vec::new(),
    }
}

/// Per-bucket metric by variant.
///
/// The grid is complete: every bucket between the first and last exposure
/// appears once per observed variant, with zeros where nothing happened.
/// Points are ordered by date, then variant.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn daily_series(
    exposures: &[ExposureRecord],
    windowed: &[WindowedEvent<'_>],
    metric: &MetricDefinition,
) -> Vec<TimeSeriesPoint> {
    let width = BucketWidth::for_window(metric.window());

    let mut exposed: FxHashMap<(DateTime<Utc>, &str), FxHashSet<&str>> = FxHashMap::default();
    for exposure in exposures {
        exposed
            .entry((width.floor(exposure.exposure_time()), exposure.variant()))
            .or_default()
            .insert(exposure.user_id());
    }

    let mut totals: FxHashMap<(DateTime<Utc>, &str), f64> = FxHashMap::default();
    let mut converters: FxHashMap<(DateTime<Utc>, &str), FxHashSet<&str>> = FxHashMap::default();
    for w in windowed {
        let key = (width.floor(w.exposure_time()), w.variant());
        match metric.aggregation() {
            Aggregation::Binary => {
                converters.entry(key).or_default().insert(w.user_id());
            }
            Aggregation::Sum => *totals.entry(key).or_default() += w.event().value_or_zero(),
            Aggregation::Count => *totals.entry(key).or_default() += 1.0,
        }
    }
    for (key, users) in converters {
        totals.insert(key, users.len() as f64);
    }

    let variants = sorted_variants(exposures);
    let grid = exposure_grid(exposures, width);
    let mut points = Vec::with_capacity(grid.len() * variants.len());
    for date in grid {
        for &variant in &variants {
            let key = (date, variant);
            let exposed_users = exposed.get(&key).map_or(0, |users| users.len() as u64);
            let metric_total = totals.get(&key).copied().unwrap_or(0.0);
            points.push(TimeSeriesPoint {
                date,
                variant: variant.to_string(),
                metric_value: ratio(metric_total, exposed_users),
                exposed_users,
                metric_total,
            });
        }
    }

    tracing::debug!(
        metric_id = metric.metric_id(),
        ?width,
        points = points.len(),
        "built daily series"
    );
    points
}

/// Running sums of a daily series, per variant in date order.
#[must_use]
pub fn cumulative_series(daily: &[TimeSeriesPoint]) -> Vec<CumulativePoint> {
    let mut running: FxHashMap<&str, (u64, f64)> = FxHashMap::default();
    let mut ordered: Vec<&TimeSeriesPoint> = daily.iter().collect();
    ordered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.variant.cmp(&b.variant)));

    ordered
        .into_iter()
        .map(|point| {
            let (users, total) = running.entry(point.variant()).or_default();
            *users += point.exposed_users;
            *total += point.metric_total;
            CumulativePoint {
                date: point.date,
                variant: point.variant.clone(),
                metric_value: ratio(*total, *users),
                cumulative_exposed_users: *users,
                cumulative_metric_total: *total,
            }
        })
        .collect()
}

/// All time-based views of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTimeSeries {
    /// Per-bucket values
    #[serde(rename = "daily_timeseries")]
    pub daily: Vec<TimeSeriesPoint>,
    /// Running values
    #[serde(rename = "cumulative_timeseries")]
    pub cumulative: Vec<CumulativePoint>,
    /// Relative lift of B over A
    #[serde(rename = "lift_timeseries")]
    pub lift: Vec<LiftPoint>,
    /// Per-variant interval over growing cohorts
    #[serde(rename = "ci_timeseries")]
    pub confidence: Vec<ConfidencePoint>,
}

impl MetricTimeSeries {
    /// Build every series for one metric. `rows` must be the per-user table
    /// for `exposures` (one row per exposure, same order).
    ///
    /// # Errors
    ///
    /// Propagates interval failures from [`confidence_series`].
    pub fn build(
        exposures: &[ExposureRecord],
        windowed: &[WindowedEvent<'_>],
        rows: &[UserMetricRow],
        metric: &MetricDefinition,
        config: &AnalysisConfig,
    ) -> Result<Self> {
        let daily = daily_series(exposures, windowed, metric);
        let cumulative = cumulative_series(&daily);
        let lift = lift_series(&cumulative, config.lift_horizon());
        let confidence = confidence_series(
            exposures,
            rows,
            metric.aggregation(),
            BucketWidth::for_window(metric.window()),
            config.confidence_level,
        )?;
        Ok(Self {
            daily,
            cumulative,
            lift,
            confidence,
        })
    }
}
