//! Per-user metric aggregation
//!
//! Collapses windowed events into one value per exposed user. Every
//! exposure row yields exactly one [`UserMetricRow`], in exposure order, so
//! users without qualifying events are present with `0.0`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::attribution::{attribute_events, WindowedEvent};
use crate::experiment::{Aggregation, EventRecord, ExposureRecord, MetricDefinition};

/// One user's metric value within a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetricRow {
    user_id: String,
    variant: String,
    metric_value: f64,
}

impl UserMetricRow {
    /// Create a new row.
    #[must_use]
    pub fn new(user_id: impl Into<String>, variant: impl Into<String>, metric_value: f64) -> Self {
        Self {
            user_id: user_id.into(),
            variant: variant.into(),
            metric_value,
        }
    }

    /// Get the user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the variant.
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Get the aggregated metric value.
    #[must_use]
    pub const fn metric_value(&self) -> f64 {
        self.metric_value
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    events: usize,
    value_sum: f64,
}

/// Reduce windowed events to one row per exposure.
///
/// - `Binary`: 1 when the user has any windowed event, else 0
/// - `Sum`: sum of event values, missing values count as 0
/// - `Count`: number of windowed events
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_per_user(
    exposures: &[ExposureRecord],
    windowed: &[WindowedEvent<'_>],
    aggregation: Aggregation,
) -> Vec<UserMetricRow> {
    let mut per_user: FxHashMap<(&str, &str), Accumulator> = FxHashMap::default();
    for w in windowed {
        let acc = per_user.entry((w.user_id(), w.variant())).or_default();
        acc.events += 1;
        acc.value_sum += w.event().value_or_zero();
    }

    exposures
        .iter()
        .map(|exposure| {
            let acc = per_user
                .get(&(exposure.user_id(), exposure.variant()))
                .copied()
                .unwrap_or_default();
            let value = match aggregation {
                Aggregation::Binary => {
                    if acc.events > 0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                Aggregation::Sum => acc.value_sum,
                Aggregation::Count => acc.events as f64,
            };
            UserMetricRow::new(exposure.user_id(), exposure.variant(), value)
        })
        .collect()
}

/// Attribute and aggregate one metric: the per-user table the hypothesis
/// test and distribution summary consume.
///
/// # Example
///
/// ```
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use trueno_ab::aggregation::analyze_metric;
/// use trueno_ab::experiment::{
///     Aggregation, EventRecord, ExposureRecord, MetricDefinition, MetricWindow,
/// };
///
/// # fn main() -> trueno_ab::Result<()> {
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let exposures = vec![
///     ExposureRecord::new("u1", "exp", "A", t0),
///     ExposureRecord::new("u2", "exp", "B", t0),
/// ];
/// let events = vec![
///     EventRecord::builder("u1", "purchase", t0 + TimeDelta::hours(1)).value(10.0).build(),
///     EventRecord::builder("u1", "purchase", t0 + TimeDelta::hours(2)).value(5.0).build(),
/// ];
/// let metric = MetricDefinition::new(
///     "revenue", "purchase", MetricWindow::parse("0 days", "7 days")?, Aggregation::Sum,
/// );
///
/// let rows = analyze_metric(&exposures, &events, &metric);
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].metric_value(), 15.0);
/// assert_eq!(rows[1].metric_value(), 0.0);
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn analyze_metric(
    exposures: &[ExposureRecord],
    events: &[EventRecord],
    metric: &MetricDefinition,
) -> Vec<UserMetricRow> {
    let windowed = attribute_events(exposures, events, metric);
    aggregate_per_user(exposures, &windowed, metric.aggregation())
}

/// Metric values of one variant, in row order.
#[must_use]
pub fn variant_values(rows: &[UserMetricRow], variant: &str) -> Vec<f64> {
    rows.iter()
        .filter(|r| r.variant() == variant)
        .map(UserMetricRow::metric_value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::MetricWindow;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn metric(aggregation: Aggregation) -> MetricDefinition {
        MetricDefinition::new(
            "m",
            "purchase",
            MetricWindow::parse("0 days", "7 days").unwrap(),
            aggregation,
        )
    }

    fn fixture() -> (Vec<ExposureRecord>, Vec<EventRecord>) {
        let exposures = vec![
            ExposureRecord::new("u1", "e", "A", t0()),
            ExposureRecord::new("u2", "e", "A", t0()),
            ExposureRecord::new("u3", "e", "B", t0()),
        ];
        let events = vec![
            EventRecord::builder("u1", "purchase", t0() + TimeDelta::hours(1)).value(3.0).build(),
            EventRecord::builder("u1", "purchase", t0() + TimeDelta::hours(2)).value(4.0).build(),
            EventRecord::new("u3", "purchase", t0() + TimeDelta::hours(3)),
            EventRecord::builder("u2", "purchase", t0() + TimeDelta::days(30)).value(9.0).build(),
        ];
        (exposures, events)
    }

    fn values(rows: &[UserMetricRow]) -> Vec<f64> {
        rows.iter().map(UserMetricRow::metric_value).collect()
    }

    #[test]
    fn test_binary_ignores_multiplicity() {
        let (exposures, events) = fixture();
        let rows = analyze_metric(&exposures, &events, &metric(Aggregation::Binary));
        assert_eq!(values(&rows), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sum_coerces_missing_values() {
        let (exposures, events) = fixture();
        let rows = analyze_metric(&exposures, &events, &metric(Aggregation::Sum));
        assert_eq!(values(&rows), vec![7.0, 0.0, 0.0]);
    }

    #[test]
    fn test_count_counts_windowed_events() {
        let (exposures, events) = fixture();
        let rows = analyze_metric(&exposures, &events, &metric(Aggregation::Count));
        assert_eq!(values(&rows), vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_one_row_per_exposure_in_order() {
        let (exposures, events) = fixture();
        let rows = analyze_metric(&exposures, &events, &metric(Aggregation::Count));
        assert_eq!(rows.len(), exposures.len());
        for (row, exposure) in rows.iter().zip(&exposures) {
            assert_eq!(row.user_id(), exposure.user_id());
            assert_eq!(row.variant(), exposure.variant());
        }
    }

    #[test]
    fn test_variant_values() {
        let rows = vec![
            UserMetricRow::new("u1", "A", 1.0),
            UserMetricRow::new("u2", "B", 2.0),
            UserMetricRow::new("u3", "A", 3.0),
        ];
        assert_eq!(variant_values(&rows, "A"), vec![1.0, 3.0]);
        assert!(variant_values(&rows, "C").is_empty());
    }
}
