//! Relative lift of treatment over control, bucket by bucket

use chrono::{DateTime, TimeDelta, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::CumulativePoint;
use crate::experiment::{CONTROL, TREATMENT};

/// Lift at one bucket of the cumulative series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiftPoint {
    /// Bucket start
    pub date: DateTime<Utc>,
    /// `(B - A) / A`, 0 when A is 0
    pub lift: f64,
    /// Display hint: the bucket lies past the configured horizon. Not a
    /// statistical claim.
    pub expected_significance: bool,
}

/// Pivot the cumulative series on `"A"`/`"B"` and compute lift per bucket.
///
/// Returns an empty series when either variant is absent.
#[must_use]
pub fn lift_series(cumulative: &[CumulativePoint], horizon: TimeDelta) -> Vec<LiftPoint> {
    let mut control: FxHashMap<DateTime<Utc>, f64> = FxHashMap::default();
    let mut treatment: Vec<(DateTime<Utc>, f64)> = Vec::new();
    for point in cumulative {
        match point.variant() {
            CONTROL => {
                control.insert(point.date(), point.metric_value());
            }
            TREATMENT => treatment.push((point.date(), point.metric_value())),
            _ => {}
        }
    }
    if control.is_empty() || treatment.is_empty() {
        tracing::debug!("lift series skipped: control or treatment missing");
        return Vec::new();
    }
    treatment.sort_by_key(|(date, _)| *date);

    let mut points: Vec<LiftPoint> = treatment
        .into_iter()
        .filter_map(|(date, b)| {
            control.get(&date).map(|&a| LiftPoint {
                date,
                lift: if a.abs() > 0.0 { (b - a) / a } else { 0.0 },
                expected_significance: false,
            })
        })
        .collect();

    if let Some(first) = points.first().map(|p| p.date) {
        for point in &mut points {
            point.expected_significance = point.date - first > horizon;
        }
    }
    points
}
