//! Confidence interval over time
//!
//! At each bucket the interval covers every user exposed up to and
//! including that bucket, so it narrows as the cohort grows.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::{exposure_grid, sorted_variants, BucketWidth};
use crate::aggregation::UserMetricRow;
use crate::experiment::{Aggregation, ExposureRecord};
use crate::stats::{binomial_interval, t_interval_from_moments, RunningMoments};
use crate::{Error, Result};

/// Interval of one variant at one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidencePoint {
    /// Bucket start
    pub date: DateTime<Utc>,
    /// Variant label
    pub variant: String,
    /// Rate or mean of the cohort so far
    pub metric_value: f64,
    /// Lower bound
    pub ci_lower: f64,
    /// Upper bound
    pub ci_upper: f64,
    /// Users in the cohort so far
    pub sample_size: u64,
}

/// Build the per-variant interval series.
///
/// `rows` is the per-user table of `exposures` (same length and order).
/// Cohorts with fewer than two users report zeros.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `rows` and `exposures` differ in
/// length, and propagates interval errors.
#[allow(clippy::cast_precision_loss)]
pub fn confidence_series(
    exposures: &[ExposureRecord],
    rows: &[UserMetricRow],
    aggregation: Aggregation,
    width: BucketWidth,
    confidence: f64,
) -> Result<Vec<ConfidencePoint>> {
    if exposures.len() != rows.len() {
        return Err(Error::InvalidInput(format!(
            "per-user table has {} rows for {} exposures",
            rows.len(),
            exposures.len()
        )));
    }

    let mut by_variant: FxHashMap<&str, Vec<(DateTime<Utc>, f64)>> = FxHashMap::default();
    for (exposure, row) in exposures.iter().zip(rows) {
        by_variant
            .entry(exposure.variant())
            .or_default()
            .push((width.floor(exposure.exposure_time()), row.metric_value()));
    }
    for cohort in by_variant.values_mut() {
        cohort.sort_by_key(|(bucket, _)| *bucket);
    }

    let grid = exposure_grid(exposures, width);
    let variants = sorted_variants(exposures);
    let mut points = Vec::with_capacity(grid.len() * variants.len());

    for variant in variants {
        let cohort = by_variant.get(variant).map_or(&[][..], Vec::as_slice);
        let mut moments = RunningMoments::new();
        let mut successes = 0_u64;
        let mut next = 0;

        for &date in &grid {
            while let Some(&(bucket, value)) = cohort.get(next) {
                if bucket > date {
                    break;
                }
                moments.push(value);
                if value > 0.0 {
                    successes += 1;
                }
                next += 1;
            }

            let n = moments.count();
            let (metric_value, ci_lower, ci_upper) = if n < 2 {
                (0.0, 0.0, 0.0)
            } else {
                match aggregation {
                    Aggregation::Binary => {
                        let ci = binomial_interval(successes, n as u64, confidence)?;
                        (successes as f64 / n as f64, ci.lower, ci.upper)
                    }
                    Aggregation::Sum | Aggregation::Count => {
                        let ci = t_interval_from_moments(
                            n,
                            moments.mean(),
                            moments.sample_variance().sqrt(),
                            confidence,
                        )?;
                        (moments.mean(), ci.lower, ci.upper)
                    }
                }
            };
            points.push(ConfidencePoint {
                date,
                variant: variant.to_string(),
                metric_value,
                ci_lower,
                ci_upper,
                sample_size: n as u64,
            });
        }
    }

    points.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.variant.cmp(&b.variant)));
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
    }

    fn table(entries: &[(&str, &str, u32, f64)]) -> (Vec<ExposureRecord>, Vec<UserMetricRow>) {
        entries
            .iter()
            .map(|&(user, variant, d, value)| {
                (
                    ExposureRecord::new(user, "e", variant, day(d)),
                    UserMetricRow::new(user, variant, value),
                )
            })
            .unzip()
    }

    #[test]
    fn test_small_cohorts_report_zeros() {
        let (exposures, rows) = table(&[("u1", "A", 1, 5.0), ("u2", "A", 2, 7.0)]);
        let points =
            confidence_series(&exposures, &rows, Aggregation::Sum, BucketWidth::Daily, 0.95)
                .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].sample_size, 1);
        assert!(points[0].metric_value.abs() < f64::EPSILON);
        assert!(points[0].ci_upper.abs() < f64::EPSILON);
        assert_eq!(points[1].sample_size, 2);
        assert!((points[1].metric_value - 6.0).abs() < 1e-12);
        assert!(points[1].ci_lower < 6.0 && points[1].ci_upper > 6.0);
    }

    #[test]
    fn test_binary_cohort_grows() {
        let (exposures, rows) = table(&[
            ("u1", "A", 1, 1.0),
            ("u2", "A", 1, 0.0),
            ("u3", "A", 2, 1.0),
            ("u4", "A", 2, 1.0),
        ]);
        let points =
            confidence_series(&exposures, &rows, Aggregation::Binary, BucketWidth::Daily, 0.95)
                .unwrap();
        assert!((points[0].metric_value - 0.5).abs() < 1e-12);
        assert!((points[1].metric_value - 0.75).abs() < 1e-12);
        assert_eq!(points[1].sample_size, 4);
        assert!(points[1].ci_lower <= 0.75 && 0.75 <= points[1].ci_upper);
    }

    #[test]
    fn test_variant_absent_from_early_buckets() {
        let (exposures, rows) = table(&[
            ("u1", "A", 1, 1.0),
            ("u2", "A", 1, 2.0),
            ("u3", "B", 3, 4.0),
        ]);
        let points =
            confidence_series(&exposures, &rows, Aggregation::Count, BucketWidth::Daily, 0.95)
                .unwrap();
        // 3 days x 2 variants, ordered by date then variant
        assert_eq!(points.len(), 6);
        assert_eq!(points[1].variant, "B");
        assert_eq!(points[1].sample_size, 0);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let (exposures, _) = table(&[("u1", "A", 1, 1.0)]);
        assert!(
            confidence_series(&exposures, &[], Aggregation::Sum, BucketWidth::Daily, 0.95).is_err()
        );
    }
}
