//! Whole-window distribution of per-user values

use std::collections::BTreeMap;

use serde::Serialize;

use crate::aggregation::{variant_values, UserMetricRow};
use crate::experiment::Aggregation;
use crate::stats::{mean, percentile_sorted, sample_std, sorted_copy};

const MIN_BINS: usize = 10;
const MAX_BINS: usize = 50;

/// Equal-width histogram. `edges` has one more entry than `counts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// Bin edges, ascending
    #[serde(rename = "bins")]
    pub edges: Vec<f64>,
    /// Samples per bin
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Freedman-Diaconis histogram: bin width `2 * IQR / n^(1/3)`, bin
    /// count clamped to `[10, 50]`. Zero IQR or a single distinct value
    /// falls back to 10 bins.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn freedman_diaconis(samples: &[f64]) -> Self {
        let sorted = sorted_copy(samples);
        let (lo, hi, bins) = match (sorted.first(), sorted.last()) {
            (Some(&min), Some(&max)) if max > min => {
                let iqr = percentile_sorted(&sorted, 75.0) - percentile_sorted(&sorted, 25.0);
                let bins = if iqr > 0.0 {
                    let width = 2.0 * iqr / (sorted.len() as f64).cbrt();
                    (((max - min) / width).ceil() as usize).clamp(MIN_BINS, MAX_BINS)
                } else {
                    MIN_BINS
                };
                (min, max, bins)
            }
            (Some(&only), Some(_)) => (only - 0.5, only + 0.5, MIN_BINS),
            _ => (0.0, 1.0, MIN_BINS),
        };

        let span = hi - lo;
        let edges = (0..=bins)
            .map(|i| lo + span * i as f64 / bins as f64)
            .collect();
        let mut counts = vec![0_u64; bins];
        for &value in &sorted {
            let idx = (((value - lo) / span) * bins as f64).floor().max(0.0) as usize;
            counts[idx.min(bins - 1)] += 1;
        }
        Self { edges, counts }
    }

    /// Number of bins.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }
}

/// Summary of a sum/count metric for one variant. Moments and percentiles
/// cover every user; the histogram and `values` cover nonzero users only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSummary {
    /// Histogram of nonzero values
    #[serde(flatten)]
    pub histogram: Histogram,
    /// Nonzero values
    pub values: Vec<f64>,
    /// Mean over all users
    pub mean: f64,
    /// Median over all users
    pub median: f64,
    /// Sample standard deviation over all users
    pub std: f64,
    /// 25th percentile
    pub p25: f64,
    /// 75th percentile
    pub p75: f64,
    /// 95th percentile
    pub p95: f64,
    /// Users whose value is 0
    pub zero_count: u64,
}

/// Distribution of one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariantDistribution {
    /// Binary metrics
    Binary {
        /// Users with value 1
        converted: u64,
        /// Users with value 0
        not_converted: u64,
        /// `converted / n`
        conversion_rate: f64,
    },
    /// Sum and count metrics
    Values(ValueSummary),
}

/// Per-variant distribution keyed `"variant_<label>"`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn distribution(
    rows: &[UserMetricRow],
    aggregation: Aggregation,
) -> BTreeMap<String, VariantDistribution> {
    let mut variants: Vec<&str> = rows.iter().map(UserMetricRow::variant).collect();
    variants.sort_unstable();
    variants.dedup();

    variants
        .into_iter()
        .map(|variant| {
            let values = variant_values(rows, variant);
            let summary = match aggregation {
                Aggregation::Binary => {
                    let converted = values.iter().filter(|v| **v > 0.0).count() as u64;
                    let n = values.len() as u64;
                    VariantDistribution::Binary {
                        converted,
                        not_converted: n - converted,
                        conversion_rate: if n == 0 { 0.0 } else { converted as f64 / n as f64 },
                    }
                }
                Aggregation::Sum | Aggregation::Count => {
                    VariantDistribution::Values(summarize(&values))
                }
            };
            (format!("variant_{variant}"), summary)
        })
        .collect()
}

fn summarize(values: &[f64]) -> ValueSummary {
    let sorted = sorted_copy(values);
    let nonzero: Vec<f64> = values.iter().copied().filter(|v| v.abs() > 0.0).collect();
    ValueSummary {
        histogram: Histogram::freedman_diaconis(&nonzero),
        zero_count: (values.len() - nonzero.len()) as u64,
        values: nonzero,
        mean: mean(values),
        median: percentile_sorted(&sorted, 50.0),
        std: sample_std(values),
        p25: percentile_sorted(&sorted, 25.0),
        p75: percentile_sorted(&sorted, 75.0),
        p95: percentile_sorted(&sorted, 95.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(variant: &str, values: &[f64]) -> Vec<UserMetricRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| UserMetricRow::new(format!("{variant}{i}"), variant, *v))
            .collect()
    }

    #[test]
    fn test_binary_counts() {
        let mut table = rows("A", &[1.0, 0.0, 0.0, 1.0]);
        table.extend(rows("B", &[1.0]));
        let dist = distribution(&table, Aggregation::Binary);
        assert_eq!(dist.len(), 2);
        assert_eq!(
            dist["variant_A"],
            VariantDistribution::Binary {
                converted: 2,
                not_converted: 2,
                conversion_rate: 0.5
            }
        );
        let json = serde_json::to_value(&dist).unwrap();
        assert_eq!(json["variant_B"]["converted"], 1);
    }

    #[test]
    fn test_value_summary() {
        let table = rows("A", &[0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let dist = distribution(&table, Aggregation::Sum);
        let VariantDistribution::Values(summary) = &dist["variant_A"] else {
            panic!("expected value summary");
        };
        assert_eq!(summary.zero_count, 2);
        assert_eq!(summary.values.len(), 8);
        assert!((summary.mean - 3.6).abs() < 1e-12);
        assert!((summary.median - 3.5).abs() < 1e-12);
        assert_eq!(summary.histogram.counts.iter().sum::<u64>(), 8);
        assert_eq!(summary.histogram.edges.len(), summary.histogram.bin_count() + 1);

        let json = serde_json::to_value(&dist).unwrap();
        assert!(json["variant_A"]["bins"].is_array());
        assert!(json["variant_A"]["p95"].is_number());
    }

    #[test]
    fn test_histogram_bin_clamp() {
        let uniform: Vec<f64> = (1..=1000).map(f64::from).collect();
        let hist = Histogram::freedman_diaconis(&uniform);
        assert!((MIN_BINS..=MAX_BINS).contains(&hist.bin_count()));
        assert_eq!(hist.counts.iter().sum::<u64>(), 1000);

        let mut skewed = vec![1.0; 100];
        skewed.push(1_000_000.0);
        assert_eq!(Histogram::freedman_diaconis(&skewed).bin_count(), MIN_BINS);
    }

    #[test]
    fn test_histogram_degenerate() {
        let constant = Histogram::freedman_diaconis(&[4.0, 4.0, 4.0]);
        assert_eq!(constant.bin_count(), MIN_BINS);
        assert_eq!(constant.counts.iter().sum::<u64>(), 3);

        let empty = Histogram::freedman_diaconis(&[]);
        assert_eq!(empty.bin_count(), MIN_BINS);
        assert!(empty.counts.iter().all(|c| *c == 0));
    }
}
