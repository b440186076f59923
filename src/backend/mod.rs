//! Execution backend dispatcher
//!
//! Toyota Way Principles:
//! - Muda elimination: no thread-pool fan-out for a single metric
//! - Heijunka: metrics are independent, so they level across rayon workers

use crate::Backend;

/// Fewest metrics for which cost-based dispatch picks the parallel path.
pub const PARALLEL_METRIC_THRESHOLD: usize = 2;

/// Per-metric execution strategy selection
pub struct BackendDispatcher {
    _private: (),
}

impl BackendDispatcher {
    /// Select a concrete backend for `metric_count` metrics.
    ///
    /// Parallel only pays off with at least
    /// [`PARALLEL_METRIC_THRESHOLD`] metrics and the `rayon` feature.
    #[must_use]
    pub const fn select(metric_count: usize) -> Backend {
        if Self::parallel_available() && metric_count >= PARALLEL_METRIC_THRESHOLD {
            Backend::Parallel
        } else {
            Backend::Sequential
        }
    }

    /// Resolve a requested backend into `Parallel` or `Sequential`.
    ///
    /// `CostBased` defers to [`Self::select`]; `Parallel` degrades to
    /// `Sequential` when built without `rayon`.
    #[must_use]
    pub fn resolve(requested: Backend, metric_count: usize) -> Backend {
        match requested {
            Backend::CostBased => Self::select(metric_count),
            Backend::Parallel if !Self::parallel_available() => {
                tracing::warn!("parallel backend requested without the rayon feature");
                Backend::Sequential
            }
            other => other,
        }
    }

    /// Whether the crate was built with `rayon`.
    #[must_use]
    pub const fn parallel_available() -> bool {
        cfg!(feature = "rayon")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_metric_is_sequential() {
        assert_eq!(BackendDispatcher::select(0), Backend::Sequential);
        assert_eq!(BackendDispatcher::select(1), Backend::Sequential);
    }

    #[test]
    fn test_resolve_never_returns_cost_based() {
        for requested in [Backend::CostBased, Backend::Parallel, Backend::Sequential] {
            for metrics in [0, 1, 2, 10] {
                assert_ne!(
                    BackendDispatcher::resolve(requested, metrics),
                    Backend::CostBased
                );
            }
        }
        assert_eq!(
            BackendDispatcher::resolve(Backend::Sequential, 10),
            Backend::Sequential
        );
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_many_metrics_go_parallel() {
        assert_eq!(BackendDispatcher::select(2), Backend::Parallel);
        assert_eq!(
            BackendDispatcher::resolve(Backend::Parallel, 1),
            Backend::Parallel
        );
    }
}
