//! Event attribution and windowing
//!
//! Joins behavioral events to the exposure of the user who emitted them and
//! keeps the ones inside a metric's window:
//!
//! 1. filter events by the metric's `event_name`
//! 2. inner hash-join on `user_id` (events of unexposed users are dropped)
//! 3. keep `start <= event_time - exposure_time <= end`
//!
//! A user with several exposures fans out into one windowed row per
//! exposure. Exposures without events produce nothing here; aggregation
//! fills them with zero.

use chrono::{DateTime, TimeDelta, Utc};
use rustc_hash::FxHashMap;

use crate::experiment::{EventRecord, ExposureRecord, MetricDefinition};

/// An event joined to its user's exposure. Borrowed from the input tables
/// and never outlives one analysis.
#[derive(Debug, Clone, Copy)]
pub struct WindowedEvent<'a> {
    exposure: &'a ExposureRecord,
    event: &'a EventRecord,
    time_since_exposure: TimeDelta,
}

impl<'a> WindowedEvent<'a> {
    /// Exposure the event was attributed to.
    #[must_use]
    pub const fn exposure(&self) -> &'a ExposureRecord {
        self.exposure
    }

    /// The underlying event.
    #[must_use]
    pub const fn event(&self) -> &'a EventRecord {
        self.event
    }

    /// User ID shared by exposure and event.
    #[must_use]
    pub fn user_id(&self) -> &'a str {
        self.exposure.user_id()
    }

    /// Variant of the attributed exposure.
    #[must_use]
    pub fn variant(&self) -> &'a str {
        self.exposure.variant()
    }

    /// Exposure timestamp of the attributed exposure.
    #[must_use]
    pub const fn exposure_time(&self) -> DateTime<Utc> {
        self.exposure.exposure_time()
    }

    /// Event timestamp.
    #[must_use]
    pub const fn event_time(&self) -> DateTime<Utc> {
        self.event.event_time()
    }

    /// `event_time - exposure_time`
    #[must_use]
    pub const fn time_since_exposure(&self) -> TimeDelta {
        self.time_since_exposure
    }
}

/// Exposures grouped by user for hash-joins. Build once per analysis and
/// reuse across metrics.
#[derive(Debug)]
pub struct ExposureIndex<'a> {
    by_user: FxHashMap<&'a str, Vec<&'a ExposureRecord>>,
}

impl<'a> ExposureIndex<'a> {
    /// Index exposures by `user_id`, keeping input order per user.
    #[must_use]
    pub fn new(exposures: &'a [ExposureRecord]) -> Self {
        let mut by_user: FxHashMap<&'a str, Vec<&'a ExposureRecord>> = FxHashMap::default();
        for exposure in exposures {
            by_user.entry(exposure.user_id()).or_default().push(exposure);
        }
        Self { by_user }
    }

    /// Exposures of one user (empty when unexposed).
    #[must_use]
    pub fn exposures_of(&self, user_id: &str) -> &[&'a ExposureRecord] {
        self.by_user.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct exposed users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}

/// Attribute events to exposures and keep those inside the metric window.
///
/// # Example
///
/// ```
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use trueno_ab::attribution::attribute_events;
/// use trueno_ab::experiment::{
///     Aggregation, EventRecord, ExposureRecord, MetricDefinition, MetricWindow,
/// };
///
/// # fn main() -> trueno_ab::Result<()> {
/// let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let exposures = vec![ExposureRecord::new("u1", "exp", "A", t0)];
/// let events = vec![
///     EventRecord::new("u1", "purchase", t0 + TimeDelta::days(2)),
///     EventRecord::new("u1", "purchase", t0 + TimeDelta::days(9)),
///     EventRecord::new("u2", "purchase", t0 + TimeDelta::days(1)),
/// ];
/// let metric = MetricDefinition::new(
///     "conv", "purchase", MetricWindow::parse("0 days", "7 days")?, Aggregation::Binary,
/// );
///
/// let windowed = attribute_events(&exposures, &events, &metric);
/// assert_eq!(windowed.len(), 1);
/// assert_eq!(windowed[0].time_since_exposure(), TimeDelta::days(2));
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn attribute_events<'a>(
    exposures: &'a [ExposureRecord],
    events: &'a [EventRecord],
    metric: &MetricDefinition,
) -> Vec<WindowedEvent<'a>> {
    let index = ExposureIndex::new(exposures);
    attribute_with_index(&index, events, metric)
}

/// [`attribute_events`] against a prebuilt [`ExposureIndex`].
#[must_use]
pub fn attribute_with_index<'a>(
    index: &ExposureIndex<'a>,
    events: &'a [EventRecord],
    metric: &MetricDefinition,
) -> Vec<WindowedEvent<'a>> {
    let window = metric.window();
    let windowed: Vec<WindowedEvent<'a>> = events
        .iter()
        .filter(|event| event.event_name() == metric.event_name())
        .flat_map(|event| {
            index
                .exposures_of(event.user_id())
                .iter()
                .map(move |&exposure| WindowedEvent {
                    exposure,
                    event,
                    time_since_exposure: event.event_time() - exposure.exposure_time(),
                })
        })
        .filter(|w| window.contains(w.time_since_exposure))
        .collect();

    tracing::debug!(
        metric_id = metric.metric_id(),
        event_name = metric.event_name(),
        windowed = windowed.len(),
        "attributed events to exposures"
    );
    windowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{Aggregation, MetricWindow};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn metric(start: &str, end: &str) -> MetricDefinition {
        MetricDefinition::new(
            "m",
            "purchase",
            MetricWindow::parse(start, end).unwrap(),
            Aggregation::Count,
        )
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let exposures = vec![ExposureRecord::new("u1", "e", "A", t0())];
        let events = vec![
            EventRecord::new("u1", "purchase", t0()),
            EventRecord::new("u1", "purchase", t0() + TimeDelta::days(7)),
            EventRecord::new("u1", "purchase", t0() + TimeDelta::days(7) + TimeDelta::seconds(1)),
            EventRecord::new("u1", "purchase", t0() - TimeDelta::seconds(1)),
        ];
        let windowed = attribute_events(&exposures, &events, &metric("0 days", "7 days"));
        assert_eq!(windowed.len(), 2);
    }

    #[test]
    fn test_negative_start_captures_baseline() {
        let exposures = vec![ExposureRecord::new("u1", "e", "B", t0())];
        let events = vec![EventRecord::new("u1", "purchase", t0() - TimeDelta::minutes(30))];
        let windowed = attribute_events(&exposures, &events, &metric("-1 hours", "0 days"));
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].time_since_exposure(), TimeDelta::minutes(-30));
        assert_eq!(windowed[0].variant(), "B");
    }

    #[test]
    fn test_inner_join_drops_unexposed_users_and_other_events() {
        let exposures = vec![ExposureRecord::new("u1", "e", "A", t0())];
        let events = vec![
            EventRecord::new("ghost", "purchase", t0()),
            EventRecord::new("u1", "page_view", t0()),
            EventRecord::new("u1", "purchase", t0() + TimeDelta::hours(1)),
        ];
        let windowed = attribute_events(&exposures, &events, &metric("0 days", "1 days"));
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].user_id(), "u1");
    }

    #[test]
    fn test_duplicate_exposures_fan_out() {
        let exposures = vec![
            ExposureRecord::new("u1", "e", "A", t0()),
            ExposureRecord::new("u1", "e", "A", t0() + TimeDelta::hours(1)),
        ];
        let events = vec![EventRecord::new("u1", "purchase", t0() + TimeDelta::hours(2))];
        let windowed = attribute_events(&exposures, &events, &metric("0 days", "1 days"));
        assert_eq!(windowed.len(), 2);
    }

    #[test]
    fn test_exposure_index() {
        let exposures = vec![
            ExposureRecord::new("u1", "e", "A", t0()),
            ExposureRecord::new("u2", "e", "B", t0()),
        ];
        let index = ExposureIndex::new(&exposures);
        assert_eq!(index.user_count(), 2);
        assert_eq!(index.exposures_of("u2").len(), 1);
        assert!(index.exposures_of("nobody").is_empty());
    }
}
