//! Time buckets for the series builders

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::experiment::MetricWindow;

/// Bucket granularity, picked from the metric window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketWidth {
    /// Windows shorter than 3 days
    Hourly,
    /// Windows of 3 to 60 days
    Daily,
    /// Windows longer than 60 days; weeks start Monday 00:00 UTC
    Weekly,
}

impl BucketWidth {
    /// Pick the width for a window of `D = end - start` whole days.
    #[must_use]
    pub fn for_window(window: &MetricWindow) -> Self {
        match window.duration().num_days() {
            days if days < 3 => Self::Hourly,
            days if days > 60 => Self::Weekly,
            _ => Self::Daily,
        }
    }

    /// Length of one bucket.
    #[must_use]
    pub fn step(self) -> TimeDelta {
        match self {
            Self::Hourly => TimeDelta::hours(1),
            Self::Daily => TimeDelta::days(1),
            Self::Weekly => TimeDelta::weeks(1),
        }
    }

    /// Start of the bucket containing `at`.
    #[must_use]
    pub fn floor(self, at: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = at.date_naive().and_time(NaiveTime::MIN).and_utc();
        match self {
            Self::Hourly => midnight + TimeDelta::hours(i64::from(at.hour())),
            Self::Daily => midnight,
            Self::Weekly => {
                midnight - TimeDelta::days(i64::from(at.weekday().num_days_from_monday()))
            }
        }
    }

    /// Every bucket start from the bucket of `first` through the bucket of
    /// `last`, inclusive.
    #[must_use]
    pub fn grid(self, first: DateTime<Utc>, last: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let end = self.floor(last);
        let mut cursor = self.floor(first);
        let mut buckets = Vec::new();
        while cursor <= end {
            buckets.push(cursor);
            cursor += self.step();
        }
        buckets
    }
}
