//! Event Record - a behavioral event emitted by a user

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event Record represents one thing a user did.
///
/// `event_value` is only meaningful for sum-aggregated metrics (revenue,
/// items, ...). Missing or non-numeric values count as zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    user_id: String,
    event_name: String,
    event_time: DateTime<Utc>,
    event_value: Option<f64>,
}

impl EventRecord {
    /// Create a new event record without a value.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        event_name: impl Into<String>,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            event_name: event_name.into(),
            event_time,
            event_value: None,
        }
    }

    /// Create a builder for constructing an event record with optional fields.
    #[must_use]
    pub fn builder(
        user_id: impl Into<String>,
        event_name: impl Into<String>,
        event_time: DateTime<Utc>,
    ) -> EventRecordBuilder {
        EventRecordBuilder::new(user_id, event_name, event_time)
    }

    /// Get the user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the event name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Get the event timestamp.
    #[must_use]
    pub const fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    /// Get the event value, if present.
    #[must_use]
    pub const fn event_value(&self) -> Option<f64> {
        self.event_value
    }

    /// Event value with missing and non-finite values coerced to zero.
    #[must_use]
    pub fn value_or_zero(&self) -> f64 {
        self.event_value.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// Builder for `EventRecord`.
#[derive(Debug)]
pub struct EventRecordBuilder {
    user_id: String,
    event_name: String,
    event_time: DateTime<Utc>,
    event_value: Option<f64>,
}

impl EventRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        event_name: impl Into<String>,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            event_name: event_name.into(),
            event_time,
            event_value: None,
        }
    }

    /// Set the event value (`None` leaves it missing).
    #[must_use]
    pub fn value(mut self, value: impl Into<Option<f64>>) -> Self {
        self.event_value = value.into();
        self
    }

    /// Build the `EventRecord`.
    #[must_use]
    pub fn build(self) -> EventRecord {
        EventRecord {
            user_id: self.user_id,
            event_name: self.event_name,
            event_time: self.event_time,
            event_value: self.event_value,
        }
    }
}
