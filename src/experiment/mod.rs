//! Experiment Data Model
//!
//! Value objects the analysis engine consumes. All of them are created fresh
//! per analysis request and never mutated after construction.
//!
//! ## Schema Overview
//!
//! ```text
//! ExposureRecord (user, experiment, variant, exposure_time)
//!        │ user_id
//!        ├──< EventRecord (user, event_name, event_time, event_value?)
//!        │
//! MetricSet ──< MetricDefinition (metric_id, event_name, window, aggregation)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use trueno_ab::experiment::{
//!     Aggregation, EventRecord, ExposureRecord, MetricDefinition, MetricWindow,
//! };
//!
//! # fn main() -> trueno_ab::Result<()> {
//! let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
//! let exposure = ExposureRecord::new("user-1", "exp-42", "A", at);
//! let event = EventRecord::builder("user-1", "purchase", at).value(19.99).build();
//!
//! let metric = MetricDefinition::new(
//!     "revenue",
//!     "purchase",
//!     MetricWindow::parse("0 days", "7 days")?,
//!     Aggregation::Sum,
//! );
//! assert_eq!(metric.event_name(), event.event_name());
//! assert_eq!(exposure.variant(), "A");
//! # Ok(())
//! # }
//! ```

mod duration;
mod event_record;
mod exposure_record;
mod metric_definition;

pub use duration::{format_duration, parse_duration};
pub use event_record::{EventRecord, EventRecordBuilder};
pub use exposure_record::{filter_experiment, ExposureRecord};
pub use metric_definition::{
    Aggregation, EventSpec, MetricDefinition, MetricSet, MetricSpec, MetricWindow, WindowSpec,
};

/// Control variant label
pub const CONTROL: &str = "A";

/// Treatment variant label
pub const TREATMENT: &str = "B";
