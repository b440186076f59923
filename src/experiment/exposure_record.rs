//! Exposure Record - a user entering an experiment under a variant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exposure Record represents one user being assigned to a variant.
///
/// Well-formed input has at most one exposure per user per experiment.
/// Duplicates are not removed; they fan out during attribution and count
/// twice in every denominator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExposureRecord {
    user_id: String,
    experiment_id: String,
    variant: String,
    exposure_time: DateTime<Utc>,
}

impl ExposureRecord {
    /// Create a new exposure record.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Exposed user
    /// * `experiment_id` - Experiment the exposure belongs to
    /// * `variant` - Assigned variant (`"A"` control, `"B"` treatment)
    /// * `exposure_time` - When the user was exposed
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        variant: impl Into<String>,
        exposure_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            experiment_id: experiment_id.into(),
            variant: variant.into(),
            exposure_time,
        }
    }

    /// Get the user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the assigned variant.
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Get the exposure timestamp.
    #[must_use]
    pub const fn exposure_time(&self) -> DateTime<Utc> {
        self.exposure_time
    }
}

/// Restrict exposures to one experiment.
///
/// Identifiers are compared as strings, so numeric experiment IDs loaded
/// from a table match their textual form.
#[must_use]
pub fn filter_experiment(exposures: &[ExposureRecord], experiment_id: &str) -> Vec<ExposureRecord> {
    exposures
        .iter()
        .filter(|e| e.experiment_id() == experiment_id)
        .cloned()
        .collect()
}
