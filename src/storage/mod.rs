//! Input tables (Arrow)
//!
//! **Append-Only Design**:
//! - Exposure and event logs arrive as Arrow `RecordBatch`es from an external
//!   loader
//! - Write pattern: append whole batches; every batch of a table shares one
//!   schema
//! - Read pattern: one pass converting columns into typed records
//!
//! Toyota Way Principles:
//! - Poka-Yoke: required columns are checked on append, before any analysis
//! - Jidoka: a malformed timestamp stops the load with the offending row

mod columns;

pub use columns::parse_timestamp;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;

use crate::experiment::{EventRecord, ExposureRecord};
use crate::{Error, Result};

/// Columns every exposure table must carry
pub const EXPOSURE_COLUMNS: [&str; 4] = ["user_id", "experiment_id", "variant", "exposure_time"];

/// Columns every event table must carry
pub const EVENT_COLUMNS: [&str; 3] = ["user_id", "event_name", "event_time"];

/// Optional numeric event column
pub const EVENT_VALUE_COLUMN: &str = "event_value";

/// Required columns absent from `schema`, sorted.
///
/// ```
/// use arrow::datatypes::{DataType, Field, Schema};
/// use trueno_ab::storage::{missing_columns, EVENT_COLUMNS};
///
/// let schema = Schema::new(vec![Field::new("user_id", DataType::Utf8, false)]);
/// assert_eq!(missing_columns(&schema, &EVENT_COLUMNS), vec!["event_name", "event_time"]);
/// ```
#[must_use]
pub fn missing_columns(schema: &Schema, required: &[&str]) -> Vec<String> {
    let mut missing: Vec<String> = required
        .iter()
        .filter(|name| schema.column_with_name(name).is_none())
        .map(|name| (*name).to_string())
        .collect();
    missing.sort();
    missing
}

/// Append-only batch list with a fixed schema and required columns.
#[derive(Debug, Clone)]
struct BatchStore {
    table: &'static str,
    required: &'static [&'static str],
    batches: Vec<RecordBatch>,
}

impl BatchStore {
    const fn new(table: &'static str, required: &'static [&'static str]) -> Self {
        Self {
            table,
            required,
            batches: Vec::new(),
        }
    }

    fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(first) = self.batches.first() {
            let existing_schema = first.schema();
            if batch.schema() != existing_schema {
                return Err(Error::StorageError(format!(
                    "Schema mismatch in {} table: expected {:?}, got {:?}",
                    self.table,
                    existing_schema,
                    batch.schema()
                )));
            }
        } else {
            let missing = missing_columns(&batch.schema(), self.required);
            if !missing.is_empty() {
                return Err(Error::MissingColumns {
                    table: self.table.to_string(),
                    columns: missing,
                });
            }
        }
        self.batches.push(batch);
        Ok(())
    }

    fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Exposure log: `user_id, experiment_id, variant, exposure_time`.
///
/// Identifiers of any castable Arrow type are read as strings.
#[derive(Debug, Clone)]
pub struct ExposureTable {
    store: BatchStore,
}

impl Default for ExposureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExposureTable {
    /// Empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            store: BatchStore::new("exposures", &EXPOSURE_COLUMNS),
        }
    }

    /// Table from batches, validating each.
    ///
    /// # Errors
    ///
    /// See [`Self::append_batch`].
    pub fn from_batches(batches: impl IntoIterator<Item = RecordBatch>) -> Result<Self> {
        let mut table = Self::new();
        for batch in batches {
            table.append_batch(batch)?;
        }
        Ok(table)
    }

    /// Append a batch (the only supported write).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumns`] if the first batch lacks a required
    /// column, or [`Error::StorageError`] if a later batch's schema differs.
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        self.store.append_batch(batch)
    }

    /// Stored batches.
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.store.batches
    }

    /// Total rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.store.num_rows()
    }

    /// Convert to typed records, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for null identifiers and
    /// [`Error::InvalidTimestamp`] for unreadable timestamps.
    pub fn to_records(&self) -> Result<Vec<ExposureRecord>> {
        let mut records = Vec::with_capacity(self.num_rows());
        for batch in self.batches() {
            let users = columns::strings(batch, "user_id")?;
            let experiments = columns::strings(batch, "experiment_id")?;
            let variants = columns::strings(batch, "variant")?;
            let times = columns::timestamps(batch, "exposure_time")?;
            records.extend(
                users
                    .into_iter()
                    .zip(experiments)
                    .zip(variants)
                    .zip(times)
                    .map(|(((user, experiment), variant), at)| {
                        ExposureRecord::new(user, experiment, variant, at)
                    }),
            );
        }
        tracing::debug!(rows = records.len(), "loaded exposure table");
        Ok(records)
    }
}

/// Event log: `user_id, event_name, event_time` and optional `event_value`.
#[derive(Debug, Clone)]
pub struct EventTable {
    store: BatchStore,
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTable {
    /// Empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            store: BatchStore::new("events", &EVENT_COLUMNS),
        }
    }

    /// Table from batches, validating each.
    ///
    /// # Errors
    ///
    /// See [`ExposureTable::append_batch`].
    pub fn from_batches(batches: impl IntoIterator<Item = RecordBatch>) -> Result<Self> {
        let mut table = Self::new();
        for batch in batches {
            table.append_batch(batch)?;
        }
        Ok(table)
    }

    /// Append a batch.
    ///
    /// # Errors
    ///
    /// See [`ExposureTable::append_batch`].
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        self.store.append_batch(batch)
    }

    /// Stored batches.
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.store.batches
    }

    /// Total rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.store.num_rows()
    }

    /// Convert to typed records. Non-numeric `event_value`s become `None`.
    ///
    /// # Errors
    ///
    /// See [`ExposureTable::to_records`].
    pub fn to_records(&self) -> Result<Vec<EventRecord>> {
        let mut records = Vec::with_capacity(self.num_rows());
        for batch in self.batches() {
            let users = columns::strings(batch, "user_id")?;
            let names = columns::strings(batch, "event_name")?;
            let times = columns::timestamps(batch, "event_time")?;
            let values = if batch.column_by_name(EVENT_VALUE_COLUMN).is_some() {
                columns::optional_floats(batch, EVENT_VALUE_COLUMN)?
            } else {
                vec![None; batch.num_rows()]
            };
            records.extend(
                users
                    .into_iter()
                    .zip(names)
                    .zip(times)
                    .zip(values)
                    .map(|(((user, name), at), value)| {
                        EventRecord::builder(user, name, at).value(value).build()
                    }),
            );
        }
        tracing::debug!(rows = records.len(), "loaded event table");
        Ok(records)
    }
}
