//! Typed column readers over Arrow arrays

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::{Error, Result};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::StorageError(format!("column {name} not found in batch")))
}

fn safe_cast(array: &ArrayRef, to: &DataType) -> Result<ArrayRef> {
    let options = CastOptions {
        safe: true,
        ..CastOptions::default()
    };
    Ok(cast_with_options(array, to, &options)?)
}

/// Read a column as non-null strings; any castable type is accepted.
pub fn strings(batch: &RecordBatch, name: &str) -> Result<Vec<String>> {
    let array = safe_cast(column(batch, name)?, &DataType::Utf8)?;
    let strings = array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Other(format!("Failed to downcast {name} to StringArray")))?;
    (0..strings.len())
        .map(|row| {
            if strings.is_null(row) {
                Err(Error::InvalidInput(format!("null {name} at row {row}")))
            } else {
                Ok(strings.value(row).to_string())
            }
        })
        .collect()
}

/// Read an optional numeric column; nulls and unparseable values become
/// `None`.
pub fn optional_floats(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    let array = safe_cast(column(batch, name)?, &DataType::Float64)?;
    let floats = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Other(format!("Failed to downcast {name} to Float64Array")))?;
    Ok(floats.iter().collect())
}

/// Read a timestamp column.
///
/// Accepts Arrow timestamps of any unit (UTC assumed without a zone),
/// dates, and RFC 3339 / `YYYY-MM-DD[ HH:MM:SS[.f]]` strings.
pub fn timestamps(batch: &RecordBatch, name: &str) -> Result<Vec<DateTime<Utc>>> {
    let array = column(batch, name)?;
    match array.data_type() {
        DataType::Timestamp(_, tz) => {
            // keep the zone so aware values stay in UTC epoch terms
            let target = DataType::Timestamp(TimeUnit::Microsecond, tz.clone());
            micros_to_datetimes(name, &safe_cast(array, &target)?)
        }
        DataType::Date32 | DataType::Date64 => micros_to_datetimes(
            name,
            &safe_cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))?,
        ),
        DataType::Utf8 | DataType::LargeUtf8 => {
            let text = safe_cast(array, &DataType::Utf8)?;
            let strings = text
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::Other(format!("Failed to downcast {name} to StringArray")))?;
            strings
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    value
                        .ok_or_else(|| Error::InvalidTimestamp(format!("null {name} at row {row}")))
                        .and_then(parse_timestamp)
                })
                .collect()
        }
        other => Err(Error::InvalidTimestamp(format!(
            "column {name} has type {other}, expected a timestamp, date or string"
        ))),
    }
}

fn micros_to_datetimes(name: &str, array: &ArrayRef) -> Result<Vec<DateTime<Utc>>> {
    let micros = array
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| {
            Error::Other(format!("Failed to downcast {name} to TimestampMicrosecondArray"))
        })?;
    micros
        .iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .and_then(DateTime::from_timestamp_micros)
                .ok_or_else(|| {
                    Error::InvalidTimestamp(format!("null or out-of-range {name} at row {row}"))
                })
        })
        .collect()
}

/// Parse one timestamp string; naive values are taken as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
        return Ok(aware.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| Error::InvalidTimestamp(format!("unrecognized timestamp {text:?}")))
}
