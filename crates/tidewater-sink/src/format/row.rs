//! JSON row projection onto Arrow columns, and per-value type inference.
//!
//! Values are coerced leniently: CDC producers frequently render every
//! column as a string, so numeric, boolean and temporal columns also accept
//! their textual form.

use std::sync::Arc;

use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, Date32Builder, Float32Builder, Float64Builder, Int16Builder,
    Int32Builder, Int64Builder, Int8Builder, StringBuilder, TimestampMillisecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use tidewater_catalog::{TableField, TableSchema};

use crate::error::{SinkError, SinkResult};

/// Timestamp text layouts accepted besides RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Infers a column type from a single JSON value.
///
/// Integers map to `Int64`, other numbers to `Float64`, booleans to
/// `Boolean`; everything else (strings, nested values, null) is `Utf8`.
#[must_use]
pub fn infer_data_type(value: &Value) -> DataType {
    match value {
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                DataType::Float64
            } else {
                DataType::Int64
            }
        }
        Value::Null | Value::String(_) | Value::Array(_) | Value::Object(_) => DataType::Utf8,
    }
}

/// Infers a schema from the columns of `rows`, in first-seen order.
///
/// A column's type comes from its first non-null value. Primary key columns
/// are non-nullable, all others nullable.
#[must_use]
pub fn infer_schema<'a>(
    rows: impl IntoIterator<Item = &'a Map<String, Value>>,
    primary_keys: &[String],
) -> TableSchema {
    let mut fields: Vec<(String, Option<DataType>)> = Vec::new();
    for row in rows {
        for (name, value) in row {
            let idx = match fields.iter().position(|(n, _)| n == name) {
                Some(idx) => idx,
                None => {
                    fields.push((name.clone(), None));
                    fields.len() - 1
                }
            };
            if fields[idx].1.is_none() && !value.is_null() {
                fields[idx].1 = Some(infer_data_type(value));
            }
        }
    }

    TableSchema::new(
        fields
            .into_iter()
            .map(|(name, dt)| {
                let nullable = !primary_keys.contains(&name);
                TableField::unassigned(name, dt.unwrap_or(DataType::Utf8), nullable)
            })
            .collect(),
    )
}

/// Projects `rows` onto `schema`, producing one column per schema field.
///
/// Row fields absent from `schema` are dropped. Absent or null values
/// become nulls.
///
/// # Errors
///
/// Returns `SinkError::Extraction` if a value cannot be coerced to its
/// column type, or a non-nullable column has no value.
pub fn rows_to_batch(rows: &[&Map<String, Value>], schema: &TableSchema) -> SinkResult<RecordBatch> {
    let mut builders = schema
        .fields()
        .iter()
        .map(|f| ColumnBuilder::new(&f.data_type, rows.len()))
        .collect::<SinkResult<Vec<_>>>()?;

    for (row_idx, row) in rows.iter().enumerate() {
        for (field, builder) in schema.fields().iter().zip(builders.iter_mut()) {
            let value = row.get(&field.name).unwrap_or(&Value::Null);
            append(builder, field, value).map_err(|e| {
                SinkError::Extraction(format!("row {row_idx}, column '{}': {e}", field.name))
            })?;
        }
    }

    let columns: Vec<ArrayRef> = builders.iter_mut().map(ColumnBuilder::finish).collect();
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(schema.to_arrow(), columns, &options)
        .map_err(|e| SinkError::Extraction(format!("failed to build batch: {e}")))
}

fn append(builder: &mut ColumnBuilder, field: &TableField, value: &Value) -> Result<(), String> {
    if value.is_null() {
        if !field.nullable {
            return Err("missing value for non-nullable column".into());
        }
        builder.append_null();
        return Ok(());
    }

    match builder {
        ColumnBuilder::Boolean(b) => b.append_value(extract_bool(value)?),
        ColumnBuilder::Int8(b) => b.append_value(narrow(extract_i64(value)?, "i8")?),
        ColumnBuilder::Int16(b) => b.append_value(narrow(extract_i64(value)?, "i16")?),
        ColumnBuilder::Int32(b) => b.append_value(narrow(extract_i64(value)?, "i32")?),
        ColumnBuilder::Int64(b) => b.append_value(extract_i64(value)?),
        #[allow(clippy::cast_possible_truncation)]
        ColumnBuilder::Float32(b) => b.append_value(extract_f64(value)? as f32),
        ColumnBuilder::Float64(b) => b.append_value(extract_f64(value)?),
        ColumnBuilder::Utf8(b) => b.append_value(value_to_string(value)),
        ColumnBuilder::Binary(b) => b.append_value(value_to_string(value).as_bytes()),
        ColumnBuilder::Date32(b) => b.append_value(extract_date(value)?),
        ColumnBuilder::TimestampMillis(b) => b.append_value(extract_timestamp_millis(value)?),
    }
    Ok(())
}

/// Column builder per supported Arrow type.
enum ColumnBuilder {
    Boolean(BooleanBuilder),
    Int8(Int8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
    Date32(Date32Builder),
    TimestampMillis(TimestampMillisecondBuilder),
}

impl ColumnBuilder {
    fn new(data_type: &DataType, capacity: usize) -> SinkResult<Self> {
        Ok(match data_type {
            DataType::Boolean => Self::Boolean(BooleanBuilder::with_capacity(capacity)),
            DataType::Int8 => Self::Int8(Int8Builder::with_capacity(capacity)),
            DataType::Int16 => Self::Int16(Int16Builder::with_capacity(capacity)),
            DataType::Int32 => Self::Int32(Int32Builder::with_capacity(capacity)),
            DataType::Int64 => Self::Int64(Int64Builder::with_capacity(capacity)),
            DataType::Float32 => Self::Float32(Float32Builder::with_capacity(capacity)),
            DataType::Float64 => Self::Float64(Float64Builder::with_capacity(capacity)),
            DataType::Utf8 => Self::Utf8(StringBuilder::with_capacity(capacity, capacity * 32)),
            DataType::Binary => Self::Binary(BinaryBuilder::with_capacity(capacity, capacity * 64)),
            DataType::Date32 => Self::Date32(Date32Builder::with_capacity(capacity)),
            DataType::Timestamp(TimeUnit::Millisecond, tz) => Self::TimestampMillis(
                TimestampMillisecondBuilder::with_capacity(capacity).with_timezone_opt(tz.clone()),
            ),
            other => {
                return Err(SinkError::Extraction(format!(
                    "unsupported column type {other:?}"
                )))
            }
        })
    }

    fn append_null(&mut self) {
        match self {
            Self::Boolean(b) => b.append_null(),
            Self::Int8(b) => b.append_null(),
            Self::Int16(b) => b.append_null(),
            Self::Int32(b) => b.append_null(),
            Self::Int64(b) => b.append_null(),
            Self::Float32(b) => b.append_null(),
            Self::Float64(b) => b.append_null(),
            Self::Utf8(b) => b.append_null(),
            Self::Binary(b) => b.append_null(),
            Self::Date32(b) => b.append_null(),
            Self::TimestampMillis(b) => b.append_null(),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Boolean(b) => Arc::new(b.finish()),
            Self::Int8(b) => Arc::new(b.finish()),
            Self::Int16(b) => Arc::new(b.finish()),
            Self::Int32(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Float32(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
            Self::Utf8(b) => Arc::new(b.finish()),
            Self::Binary(b) => Arc::new(b.finish()),
            Self::Date32(b) => Arc::new(b.finish()),
            Self::TimestampMillis(b) => Arc::new(b.finish()),
        }
    }
}

// ── Value extractors ───────────────────────────────────────────────

fn extract_bool(value: &Value) -> Result<bool, String> {
    if let Some(b) = value.as_bool() {
        return Ok(b);
    }
    if let Some(s) = value.as_str() {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => return Ok(true),
            "false" | "0" | "no" => return Ok(false),
            _ => {}
        }
    }
    if let Some(n) = value.as_i64() {
        return Ok(n != 0);
    }
    Err(format!("expected boolean, got {}", describe(value)))
}

fn extract_i64(value: &Value) -> Result<i64, String> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    if let Some(n) = value.as_u64() {
        return i64::try_from(n).map_err(|_| format!("u64 {n} out of i64 range"));
    }
    if let Some(s) = value.as_str() {
        if let Ok(v) = s.trim().parse::<i64>() {
            return Ok(v);
        }
    }
    Err(format!("expected integer, got {}", describe(value)))
}

fn narrow<T: TryFrom<i64>>(n: i64, type_name: &str) -> Result<T, String> {
    T::try_from(n).map_err(|_| format!("integer {n} out of {type_name} range"))
}

fn extract_f64(value: &Value) -> Result<f64, String> {
    if let Some(f) = value.as_f64() {
        return Ok(f);
    }
    if let Some(s) = value.as_str() {
        if let Ok(v) = s.trim().parse::<f64>() {
            return Ok(v);
        }
    }
    Err(format!("expected float, got {}", describe(value)))
}

/// Days since the epoch, from an integer or `YYYY-MM-DD` text.
fn extract_date(value: &Value) -> Result<i32, String> {
    if let Some(n) = value.as_i64() {
        return narrow(n, "date32");
    }
    if let Some(s) = value.as_str() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or("invalid epoch")?;
        if let Ok(date) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            return narrow(date.signed_duration_since(epoch).num_days(), "date32");
        }
        return Err(format!("cannot parse date from string: {s}"));
    }
    Err(format!("expected date, got {}", describe(value)))
}

/// Epoch milliseconds, from an integer or timestamp text.
fn extract_timestamp_millis(value: &Value) -> Result<i64, String> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    if let Some(s) = value.as_str() {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.timestamp_millis());
        }
        for fmt in TIMESTAMP_FORMATS {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(ndt.and_utc().timestamp_millis());
            }
        }
        return Err(format!("cannot parse timestamp from string: {s}"));
    }
    Err(format!("expected timestamp, got {}", describe(value)))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("string '{s}'"),
        Value::Null => "null".into(),
        Value::Bool(_) => "boolean".into(),
        Value::Number(n) => format!("number {n}"),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}
