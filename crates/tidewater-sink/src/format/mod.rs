//! Payload format adapters.
//!
//! A [`DynamicSchemaFormat`] turns raw CDC payload bytes into a JSON record
//! and extracts what the reconciliation operator needs from it: the target
//! table, the DDL flag, primary keys, the envelope's validity, an inferred
//! schema, and the rows projected onto a given table schema.
//!
//! - [`CanalJsonFormat`]: Canal's flat JSON envelope
//! - [`DebeziumJsonFormat`]: Debezium's before/after envelope

pub mod canal;
pub mod debezium;
pub mod pattern;
pub mod row;

use arrow_array::RecordBatch;
use serde_json::Value;
use tidewater_catalog::{Namespace, TableIdentifier, TableSchema};

use crate::error::{SinkError, SinkResult};
use crate::record::RowKind;

pub use canal::CanalJsonFormat;
pub use debezium::DebeziumJsonFormat;

/// Supported payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// Canal JSON.
    CanalJson,
    /// Debezium JSON.
    DebeziumJson,
}

str_enum!(FormatKind, lowercase_udash, "unknown sink format",
    CanalJson => "canal-json", "canal";
    DebeziumJson => "debezium-json", "debezium");

/// Creates the adapter for `kind`.
#[must_use]
pub fn create_format(kind: FormatKind) -> Box<dyn DynamicSchemaFormat> {
    match kind {
        FormatKind::CanalJson => Box::new(CanalJsonFormat::new()),
        FormatKind::DebeziumJson => Box::new(DebeziumJsonFormat::new()),
    }
}

/// Decodes CDC payloads and extracts table, schema and row information.
pub trait DynamicSchemaFormat: Send + Sync {
    /// Returns the format name.
    fn name(&self) -> &'static str;

    /// Decodes raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Decode` on malformed input.
    fn decode(&self, bytes: &[u8]) -> SinkResult<Value> {
        let value: Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(SinkError::Decode(format!(
                "{} payload must be a JSON object",
                self.name()
            )));
        }
        Ok(value)
    }

    /// Returns the value placeholders are resolved against.
    fn pattern_root<'a>(&self, record: &'a Value) -> &'a Value {
        record
    }

    /// Returns `true` if the record is a DDL event.
    fn extract_ddl_flag(&self, record: &Value) -> bool;

    /// Returns the record's primary key column names (possibly empty).
    fn extract_primary_keys(&self, record: &Value) -> Vec<String>;

    /// Validates the DML envelope and returns the number of rows it carries.
    ///
    /// Runs before the record is queued, so a malformed envelope never
    /// creates or alters a table.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Decode` for an unknown operation type or a
    /// missing or malformed row image.
    fn validate_dml(&self, record: &Value) -> SinkResult<usize>;

    /// Infers the table schema from this record alone.
    ///
    /// Primary key fields are non-nullable, all others nullable; field ids
    /// are unresolved.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Decode` if the record carries no usable column
    /// information.
    fn extract_schema(&self, record: &Value, primary_keys: &[String]) -> SinkResult<TableSchema>;

    /// Projects the record's rows onto `schema`.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Extraction` if a value cannot be projected onto
    /// its target column, or `SinkError::Decode` if the envelope is
    /// malformed.
    fn extract_rows(
        &self,
        record: &Value,
        schema: &TableSchema,
    ) -> SinkResult<(Vec<RowKind>, RecordBatch)>;

    /// Renders a `${path}` pattern against the record.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Decode` if a placeholder path is missing.
    fn parse_pattern(&self, record: &Value, pattern: &str) -> SinkResult<String> {
        pattern::render(pattern, self.pattern_root(record))
    }

    /// Resolves the target table from the database and table patterns.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Decode` if a placeholder path is missing.
    fn extract_table_id(
        &self,
        record: &Value,
        database_pattern: &str,
        table_pattern: &str,
    ) -> SinkResult<TableIdentifier> {
        let database = self.parse_pattern(record, database_pattern)?;
        let table = self.parse_pattern(record, table_pattern)?;
        Ok(TableIdentifier::new(Namespace::of([database]), table))
    }
}

/// Returns the string array at `key` of `record`, skipping non-strings.
fn string_array(record: &Value, key: &str) -> Vec<String> {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
