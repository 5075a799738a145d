//! Canal JSON format.
//!
//! ```json
//! {
//!   "data": [{"id": "1", "name": "a"}],
//!   "old": null,
//!   "database": "shop",
//!   "table": "orders",
//!   "pkNames": ["id"],
//!   "isDdl": false,
//!   "type": "INSERT",
//!   "sqlType": {"id": -5, "name": 12},
//!   "mysqlType": {"id": "bigint", "name": "varchar(20)"}
//! }
//! ```
//!
//! Column types come from the JDBC codes in `sqlType` when present, else
//! from the JSON values of `data`.

use arrow_array::RecordBatch;
use arrow_schema::{DataType, TimeUnit};
use serde_json::{Map, Value};
use tidewater_catalog::{TableField, TableSchema};

use super::row::{infer_schema, rows_to_batch};
use super::{string_array, DynamicSchemaFormat};
use crate::error::{SinkError, SinkResult};
use crate::record::RowKind;

/// JDBC type codes (`java.sql.Types`).
mod jdbc {
    pub const BIT: i64 = -7;
    pub const TINYINT: i64 = -6;
    pub const SMALLINT: i64 = 5;
    pub const INTEGER: i64 = 4;
    pub const BIGINT: i64 = -5;
    pub const FLOAT: i64 = 6;
    pub const REAL: i64 = 7;
    pub const DOUBLE: i64 = 8;
    pub const NUMERIC: i64 = 2;
    pub const DECIMAL: i64 = 3;
    pub const DATE: i64 = 91;
    pub const TIMESTAMP: i64 = 93;
    pub const BINARY: i64 = -2;
    pub const VARBINARY: i64 = -3;
    pub const LONGVARBINARY: i64 = -4;
    pub const BOOLEAN: i64 = 16;
    pub const BLOB: i64 = 2004;
}

/// Maps a JDBC type code to an Arrow type.
///
/// Decimals keep their exact text as `Utf8`; unknown codes are `Utf8`.
#[must_use]
#[allow(clippy::match_same_arms)]
pub fn jdbc_to_arrow(code: i64) -> DataType {
    match code {
        jdbc::BIT | jdbc::BOOLEAN => DataType::Boolean,
        jdbc::TINYINT => DataType::Int8,
        jdbc::SMALLINT => DataType::Int16,
        jdbc::INTEGER => DataType::Int32,
        jdbc::BIGINT => DataType::Int64,
        jdbc::REAL | jdbc::FLOAT => DataType::Float32,
        jdbc::DOUBLE => DataType::Float64,
        jdbc::DATE => DataType::Date32,
        jdbc::TIMESTAMP => DataType::Timestamp(TimeUnit::Millisecond, None),
        jdbc::BINARY | jdbc::VARBINARY | jdbc::LONGVARBINARY | jdbc::BLOB => DataType::Binary,
        jdbc::DECIMAL | jdbc::NUMERIC => DataType::Utf8,
        _ => DataType::Utf8,
    }
}

/// Canal JSON adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanalJsonFormat;

impl CanalJsonFormat {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn data_rows(record: &Value) -> SinkResult<Vec<&Map<String, Value>>> {
        match record.get("data") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_object().ok_or_else(|| {
                        SinkError::Decode("canal 'data' entries must be objects".into())
                    })
                })
                .collect(),
            Some(_) => Err(SinkError::Decode("canal 'data' must be an array".into())),
        }
    }

    fn row_kind(record: &Value) -> SinkResult<RowKind> {
        let op = record.get("type").and_then(Value::as_str).unwrap_or_default();
        match op.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(RowKind::Insert),
            "UPDATE" => Ok(RowKind::UpdateAfter),
            "DELETE" => Ok(RowKind::Delete),
            other => Err(SinkError::Decode(format!(
                "unsupported canal operation type '{other}'"
            ))),
        }
    }
}

impl DynamicSchemaFormat for CanalJsonFormat {
    fn name(&self) -> &'static str {
        "canal-json"
    }

    fn extract_ddl_flag(&self, record: &Value) -> bool {
        record
            .get("isDdl")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn extract_primary_keys(&self, record: &Value) -> Vec<String> {
        string_array(record, "pkNames")
    }

    fn validate_dml(&self, record: &Value) -> SinkResult<usize> {
        Self::row_kind(record)?;
        Ok(Self::data_rows(record)?.len())
    }

    fn extract_schema(&self, record: &Value, primary_keys: &[String]) -> SinkResult<TableSchema> {
        if let Some(sql_types) = record.get("sqlType").and_then(Value::as_object) {
            let fields = sql_types
                .iter()
                .map(|(name, code)| {
                    let code = code.as_i64().ok_or_else(|| {
                        SinkError::Decode(format!("canal sqlType of '{name}' is not an integer"))
                    })?;
                    let nullable = !primary_keys.iter().any(|pk| pk == name);
                    Ok(TableField::unassigned(name.clone(), jdbc_to_arrow(code), nullable))
                })
                .collect::<SinkResult<Vec<_>>>()?;
            return Ok(TableSchema::new(fields));
        }

        let rows = Self::data_rows(record)?;
        if rows.is_empty() {
            return Err(SinkError::Decode(
                "canal record has neither 'sqlType' nor 'data'".into(),
            ));
        }
        Ok(infer_schema(rows, primary_keys))
    }

    fn extract_rows(
        &self,
        record: &Value,
        schema: &TableSchema,
    ) -> SinkResult<(Vec<RowKind>, RecordBatch)> {
        let kind = Self::row_kind(record)?;
        let rows = Self::data_rows(record)?;
        let batch = rows_to_batch(&rows, schema)?;
        Ok((vec![kind; rows.len()], batch))
    }
}
