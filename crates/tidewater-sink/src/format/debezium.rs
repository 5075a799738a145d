//! Debezium JSON format.
//!
//! Accepts the bare envelope (`{"before", "after", "source", "op"}`) or the
//! schema-wrapped form (`{"schema": {...}, "payload": {...}}`). Placeholders
//! and metadata resolve against the payload.

use arrow_array::RecordBatch;
use arrow_schema::{DataType, TimeUnit};
use serde_json::{Map, Value};
use tidewater_catalog::{TableField, TableSchema};

use super::row::{infer_schema, rows_to_batch};
use super::{string_array, DynamicSchemaFormat};
use crate::error::{SinkError, SinkResult};
use crate::record::RowKind;

const DATE_LOGICAL_TYPE: &str = "io.debezium.time.Date";
const TIMESTAMP_LOGICAL_TYPE: &str = "io.debezium.time.Timestamp";

/// Maps a Kafka Connect field schema to an Arrow type.
fn connect_to_arrow(field: &Value) -> DataType {
    match field.get("name").and_then(Value::as_str) {
        Some(DATE_LOGICAL_TYPE) => return DataType::Date32,
        Some(TIMESTAMP_LOGICAL_TYPE) => {
            return DataType::Timestamp(TimeUnit::Millisecond, None)
        }
        _ => {}
    }
    match field.get("type").and_then(Value::as_str).unwrap_or_default() {
        "int8" => DataType::Int8,
        "int16" => DataType::Int16,
        "int32" => DataType::Int32,
        "int64" => DataType::Int64,
        "float32" | "float" => DataType::Float32,
        "float64" | "double" => DataType::Float64,
        "boolean" => DataType::Boolean,
        "bytes" => DataType::Binary,
        _ => DataType::Utf8,
    }
}

/// Debezium JSON adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebeziumJsonFormat;

impl DebeziumJsonFormat {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn payload(record: &Value) -> &Value {
        match (record.get("schema"), record.get("payload")) {
            (Some(_), Some(payload)) if payload.is_object() => payload,
            _ => record,
        }
    }

    fn op(record: &Value) -> SinkResult<(RowKind, &'static str)> {
        let op = Self::payload(record)
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match op {
            "c" | "r" => Ok((RowKind::Insert, "after")),
            "u" => Ok((RowKind::UpdateAfter, "after")),
            "d" => Ok((RowKind::Delete, "before")),
            other => Err(SinkError::Decode(format!(
                "unsupported debezium op '{other}'"
            ))),
        }
    }

    fn row_image(record: &Value) -> SinkResult<Option<&Map<String, Value>>> {
        let (_, image) = Self::op(record)?;
        match Self::payload(record).get(image) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(row)) => Ok(Some(row)),
            Some(_) => Err(SinkError::Decode(format!(
                "debezium '{image}' must be an object"
            ))),
        }
    }

    /// Returns the `after` struct's field list from the `schema` block.
    fn connect_fields(record: &Value) -> Option<&Vec<Value>> {
        record
            .get("schema")?
            .get("fields")?
            .as_array()?
            .iter()
            .find(|f| f.get("field").and_then(Value::as_str) == Some("after"))?
            .get("fields")?
            .as_array()
    }
}

impl DynamicSchemaFormat for DebeziumJsonFormat {
    fn name(&self) -> &'static str {
        "debezium-json"
    }

    fn pattern_root<'a>(&self, record: &'a Value) -> &'a Value {
        Self::payload(record)
    }

    fn extract_ddl_flag(&self, record: &Value) -> bool {
        Self::payload(record)
            .get("ddl")
            .is_some_and(|ddl| !ddl.is_null())
    }

    fn extract_primary_keys(&self, record: &Value) -> Vec<String> {
        string_array(Self::payload(record), "pkNames")
    }

    fn validate_dml(&self, record: &Value) -> SinkResult<usize> {
        let (_, image) = Self::op(record)?;
        Self::row_image(record)?
            .ok_or_else(|| SinkError::Decode(format!("debezium '{image}' is missing")))?;
        Ok(1)
    }

    fn extract_schema(&self, record: &Value, primary_keys: &[String]) -> SinkResult<TableSchema> {
        if let Some(fields) = Self::connect_fields(record) {
            let fields = fields
                .iter()
                .filter_map(|f| {
                    let name = f.get("field").and_then(Value::as_str)?;
                    let nullable = !primary_keys.iter().any(|pk| pk == name);
                    Some(TableField::unassigned(name, connect_to_arrow(f), nullable))
                })
                .collect();
            return Ok(TableSchema::new(fields));
        }

        let row = Self::row_image(record)?.ok_or_else(|| {
            SinkError::Decode("debezium record has no row image to infer a schema from".into())
        })?;
        Ok(infer_schema([row], primary_keys))
    }

    fn extract_rows(
        &self,
        record: &Value,
        schema: &TableSchema,
    ) -> SinkResult<(Vec<RowKind>, RecordBatch)> {
        let (kind, image) = Self::op(record)?;
        let row = Self::row_image(record)?
            .ok_or_else(|| SinkError::Decode(format!("debezium '{image}' is missing")))?;
        let batch = rows_to_batch(&[row], schema)?;
        Ok((vec![kind], batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::cast::AsArray;
    use arrow_array::types::{Int32Type, Int64Type};
    use serde_json::json;

    fn bare(op: &str) -> Value {
        json!({
            "before": {"id": 1, "name": "old"},
            "after": {"id": 1, "name": "new"},
            "source": {"db": "inventory", "table": "customers"},
            "op": op,
            "pkNames": ["id"]
        })
    }

    fn wrapped() -> Value {
        json!({
            "schema": {
                "type": "struct",
                "fields": [
                    {"type": "struct", "field": "before", "fields": []},
                    {"type": "struct", "field": "after", "fields": [
                        {"type": "int32", "optional": false, "field": "id"},
                        {"type": "string", "optional": true, "field": "email"},
                        {"type": "int32", "optional": true, "field": "born", "name": "io.debezium.time.Date"}
                    ]}
                ]
            },
            "payload": {
                "before": null,
                "after": {"id": 7, "email": "a@b.c", "born": 3},
                "source": {"db": "inventory", "table": "customers"},
                "op": "c"
            }
        })
    }

    #[test]
    fn test_table_id_from_source() {
        let f = DebeziumJsonFormat::new();
        for rec in [bare("c"), wrapped()] {
            let id = f
                .extract_table_id(&rec, "${source.db}", "${source.table}")
                .unwrap();
            assert_eq!(id.to_string(), "inventory.customers");
        }
    }

    #[test]
    fn test_ddl_flag() {
        let f = DebeziumJsonFormat::new();
        assert!(!f.extract_ddl_flag(&bare("c")));
        assert!(f.extract_ddl_flag(&json!({"ddl": "ALTER TABLE t ADD c INT"})));
        assert!(!f.extract_ddl_flag(&json!({"ddl": null})));
    }

    #[test]
    fn test_schema_from_connect_block() {
        let f = DebeziumJsonFormat::new();
        let schema = f.extract_schema(&wrapped(), &["id".to_string()]).unwrap();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["id", "email", "born"]);
        assert_eq!(schema.find_field("id").unwrap().data_type, DataType::Int32);
        assert!(!schema.find_field("id").unwrap().nullable);
        assert_eq!(schema.find_field("born").unwrap().data_type, DataType::Date32);
    }

    #[test]
    fn test_schema_inferred_from_after() {
        let f = DebeziumJsonFormat::new();
        let rec = bare("u");
        let pks = f.extract_primary_keys(&rec);
        let schema = f.extract_schema(&rec, &pks).unwrap();
        assert_eq!(schema.find_field("id").unwrap().data_type, DataType::Int64);
        assert!(!schema.find_field("id").unwrap().nullable);
    }

    #[test]
    fn test_rows_by_op() {
        let f = DebeziumJsonFormat::new();
        let rec = bare("d");
        let schema = f.extract_schema(&rec, &["id".to_string()]).unwrap();

        let (kinds, batch) = f.extract_rows(&rec, &schema).unwrap();
        assert_eq!(kinds, vec![RowKind::Delete]);
        assert_eq!(batch.column(1).as_string::<i32>().value(0), "old");

        let (kinds, batch) = f.extract_rows(&bare("u"), &schema).unwrap();
        assert_eq!(kinds, vec![RowKind::UpdateAfter]);
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(0), 1);
        assert_eq!(batch.column(1).as_string::<i32>().value(0), "new");

        assert_eq!(f.extract_rows(&bare("r"), &schema).unwrap().0, vec![RowKind::Insert]);
        assert!(f.extract_rows(&bare("x"), &schema).is_err());
    }

    #[test]
    fn test_wrapped_rows() {
        let f = DebeziumJsonFormat::new();
        let rec = wrapped();
        let schema = f.extract_schema(&rec, &["id".to_string()]).unwrap();
        let (_, batch) = f.extract_rows(&rec, &schema).unwrap();
        assert_eq!(batch.column(0).as_primitive::<Int32Type>().value(0), 7);
    }

    #[test]
    fn test_validate_dml() {
        let f = DebeziumJsonFormat::new();
        assert_eq!(f.validate_dml(&bare("c")).unwrap(), 1);
        assert_eq!(f.validate_dml(&bare("d")).unwrap(), 1);
        assert_eq!(f.validate_dml(&wrapped()).unwrap(), 1);

        let no_after = json!({"before": {"id": 1}, "after": null, "op": "u"});
        let no_before = json!({"after": {"id": 1}, "op": "d"});
        let bad_image = json!({"after": [1], "op": "c"});
        for bad in [bare("x"), bare("t"), no_after, no_before, bad_image] {
            assert!(matches!(f.validate_dml(&bad), Err(SinkError::Decode(_))));
        }
    }
}
