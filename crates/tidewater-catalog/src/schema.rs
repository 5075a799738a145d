//! Table schemas with catalog-assigned field ids.
//!
//! A [`TableSchema`] is the catalog's view of a table at one point in time.
//! Field ids are assigned by the catalog when a table is created or a
//! column is added; schemas inferred from a single record carry id `0`
//! ([`UNASSIGNED_FIELD_ID`]) until they are resolved against a published
//! schema.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};

/// Field id carried by fields the catalog has not assigned yet.
pub const UNASSIGNED_FIELD_ID: i32 = 0;

/// Arrow field metadata key under which the catalog field id is stored.
pub const FIELD_ID_META_KEY: &str = "field_id";

/// A single column of a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableField {
    /// Catalog-assigned field id.
    pub id: i32,
    /// Column name.
    pub name: String,
    /// Semantic type.
    pub data_type: DataType,
    /// Whether the column accepts nulls.
    pub nullable: bool,
}

impl TableField {
    /// Creates a field with an explicit id.
    pub fn new(id: i32, name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            nullable,
        }
    }

    /// Creates a field whose id is not assigned yet.
    pub fn unassigned(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self::new(UNASSIGNED_FIELD_ID, name, data_type, nullable)
    }

    fn to_arrow(&self) -> Field {
        Field::new(&self.name, self.data_type.clone(), self.nullable).with_metadata(
            HashMap::from([(FIELD_ID_META_KEY.to_string(), self.id.to_string())]),
        )
    }
}

/// An ordered sequence of fields, as recorded by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    schema_id: i32,
    fields: Vec<TableField>,
}

impl TableSchema {
    /// Creates schema `0` from the given fields.
    #[must_use]
    pub fn new(fields: Vec<TableField>) -> Self {
        Self {
            schema_id: 0,
            fields,
        }
    }

    /// Sets the schema id.
    #[must_use]
    pub fn with_schema_id(mut self, schema_id: i32) -> Self {
        self.schema_id = schema_id;
        self
    }

    /// Returns the schema id. The catalog bumps it on every committed change.
    #[must_use]
    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    /// Returns the fields in column order.
    #[must_use]
    pub fn fields(&self) -> &[TableField] {
        &self.fields
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field by exact name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&TableField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterates over the column names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the highest assigned field id, or `0` for an empty schema.
    #[must_use]
    pub fn highest_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|f| f.id)
            .max()
            .unwrap_or(UNASSIGNED_FIELD_ID)
    }

    /// Structural comparison of the columns (id, name, type, nullability).
    ///
    /// The schema id is not compared: two catalogs may number versions
    /// differently while describing the same columns.
    #[must_use]
    pub fn same_schema(&self, other: &TableSchema) -> bool {
        self.fields == other.fields
    }

    /// Returns a copy of this schema with fresh ids `1..=n` in column order.
    #[must_use]
    pub fn with_fresh_ids(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .zip(1..)
            .map(|(f, id)| TableField { id, ..f.clone() })
            .collect();
        Self {
            schema_id: self.schema_id,
            fields,
        }
    }

    /// Converts to an Arrow schema, carrying field ids as field metadata.
    #[must_use]
    pub fn to_arrow(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.fields.iter().map(TableField::to_arrow).collect::<Vec<_>>(),
        ))
    }
}

impl std::fmt::Display for TableSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema {} [", self.schema_id)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{}: {} {:?}{}",
                field.id,
                field.name,
                field.data_type,
                if field.nullable { "" } else { " not null" }
            )?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(fields: &[(i32, &str, DataType, bool)]) -> TableSchema {
        TableSchema::new(
            fields
                .iter()
                .map(|(id, name, dt, nullable)| TableField::new(*id, *name, dt.clone(), *nullable))
                .collect(),
        )
    }

    #[test]
    fn test_same_schema_ignores_schema_id() {
        let a = schema(&[(1, "id", DataType::Int64, false)]);
        let b = a.clone().with_schema_id(7);
        assert!(a.same_schema(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_schema_detects_type_and_id_changes() {
        let a = schema(&[(1, "id", DataType::Int64, false)]);
        assert!(!a.same_schema(&schema(&[(1, "id", DataType::Int32, false)])));
        assert!(!a.same_schema(&schema(&[(2, "id", DataType::Int64, false)])));
        assert!(!a.same_schema(&schema(&[(1, "id", DataType::Int64, true)])));
    }

    #[test]
    fn test_fresh_ids_and_highest() {
        let inferred = TableSchema::new(vec![
            TableField::unassigned("a", DataType::Utf8, true),
            TableField::unassigned("b", DataType::Int32, true),
        ]);
        assert_eq!(inferred.highest_field_id(), UNASSIGNED_FIELD_ID);
        let assigned = inferred.with_fresh_ids();
        assert_eq!(assigned.fields()[0].id, 1);
        assert_eq!(assigned.fields()[1].id, 2);
        assert_eq!(assigned.highest_field_id(), 2);
    }

    #[test]
    fn test_to_arrow_carries_field_ids() {
        let s = schema(&[(3, "name", DataType::Utf8, true)]);
        let arrow = s.to_arrow();
        let field = arrow.field(0);
        assert_eq!(field.name(), "name");
        assert_eq!(
            field.metadata().get(FIELD_ID_META_KEY).map(String::as_str),
            Some("3")
        );
    }

    #[test]
    fn test_display() {
        let s = schema(&[(1, "id", DataType::Int64, false)]).with_schema_id(2);
        assert_eq!(s.to_string(), "schema 2 [1: id Int64 not null]");
    }
}
