//! Records flowing through the reconciliation operator.

use std::fmt;
use std::sync::Arc;

use arrow_array::RecordBatch;
use tidewater_catalog::{TableIdentifier, TableSchema};

/// Change kind of one emitted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    /// A new row.
    Insert,
    /// The row image before an update.
    UpdateBefore,
    /// The row image after an update.
    UpdateAfter,
    /// A deleted row.
    Delete,
}

impl RowKind {
    /// Returns the short changelog label (`+I`, `-U`, `+U`, `-D`).
    #[must_use]
    pub fn short_label(self) -> &'static str {
        match self {
            Self::Insert => "+I",
            Self::UpdateBefore => "-U",
            Self::UpdateAfter => "+U",
            Self::Delete => "-D",
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_label())
    }
}

/// A decoded DML record with the schema inferred from it alone.
///
/// Field ids of `inferred_schema` are unresolved; the record is buffered in
/// its table's pending queue until the table's schema covers it.
#[derive(Debug, Clone)]
pub struct RecordWithSchema {
    /// Decoded payload.
    pub payload: serde_json::Value,
    /// Schema inferred from this record.
    pub inferred_schema: TableSchema,
    /// Target table.
    pub table_id: TableIdentifier,
    /// Primary key column names.
    pub primary_keys: Vec<String>,
}

/// A record projected onto its table's current schema, ready for the writer.
#[derive(Debug, Clone)]
pub struct ReconciledRecord {
    /// Target table.
    pub table_id: TableIdentifier,
    /// The table schema the rows were projected onto (ids resolved).
    pub schema: Arc<TableSchema>,
    /// Primary key column names.
    pub primary_keys: Vec<String>,
    /// Change kind per row, aligned with `rows`.
    pub row_kinds: Vec<RowKind>,
    /// Row data, one column per schema field.
    pub rows: RecordBatch,
}

impl ReconciledRecord {
    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.num_rows()
    }
}
