//! Atomic schema alteration.
//!
//! A [`Transaction`] is opened against a loaded [`TableMetadata`] and
//! remembers the schema id it was based on. The catalog applies all of its
//! pending updates in one step at commit time, and rejects the commit with
//! [`CatalogError::CommitConflict`](crate::CatalogError::CommitConflict) if
//! the table's schema moved on in the meantime.

use arrow_schema::DataType;

use crate::identifier::TableIdentifier;
use crate::table::TableMetadata;

/// One pending column-level update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaUpdate {
    /// Append a nullable column.
    AddColumn {
        /// Column name.
        name: String,
        /// Column type.
        data_type: DataType,
    },
    /// Drop a column by name.
    DeleteColumn {
        /// Column name.
        name: String,
    },
}

/// A set of schema updates to commit atomically.
#[derive(Debug, Clone)]
pub struct Transaction {
    table: TableIdentifier,
    base_schema_id: i32,
    updates: Vec<SchemaUpdate>,
}

impl Transaction {
    /// Opens a transaction based on the schema in `metadata`.
    #[must_use]
    pub fn new(metadata: &TableMetadata) -> Self {
        Self {
            table: metadata.identifier.clone(),
            base_schema_id: metadata.schema.schema_id(),
            updates: Vec::new(),
        }
    }

    /// Returns the schema-update builder for this transaction.
    pub fn update_schema(&mut self) -> UpdateSchema<'_> {
        UpdateSchema { txn: self }
    }

    /// Returns the table this transaction alters.
    #[must_use]
    pub fn table(&self) -> &TableIdentifier {
        &self.table
    }

    /// Returns the schema id observed when the transaction was opened.
    #[must_use]
    pub fn base_schema_id(&self) -> i32 {
        self.base_schema_id
    }

    /// Returns the pending updates in the order they were added.
    #[must_use]
    pub fn updates(&self) -> &[SchemaUpdate] {
        &self.updates
    }

    /// Returns `true` if nothing would change on commit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Builder that stages column updates on a [`Transaction`].
#[derive(Debug)]
pub struct UpdateSchema<'a> {
    txn: &'a mut Transaction,
}

impl UpdateSchema<'_> {
    /// Stages a new nullable column.
    pub fn add_column(&mut self, name: impl Into<String>, data_type: DataType) -> &mut Self {
        self.txn.updates.push(SchemaUpdate::AddColumn {
            name: name.into(),
            data_type,
        });
        self
    }

    /// Stages the removal of a column.
    pub fn delete_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.txn
            .updates
            .push(SchemaUpdate::DeleteColumn { name: name.into() });
        self
    }
}
