//! The table catalog contract.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`TableCatalog`] | Table existence, creation, load, atomic schema commit |
//! | [`NamespaceCatalog`] | Namespace existence and creation (optional) |
//!
//! Catalogs opt in to namespace support by returning `Some(self)` from
//! [`TableCatalog::as_namespace_catalog`]. All calls are blocking; the sink
//! issues them on its processing thread.

use std::collections::HashMap;

use crate::error::CatalogResult;
use crate::identifier::{Namespace, TableIdentifier};
use crate::schema::TableSchema;
use crate::table::{PartitionSpec, TableMetadata};
use crate::transaction::Transaction;

/// A catalog of tables whose schemas can be altered transactionally.
pub trait TableCatalog: Send + Sync {
    /// Returns the catalog name (used in log messages).
    fn name(&self) -> &str;

    /// Returns `true` if the table exists.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the backend cannot answer.
    fn table_exists(&self, table: &TableIdentifier) -> CatalogResult<bool>;

    /// Creates a table. Field ids in `schema` are reassigned by the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TableAlreadyExists`](crate::CatalogError::TableAlreadyExists)
    /// if another creator won the race, or
    /// [`CatalogError::NoSuchNamespace`](crate::CatalogError::NoSuchNamespace)
    /// if the namespace is missing on a namespace-aware catalog.
    fn create_table(
        &self,
        table: &TableIdentifier,
        schema: &TableSchema,
        partition_spec: PartitionSpec,
        properties: &HashMap<String, String>,
    ) -> CatalogResult<TableMetadata>;

    /// Loads the table's current metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NoSuchTable`](crate::CatalogError::NoSuchTable)
    /// if the table does not exist.
    fn load_table(&self, table: &TableIdentifier) -> CatalogResult<TableMetadata>;

    /// Commits all updates staged on `txn` as one atomic schema change.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CommitConflict`](crate::CatalogError::CommitConflict)
    /// if the table's schema id differs from the transaction's base, or
    /// [`CatalogError::InvalidUpdate`](crate::CatalogError::InvalidUpdate) if
    /// an update is inconsistent with the schema.
    fn commit_transaction(&self, txn: Transaction) -> CatalogResult<TableMetadata>;

    /// Returns this catalog as a [`NamespaceCatalog`], if supported.
    fn as_namespace_catalog(&self) -> Option<&dyn NamespaceCatalog> {
        None
    }
}

/// Optional capability: explicit namespaces.
pub trait NamespaceCatalog: Send + Sync {
    /// Returns `true` if the namespace exists.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the backend cannot answer.
    fn namespace_exists(&self, namespace: &Namespace) -> CatalogResult<bool>;

    /// Creates a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NamespaceAlreadyExists`](crate::CatalogError::NamespaceAlreadyExists)
    /// if another creator won the race.
    fn create_namespace(&self, namespace: &Namespace) -> CatalogResult<()>;
}
