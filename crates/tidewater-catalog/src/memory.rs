//! In-memory [`TableCatalog`] with optimistic schema commits.
//!
//! Thread-safe (`parking_lot::RwLock`) so several sink instances can share
//! one catalog through an `Arc`, which is how concurrent bootstraps and
//! concurrent schema changes are exercised in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{NamespaceCatalog, TableCatalog};
use crate::error::{CatalogError, CatalogResult};
use crate::identifier::{Namespace, TableIdentifier};
use crate::schema::{TableField, TableSchema};
use crate::table::{PartitionSpec, TableMetadata};
use crate::transaction::{SchemaUpdate, Transaction};

struct TableEntry {
    schema: Arc<TableSchema>,
    partition_spec: PartitionSpec,
    properties: HashMap<String, String>,
    last_column_id: i32,
}

impl TableEntry {
    fn metadata(&self, identifier: &TableIdentifier) -> TableMetadata {
        TableMetadata {
            identifier: identifier.clone(),
            schema: Arc::clone(&self.schema),
            partition_spec: self.partition_spec,
            properties: self.properties.clone(),
        }
    }
}

#[derive(Default)]
struct CatalogState {
    namespaces: HashSet<Namespace>,
    tables: HashMap<TableIdentifier, TableEntry>,
}

/// A catalog held entirely in memory.
pub struct InMemoryCatalog {
    name: String,
    namespaces_enabled: bool,
    state: RwLock<CatalogState>,
}

impl std::fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryCatalog")
            .field("name", &self.name)
            .field("namespaces_enabled", &self.namespaces_enabled)
            .field("namespaces", &state.namespaces.len())
            .field("tables", &state.tables.len())
            .finish()
    }
}

impl InMemoryCatalog {
    /// Creates an empty namespace-aware catalog.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces_enabled: true,
            state: RwLock::new(CatalogState::default()),
        }
    }

    /// Creates an empty catalog without namespace support; tables may be
    /// created in any namespace.
    #[must_use]
    pub fn without_namespaces(name: impl Into<String>) -> Self {
        Self {
            namespaces_enabled: false,
            ..Self::new(name)
        }
    }

    /// Returns the identifiers of all tables, sorted.
    #[must_use]
    pub fn list_tables(&self) -> Vec<TableIdentifier> {
        let mut tables: Vec<_> = self.state.read().tables.keys().cloned().collect();
        tables.sort();
        tables
    }
}

impl TableCatalog for InMemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn table_exists(&self, table: &TableIdentifier) -> CatalogResult<bool> {
        Ok(self.state.read().tables.contains_key(table))
    }

    fn create_table(
        &self,
        table: &TableIdentifier,
        schema: &TableSchema,
        partition_spec: PartitionSpec,
        properties: &HashMap<String, String>,
    ) -> CatalogResult<TableMetadata> {
        let mut state = self.state.write();
        if self.namespaces_enabled
            && !table.namespace().is_empty()
            && !state.namespaces.contains(table.namespace())
        {
            return Err(CatalogError::NoSuchNamespace(table.namespace().clone()));
        }
        if state.tables.contains_key(table) {
            return Err(CatalogError::TableAlreadyExists(table.clone()));
        }

        let schema = schema.with_fresh_ids().with_schema_id(0);
        let entry = TableEntry {
            last_column_id: schema.highest_field_id(),
            schema: Arc::new(schema),
            partition_spec,
            properties: properties.clone(),
        };
        let metadata = entry.metadata(table);
        state.tables.insert(table.clone(), entry);
        Ok(metadata)
    }

    fn load_table(&self, table: &TableIdentifier) -> CatalogResult<TableMetadata> {
        self.state
            .read()
            .tables
            .get(table)
            .map(|entry| entry.metadata(table))
            .ok_or_else(|| CatalogError::NoSuchTable(table.clone()))
    }

    fn commit_transaction(&self, txn: Transaction) -> CatalogResult<TableMetadata> {
        let mut state = self.state.write();
        let entry = state
            .tables
            .get_mut(txn.table())
            .ok_or_else(|| CatalogError::NoSuchTable(txn.table().clone()))?;

        let actual = entry.schema.schema_id();
        if actual != txn.base_schema_id() {
            return Err(CatalogError::CommitConflict {
                table: txn.table().clone(),
                expected: txn.base_schema_id(),
                actual,
            });
        }

        // Stage on a copy so a bad update leaves the table untouched.
        let mut fields: Vec<TableField> = entry.schema.fields().to_vec();
        let mut last_column_id = entry.last_column_id;
        for update in txn.updates() {
            match update {
                SchemaUpdate::AddColumn { name, data_type } => {
                    if fields.iter().any(|f| &f.name == name) {
                        return Err(CatalogError::InvalidUpdate(format!(
                            "cannot add column '{name}': it already exists"
                        )));
                    }
                    last_column_id += 1;
                    fields.push(TableField::new(last_column_id, name, data_type.clone(), true));
                }
                SchemaUpdate::DeleteColumn { name } => {
                    let idx = fields.iter().position(|f| &f.name == name).ok_or_else(|| {
                        CatalogError::InvalidUpdate(format!(
                            "cannot delete missing column '{name}'"
                        ))
                    })?;
                    fields.remove(idx);
                }
            }
        }

        if !txn.is_empty() {
            entry.schema = Arc::new(TableSchema::new(fields).with_schema_id(actual + 1));
            entry.last_column_id = last_column_id;
        }
        Ok(entry.metadata(txn.table()))
    }

    fn as_namespace_catalog(&self) -> Option<&dyn NamespaceCatalog> {
        if self.namespaces_enabled {
            Some(self)
        } else {
            None
        }
    }
}

impl NamespaceCatalog for InMemoryCatalog {
    fn namespace_exists(&self, namespace: &Namespace) -> CatalogResult<bool> {
        Ok(self.state.read().namespaces.contains(namespace))
    }

    fn create_namespace(&self, namespace: &Namespace) -> CatalogResult<()> {
        if self.state.write().namespaces.insert(namespace.clone()) {
            Ok(())
        } else {
            Err(CatalogError::NamespaceAlreadyExists(namespace.clone()))
        }
    }
}
