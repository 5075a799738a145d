//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};

use serde_json::{json, Value};
use tidewater_catalog::{
    CatalogResult, InMemoryCatalog, Namespace, NamespaceCatalog, PartitionSpec, TableCatalog,
    TableIdentifier, TableMetadata, TableSchema, Transaction,
};
use tidewater_sink::{DynamicSchemaOperator, FormatKind, MultipleSinkOptions};
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber filtered by `RUST_LOG`. Idempotent.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Per-method call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub table_exists: AtomicU64,
    pub create_table: AtomicU64,
    pub load_table: AtomicU64,
    pub commit: AtomicU64,
    pub namespace_exists: AtomicU64,
    pub create_namespace: AtomicU64,
}

impl CallCounts {
    pub fn total(&self) -> u64 {
        [
            &self.table_exists,
            &self.create_table,
            &self.load_table,
            &self.commit,
            &self.namespace_exists,
            &self.create_namespace,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    pub fn commits(&self) -> u64 {
        self.commit.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> u64 {
        self.create_table.load(Ordering::SeqCst)
    }
}

/// Counts every call before delegating to an [`InMemoryCatalog`].
///
/// With a barrier installed, `table_exists` waits on it after reading the
/// answer, so concurrent callers all observe the table as absent.
pub struct CountingCatalog {
    pub inner: InMemoryCatalog,
    pub calls: CallCounts,
    exists_barrier: Option<Barrier>,
}

impl CountingCatalog {
    pub fn new() -> Self {
        Self {
            inner: InMemoryCatalog::new("counting"),
            calls: CallCounts::default(),
            exists_barrier: None,
        }
    }

    pub fn with_exists_barrier(parties: usize) -> Self {
        Self {
            exists_barrier: Some(Barrier::new(parties)),
            ..Self::new()
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::SeqCst);
}

impl TableCatalog for CountingCatalog {
    fn name(&self) -> &str {
        "counting"
    }

    fn table_exists(&self, table: &TableIdentifier) -> CatalogResult<bool> {
        bump(&self.calls.table_exists);
        let exists = self.inner.table_exists(table);
        if let Some(barrier) = &self.exists_barrier {
            barrier.wait();
        }
        exists
    }

    fn create_table(
        &self,
        table: &TableIdentifier,
        schema: &TableSchema,
        partition_spec: PartitionSpec,
        properties: &HashMap<String, String>,
    ) -> CatalogResult<TableMetadata> {
        bump(&self.calls.create_table);
        self.inner
            .create_table(table, schema, partition_spec, properties)
    }

    fn load_table(&self, table: &TableIdentifier) -> CatalogResult<TableMetadata> {
        bump(&self.calls.load_table);
        self.inner.load_table(table)
    }

    fn commit_transaction(&self, txn: Transaction) -> CatalogResult<TableMetadata> {
        bump(&self.calls.commit);
        self.inner.commit_transaction(txn)
    }

    fn as_namespace_catalog(&self) -> Option<&dyn NamespaceCatalog> {
        Some(self)
    }
}

impl NamespaceCatalog for CountingCatalog {
    fn namespace_exists(&self, namespace: &Namespace) -> CatalogResult<bool> {
        bump(&self.calls.namespace_exists);
        self.inner.namespace_exists(namespace)
    }

    fn create_namespace(&self, namespace: &Namespace) -> CatalogResult<()> {
        bump(&self.calls.create_namespace);
        self.inner.create_namespace(namespace)
    }
}

pub fn canal_options() -> MultipleSinkOptions {
    MultipleSinkOptions::new(FormatKind::CanalJson, "${database}", "${table}")
}

pub fn operator(
    catalog: &Arc<CountingCatalog>,
    options: MultipleSinkOptions,
) -> DynamicSchemaOperator {
    init_tracing();
    DynamicSchemaOperator::new(Arc::clone(catalog) as Arc<dyn TableCatalog>, options)
}

/// A canal-json INSERT of one row into `shop.<table>`, keyed on `id`.
pub fn canal_insert(table: &str, row: Value) -> Vec<u8> {
    canal_change(table, "INSERT", json!([row]))
}

/// A canal-json DML event of operation `op` with the given `data` array.
pub fn canal_change(table: &str, op: &str, data: Value) -> Vec<u8> {
    json!({
        "data": data,
        "old": null,
        "database": "shop",
        "table": table,
        "pkNames": ["id"],
        "isDdl": false,
        "type": op
    })
    .to_string()
    .into_bytes()
}

pub fn table(name: &str) -> TableIdentifier {
    TableIdentifier::of(["shop"], name)
}

pub fn field_names(schema: &TableSchema) -> Vec<String> {
    schema.field_names().map(str::to_string).collect()
}
