//! Table metadata returned by the catalog.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identifier::TableIdentifier;
use crate::schema::TableSchema;

/// Table property: table format version.
pub const FORMAT_VERSION: &str = "format-version";
/// Table property: upsert-mode writes.
pub const WRITE_UPSERT_ENABLED: &str = "write.upsert.enabled";
/// Table property: visibility to an external Hive engine.
pub const ENGINE_HIVE_ENABLED: &str = "engine.hive.enabled";

/// Partition layout of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartitionSpec {
    /// No partitioning.
    #[default]
    Unpartitioned,
}

/// A snapshot of one table's catalog entry.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    /// Table identifier.
    pub identifier: TableIdentifier,
    /// Live schema at load time.
    pub schema: Arc<TableSchema>,
    /// Partition layout.
    pub partition_spec: PartitionSpec,
    /// Table properties.
    pub properties: HashMap<String, String>,
}

impl TableMetadata {
    /// Returns a table property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
