//! # Tidewater Catalog
//!
//! The table catalog contract consumed by the Tidewater sink, plus an
//! in-memory implementation.
//!
//! - [`TableCatalog`] / [`NamespaceCatalog`]: blocking catalog operations
//! - [`TableSchema`]: ordered fields with catalog-assigned ids
//! - [`Transaction`]: atomic, optimistically checked schema alteration
//! - [`InMemoryCatalog`]: thread-safe reference catalog

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod catalog;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod schema;
pub mod table;
pub mod transaction;

pub use catalog::{NamespaceCatalog, TableCatalog};
pub use error::{CatalogError, CatalogResult};
pub use identifier::{Namespace, TableIdentifier};
pub use memory::InMemoryCatalog;
pub use schema::{TableField, TableSchema, FIELD_ID_META_KEY, UNASSIGNED_FIELD_ID};
pub use table::{
    PartitionSpec, TableMetadata, ENGINE_HIVE_ENABLED, FORMAT_VERSION, WRITE_UPSERT_ENABLED,
};
pub use transaction::{SchemaUpdate, Transaction, UpdateSchema};
