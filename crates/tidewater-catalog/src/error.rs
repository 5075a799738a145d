//! Catalog error types.
//!
//! Provides [`CatalogError`] for every fallible catalog operation, plus a
//! convenience [`CatalogResult`] alias.

use thiserror::Error;

use crate::identifier::{Namespace, TableIdentifier};

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors returned by a [`TableCatalog`](crate::TableCatalog).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A namespace with the same name was created first.
    #[error("namespace '{0}' already exists")]
    NamespaceAlreadyExists(Namespace),

    /// A table with the same identifier was created first.
    #[error("table '{0}' already exists")]
    TableAlreadyExists(TableIdentifier),

    /// The namespace does not exist.
    #[error("namespace '{0}' does not exist")]
    NoSuchNamespace(Namespace),

    /// The table does not exist.
    #[error("table '{0}' does not exist")]
    NoSuchTable(TableIdentifier),

    /// The table's schema moved on between load and commit.
    #[error(
        "commit conflict on table '{table}': transaction based on schema {expected}, \
         table is at schema {actual}"
    )]
    CommitConflict {
        /// The table being altered.
        table: TableIdentifier,
        /// Schema id the transaction was based on.
        expected: i32,
        /// Schema id the table currently has.
        actual: i32,
    },

    /// A schema update referenced a missing column or duplicated an existing one.
    #[error("invalid schema update: {0}")]
    InvalidUpdate(String),

    /// The catalog backend could not be reached or refused the request.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    /// Returns `true` for the benign "already exists" races raised by
    /// concurrent creators of the same namespace or table.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::NamespaceAlreadyExists(_) | Self::TableAlreadyExists(_)
        )
    }

    /// Returns `true` if an optimistic commit lost against a concurrent writer.
    #[must_use]
    pub fn is_commit_conflict(&self) -> bool {
        matches!(self, Self::CommitConflict { .. })
    }
}
