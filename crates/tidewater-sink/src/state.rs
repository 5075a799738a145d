//! Per-table reconciliation state.
//!
//! Each table has exactly one [`TableEntry`] holding its [`TableState`] and
//! its pending FIFO queue. Blacklisting happens in one place
//! ([`TableStateCache::blacklist`]) and is permanent for the cache's life.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tidewater_catalog::{TableIdentifier, TableSchema};

use crate::record::RecordWithSchema;

/// Reconciliation state of one table.
#[derive(Debug, Clone, Default)]
pub enum TableState {
    /// No schema has been published yet.
    #[default]
    Unknown,
    /// The table's current schema.
    Known(Arc<TableSchema>),
    /// The table is permanently excluded; its records are dropped.
    Blacklisted,
}

impl TableState {
    /// Returns the current schema, if known.
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<TableSchema>> {
        match self {
            Self::Known(schema) => Some(schema),
            Self::Unknown | Self::Blacklisted => None,
        }
    }

    /// Returns `true` for [`TableState::Blacklisted`].
    #[must_use]
    pub fn is_blacklisted(&self) -> bool {
        matches!(self, Self::Blacklisted)
    }
}

/// State and pending records of one table.
#[derive(Debug, Default)]
struct TableEntry {
    state: TableState,
    queue: VecDeque<RecordWithSchema>,
}

/// Per-table state and pending queues, owned by one operator instance.
#[derive(Debug, Default)]
pub struct TableStateCache {
    tables: HashMap<TableIdentifier, TableEntry>,
}

impl TableStateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table's state ([`TableState::Unknown`] if never seen).
    #[must_use]
    pub fn state(&self, table: &TableIdentifier) -> TableState {
        self.tables
            .get(table)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// Returns the table's current schema, if known.
    #[must_use]
    pub fn current_schema(&self, table: &TableIdentifier) -> Option<Arc<TableSchema>> {
        self.tables
            .get(table)
            .and_then(|e| e.state.schema().cloned())
    }

    /// Returns `true` if the table is blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self, table: &TableIdentifier) -> bool {
        self.tables
            .get(table)
            .is_some_and(|e| e.state.is_blacklisted())
    }

    /// Appends a record to its table's queue.
    ///
    /// Returns `false` (dropping the record) if the table is blacklisted.
    pub fn enqueue(&mut self, record: RecordWithSchema) -> bool {
        let entry = self.tables.entry(record.table_id.clone()).or_default();
        if entry.state.is_blacklisted() {
            return false;
        }
        entry.queue.push_back(record);
        true
    }

    /// Publishes `schema` as the table's current schema.
    ///
    /// No-op for a blacklisted table.
    pub fn publish(&mut self, table: &TableIdentifier, schema: Arc<TableSchema>) {
        let entry = self.tables.entry(table.clone()).or_default();
        if !entry.state.is_blacklisted() {
            entry.state = TableState::Known(schema);
        }
    }

    /// Blacklists the table and discards its pending records.
    ///
    /// Returns `true` only on the first transition.
    pub fn blacklist(&mut self, table: &TableIdentifier, reason: &str) -> bool {
        let entry = self.tables.entry(table.clone()).or_default();
        if entry.state.is_blacklisted() {
            return false;
        }
        let dropped = entry.queue.len();
        entry.state = TableState::Blacklisted;
        entry.queue.clear();
        tracing::warn!(
            table = %table,
            reason,
            dropped_records = dropped,
            "Table blacklisted, its records will be dropped"
        );
        true
    }

    /// Returns the blacklisted tables, sorted.
    #[must_use]
    pub fn blacklisted(&self) -> Vec<TableIdentifier> {
        let mut tables: Vec<_> = self
            .tables
            .iter()
            .filter(|(_, e)| e.state.is_blacklisted())
            .map(|(id, _)| id.clone())
            .collect();
        tables.sort();
        tables
    }

    /// Returns the head of the table's queue.
    #[must_use]
    pub fn front(&self, table: &TableIdentifier) -> Option<&RecordWithSchema> {
        self.tables.get(table).and_then(|e| e.queue.front())
    }

    /// Removes and returns the head of the table's queue.
    pub fn pop_front(&mut self, table: &TableIdentifier) -> Option<RecordWithSchema> {
        self.tables.get_mut(table).and_then(|e| e.queue.pop_front())
    }

    /// Returns the number of pending records for the table.
    #[must_use]
    pub fn queue_len(&self, table: &TableIdentifier) -> usize {
        self.tables.get(table).map_or(0, |e| e.queue.len())
    }
}
