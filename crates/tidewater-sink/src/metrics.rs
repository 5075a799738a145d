//! Lock-free reconciliation operator metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operator counters using atomics (no locks on the data path).
#[derive(Debug, Default)]
pub struct OperatorMetrics {
    /// Raw records received.
    pub records_received: AtomicU64,
    /// Rows emitted downstream.
    pub rows_emitted: AtomicU64,
    /// Records dropped because their table is blacklisted.
    pub records_dropped: AtomicU64,
    /// DDL events skipped.
    pub ddl_skipped: AtomicU64,
    /// DML records skipped because they carried no rows.
    pub empty_skipped: AtomicU64,
    /// Tables created by bootstrap.
    pub tables_created: AtomicU64,
    /// Schema evolutions committed.
    pub evolutions_committed: AtomicU64,
    /// Reconciliation rounds that found the catalog had moved on.
    pub stale_rounds: AtomicU64,
    /// Tables blacklisted.
    pub tables_blacklisted: AtomicU64,
    /// Diagnostic timer firings.
    pub diagnostic_runs: AtomicU64,
}

impl OperatorMetrics {
    /// Records an incoming raw record.
    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records emitted rows.
    pub fn record_emitted(&self, rows: u64) {
        self.rows_emitted.fetch_add(rows, Ordering::Relaxed);
    }

    /// Records dropped records.
    pub fn record_dropped(&self, records: u64) {
        self.records_dropped.fetch_add(records, Ordering::Relaxed);
    }

    /// Records a skipped DDL event.
    pub fn record_ddl_skipped(&self) {
        self.ddl_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a DML record skipped for carrying no rows.
    pub fn record_empty_skipped(&self) {
        self.empty_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a table created by bootstrap.
    pub fn record_table_created(&self) {
        self.tables_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a committed evolution.
    pub fn record_evolution(&self) {
        self.evolutions_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a stale reconciliation round.
    pub fn record_stale(&self) {
        self.stale_rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a newly blacklisted table.
    pub fn record_blacklisted(&self) {
        self.tables_blacklisted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a diagnostic timer firing.
    pub fn record_diagnostic_run(&self) {
        self.diagnostic_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            rows_emitted: self.rows_emitted.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            ddl_skipped: self.ddl_skipped.load(Ordering::Relaxed),
            empty_skipped: self.empty_skipped.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            evolutions_committed: self.evolutions_committed.load(Ordering::Relaxed),
            stale_rounds: self.stale_rounds.load(Ordering::Relaxed),
            tables_blacklisted: self.tables_blacklisted.load(Ordering::Relaxed),
            diagnostic_runs: self.diagnostic_runs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of operator metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Raw records received.
    pub records_received: u64,
    /// Rows emitted.
    pub rows_emitted: u64,
    /// Records dropped for blacklisted tables.
    pub records_dropped: u64,
    /// DDL events skipped.
    pub ddl_skipped: u64,
    /// Empty DML records skipped.
    pub empty_skipped: u64,
    /// Tables created.
    pub tables_created: u64,
    /// Evolutions committed.
    pub evolutions_committed: u64,
    /// Stale rounds.
    pub stale_rounds: u64,
    /// Tables blacklisted.
    pub tables_blacklisted: u64,
    /// Diagnostic timer firings.
    pub diagnostic_runs: u64,
}
