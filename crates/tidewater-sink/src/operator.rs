//! The dynamic schema reconciliation operator.
//!
//! [`DynamicSchemaOperator::process_element`] is the single entry point per
//! incoming payload. DML records are queued per table, then the table is
//! either bootstrapped (first sighting) or drained against its current
//! schema. Draining stops at the first record the table's schema does not
//! cover and reconciles the table through [`SchemaEvolver`] until the head
//! record can be emitted, or the table is blacklisted.
//!
//! One operator instance is single-threaded and owns its state exclusively;
//! only the catalog is shared.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tidewater_catalog::{
    Namespace, PartitionSpec, TableCatalog, TableIdentifier, TableSchema, ENGINE_HIVE_ENABLED,
    FORMAT_VERSION, WRITE_UPSERT_ENABLED,
};

use crate::config::{ConnectorConfig, MultipleSinkOptions};
use crate::error::{SinkError, SinkResult};
use crate::format::{create_format, DynamicSchemaFormat};
use crate::metrics::OperatorMetrics;
use crate::record::{ReconciledRecord, RecordWithSchema};
use crate::schema::{is_compatible, EvolutionOutcome, SchemaEvolver};
use crate::state::{TableState, TableStateCache};

/// Routes CDC records to per-table queues and keeps table schemas in step.
pub struct DynamicSchemaOperator {
    catalog: Arc<dyn TableCatalog>,
    format: Box<dyn DynamicSchemaFormat>,
    options: MultipleSinkOptions,
    evolver: SchemaEvolver,
    state: TableStateCache,
    metrics: Arc<OperatorMetrics>,
}

impl std::fmt::Debug for DynamicSchemaOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicSchemaOperator")
            .field("catalog", &self.catalog.name())
            .field("format", &self.format.name())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl DynamicSchemaOperator {
    /// Creates an operator writing through `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn TableCatalog>, options: MultipleSinkOptions) -> Self {
        let evolver = SchemaEvolver::new(
            Arc::clone(&catalog),
            options.add_column_policy,
            options.delete_column_policy,
        );
        Self {
            format: create_format(options.format),
            catalog,
            options,
            evolver,
            state: TableStateCache::new(),
            metrics: Arc::new(OperatorMetrics::default()),
        }
    }

    /// Creates an operator from raw connector options.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the options are invalid.
    pub fn from_config(catalog: Arc<dyn TableCatalog>, config: &ConnectorConfig) -> SinkResult<Self> {
        Ok(Self::new(catalog, MultipleSinkOptions::from_config(config)?))
    }

    /// Returns the operator options.
    #[must_use]
    pub fn options(&self) -> &MultipleSinkOptions {
        &self.options
    }

    /// Returns the shared metrics handle.
    #[must_use]
    pub fn metrics(&self) -> Arc<OperatorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the reconciliation state of `table`.
    #[must_use]
    pub fn table_state(&self, table: &TableIdentifier) -> TableState {
        self.state.state(table)
    }

    /// Returns `true` if `table` is blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self, table: &TableIdentifier) -> bool {
        self.state.is_blacklisted(table)
    }

    /// Returns the blacklisted tables, sorted.
    #[must_use]
    pub fn blacklisted_tables(&self) -> Vec<TableIdentifier> {
        self.state.blacklisted()
    }

    /// Returns the number of records buffered for `table`.
    #[must_use]
    pub fn pending_records(&self, table: &TableIdentifier) -> usize {
        self.state.queue_len(table)
    }

    /// Processes one raw payload and returns the records it released.
    ///
    /// Released records may belong to earlier payloads of the same table
    /// that were waiting for its schema; they are returned in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Decode` for malformed payloads and
    /// `SinkError::Catalog` for catalog failures other than creation races
    /// and commit conflicts. Both are fatal to the instance.
    pub fn process_element(&mut self, bytes: &[u8]) -> SinkResult<Vec<ReconciledRecord>> {
        self.metrics.record_received();
        let payload = self.format.decode(bytes)?;
        let table_id = self.format.extract_table_id(
            &payload,
            &self.options.database_pattern,
            &self.options.table_pattern,
        )?;

        if self.state.is_blacklisted(&table_id) {
            tracing::trace!(table = %table_id, "Dropping record for blacklisted table");
            self.metrics.record_dropped(1);
            return Ok(Vec::new());
        }

        if self.format.extract_ddl_flag(&payload) {
            self.handle_ddl(&table_id, &payload);
            return Ok(Vec::new());
        }

        if self.format.validate_dml(&payload)? == 0 {
            tracing::debug!(table = %table_id, "Skipping DML record without rows");
            self.metrics.record_empty_skipped();
            return Ok(Vec::new());
        }

        let primary_keys = self.format.extract_primary_keys(&payload);
        let inferred_schema = self.format.extract_schema(&payload, &primary_keys)?;
        self.state.enqueue(RecordWithSchema {
            payload,
            inferred_schema,
            table_id: table_id.clone(),
            primary_keys,
        });

        let mut out = Vec::new();
        match self.state.current_schema(&table_id) {
            None => self.bootstrap(&table_id, &mut out)?,
            Some(current) => self.drain(&table_id, current, &mut out)?,
        }
        Ok(out)
    }

    /// DDL events are not executed; schema changes are driven by DML only.
    fn handle_ddl(&self, table: &TableIdentifier, _payload: &Value) {
        tracing::debug!(table = %table, "Skipping DDL event");
        self.metrics.record_ddl_skipped();
    }

    /// Logs the blacklisted tables. Mutates no state.
    pub fn on_diagnostic_timer(&self, now: DateTime<Utc>) {
        self.metrics.record_diagnostic_run();
        let blacklisted = self.state.blacklisted();
        if blacklisted.is_empty() {
            tracing::debug!(at = %now, "No blacklisted tables");
            return;
        }
        let tables: Vec<String> = blacklisted.iter().map(ToString::to_string).collect();
        tracing::warn!(
            at = %now,
            count = tables.len(),
            tables = ?tables,
            "Tables blacklisted by schema reconciliation"
        );
    }

    /// Ensures the table exists, publishes its live schema and drains it.
    fn bootstrap(
        &mut self,
        table: &TableIdentifier,
        out: &mut Vec<ReconciledRecord>,
    ) -> SinkResult<()> {
        if !self.catalog.table_exists(table)? {
            let Some(schema) = self.state.front(table).map(|r| r.inferred_schema.clone()) else {
                return Ok(());
            };
            self.ensure_namespace(table.namespace())?;
            self.create_table(table, &schema)?;
        }

        let live = self.catalog.load_table(table)?.schema;
        self.state.publish(table, Arc::clone(&live));
        self.drain(table, live, out)
    }

    fn ensure_namespace(&self, namespace: &Namespace) -> SinkResult<()> {
        let Some(namespaces) = self.catalog.as_namespace_catalog() else {
            return Ok(());
        };
        if namespace.is_empty() || namespaces.namespace_exists(namespace)? {
            return Ok(());
        }
        match namespaces.create_namespace(namespace) {
            Ok(()) => {
                tracing::info!(namespace = %namespace, "Created namespace");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                tracing::warn!(namespace = %namespace, error = %e, "Namespace created concurrently");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create_table(&self, table: &TableIdentifier, schema: &TableSchema) -> SinkResult<()> {
        let properties = HashMap::from([
            (FORMAT_VERSION.to_string(), "2".to_string()),
            (WRITE_UPSERT_ENABLED.to_string(), "true".to_string()),
            (ENGINE_HIVE_ENABLED.to_string(), "true".to_string()),
        ]);
        match self
            .catalog
            .create_table(table, schema, PartitionSpec::Unpartitioned, &properties)
        {
            Ok(metadata) => {
                tracing::info!(table = %table, schema = %metadata.schema, "Created table");
                self.metrics.record_table_created();
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                tracing::warn!(table = %table, error = %e, "Table created concurrently");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Emits queued records head-first while `current` covers them,
    /// reconciling the table whenever the head introduces new columns.
    fn drain(
        &mut self,
        table: &TableIdentifier,
        mut current: Arc<TableSchema>,
        out: &mut Vec<ReconciledRecord>,
    ) -> SinkResult<()> {
        loop {
            let candidate = match self.state.front(table) {
                None => return Ok(()),
                Some(head) if is_compatible(&current, &head.inferred_schema) => None,
                Some(head) => Some(head.inferred_schema.clone()),
            };

            let Some(candidate) = candidate else {
                if !self.emit_head(table, &current, out)? {
                    return Ok(());
                }
                continue;
            };

            let outcome = self.evolver.apply(table, &current, &candidate)?;
            match outcome {
                EvolutionOutcome::Rejected { .. } => {
                    self.blacklist(table, "schema change refused by policy", 0);
                    return Ok(());
                }
                EvolutionOutcome::Evolved { .. } => self.metrics.record_evolution(),
                EvolutionOutcome::Stale { .. } => self.metrics.record_stale(),
                EvolutionOutcome::Ignored { .. } => {}
            }
            current = Arc::clone(outcome.schema());
            self.state.publish(table, Arc::clone(&current));

            // Nothing was executed: emit the head as-is so the queue advances.
            if matches!(outcome, EvolutionOutcome::Ignored { .. })
                && !self.emit_head(table, &current, out)?
            {
                return Ok(());
            }
        }
    }

    /// Pops the head record and emits it projected onto `schema`.
    ///
    /// Returns `false` if there was no head, or the projection failed and
    /// the table was blacklisted.
    fn emit_head(
        &mut self,
        table: &TableIdentifier,
        schema: &Arc<TableSchema>,
        out: &mut Vec<ReconciledRecord>,
    ) -> SinkResult<bool> {
        let Some(record) = self.state.pop_front(table) else {
            return Ok(false);
        };
        match self.format.extract_rows(&record.payload, schema) {
            Ok((row_kinds, rows)) => {
                self.metrics.record_emitted(rows.num_rows() as u64);
                out.push(ReconciledRecord {
                    table_id: record.table_id,
                    schema: Arc::clone(schema),
                    primary_keys: record.primary_keys,
                    row_kinds,
                    rows,
                });
                Ok(true)
            }
            Err(SinkError::Extraction(reason)) => {
                tracing::warn!(
                    table = %table,
                    error = %reason,
                    record_schema = %record.inferred_schema,
                    table_schema = %schema,
                    "Failed to project record onto table schema"
                );
                self.blacklist(table, &reason, 1);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Blacklists `table`, counting `in_flight` popped records plus the
    /// discarded queue as dropped.
    fn blacklist(&mut self, table: &TableIdentifier, reason: &str, in_flight: u64) {
        let pending = self.state.queue_len(table) as u64;
        if self.state.blacklist(table, reason) {
            self.metrics.record_blacklisted();
        }
        self.metrics.record_dropped(pending + in_flight);
    }
}
