//! Policy-gated, transactional schema evolution against the catalog.
//!
//! [`SchemaEvolver::apply`] runs one reconciliation round:
//!
//! 1. load the table and check its live schema still equals the schema the
//!    caller believes is current (otherwise the round is [`Stale`])
//! 2. diff the current schema against the candidate
//! 3. evaluate every change against its policy ([`Rejected`] if any refuses)
//! 4. stage the changes whose policy is `Apply` in one transaction and
//!    commit it ([`Ignored`] if nothing needed executing)
//! 5. re-read the live schema so the caller can republish it
//!
//! A commit that loses against a concurrent writer is reported as
//! [`Stale`], not as an error: the caller adopts the winner's schema and
//! tries again.
//!
//! [`Stale`]: EvolutionOutcome::Stale
//! [`Rejected`]: EvolutionOutcome::Rejected
//! [`Ignored`]: EvolutionOutcome::Ignored

use std::sync::Arc;

use tidewater_catalog::{TableCatalog, TableIdentifier, TableSchema, Transaction};

use crate::error::SinkResult;
use crate::policy::SchemaUpdatePolicy;
use crate::schema::diff::{diff_schemas, TableChange};

/// Result of one reconciliation round. Every variant carries the table's
/// live schema, re-read after the round.
#[derive(Debug, Clone)]
pub enum EvolutionOutcome {
    /// The changes were committed.
    Evolved {
        /// Live schema after the commit.
        schema: Arc<TableSchema>,
        /// The changes that were executed.
        applied: Vec<TableChange>,
    },
    /// Every required change was accepted by policy without being executed.
    Ignored {
        /// Live schema (unchanged by this round).
        schema: Arc<TableSchema>,
    },
    /// The catalog no longer matched the caller's schema.
    Stale {
        /// Live schema as left by the other writer.
        schema: Arc<TableSchema>,
    },
    /// A required change was refused by policy. No alteration was issued.
    Rejected {
        /// Live schema (unchanged by this round).
        schema: Arc<TableSchema>,
    },
}

impl EvolutionOutcome {
    /// Returns the live schema re-read after the round.
    #[must_use]
    pub fn schema(&self) -> &Arc<TableSchema> {
        match self {
            Self::Evolved { schema, .. }
            | Self::Ignored { schema }
            | Self::Stale { schema }
            | Self::Rejected { schema } => schema,
        }
    }
}

/// Applies table changes through a [`TableCatalog`], gated by policy.
pub struct SchemaEvolver {
    catalog: Arc<dyn TableCatalog>,
    add_column_policy: SchemaUpdatePolicy,
    delete_column_policy: SchemaUpdatePolicy,
}

impl std::fmt::Debug for SchemaEvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaEvolver")
            .field("catalog", &self.catalog.name())
            .field("add_column_policy", &self.add_column_policy)
            .field("delete_column_policy", &self.delete_column_policy)
            .finish()
    }
}

impl SchemaEvolver {
    /// Creates an evolver with the given per-kind policies.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn TableCatalog>,
        add_column_policy: SchemaUpdatePolicy,
        delete_column_policy: SchemaUpdatePolicy,
    ) -> Self {
        Self {
            catalog,
            add_column_policy,
            delete_column_policy,
        }
    }

    /// Returns the policy governing a change of this kind.
    #[must_use]
    pub fn policy_for(&self, change: &TableChange) -> SchemaUpdatePolicy {
        match change {
            TableChange::AddColumn { .. } => self.add_column_policy,
            TableChange::DeleteColumn { .. } => self.delete_column_policy,
            TableChange::Unsupported { .. } => SchemaUpdatePolicy::LogAndIgnore,
        }
    }

    /// Returns `true` if no change is refused by its policy.
    ///
    /// Every change is evaluated (and logged), even after a refusal.
    #[must_use]
    pub fn can_apply(&self, table: &TableIdentifier, changes: &[TableChange]) -> bool {
        changes
            .iter()
            .map(|change| self.policy_for(change).evaluate(table, change))
            .fold(true, |ok, decision| ok & decision.is_allowed())
    }

    /// Runs one reconciliation round moving `table` from `old` towards `new`.
    ///
    /// # Errors
    ///
    /// Returns a catalog error for anything other than a commit conflict.
    pub fn apply(
        &self,
        table: &TableIdentifier,
        old: &TableSchema,
        new: &TableSchema,
    ) -> SinkResult<EvolutionOutcome> {
        let metadata = self.catalog.load_table(table)?;
        if !metadata.schema.same_schema(old) {
            tracing::debug!(
                table = %table,
                expected = %old,
                live = %metadata.schema,
                "Catalog schema moved on, skipping alteration"
            );
            return Ok(EvolutionOutcome::Stale {
                schema: metadata.schema,
            });
        }

        let changes = diff_schemas(old, new);
        if !self.can_apply(table, &changes) {
            return Ok(EvolutionOutcome::Rejected {
                schema: self.live_schema(table)?,
            });
        }

        let mut txn = Transaction::new(&metadata);
        let mut applied = Vec::new();
        {
            let mut update = txn.update_schema();
            for change in changes {
                if self.policy_for(&change) != SchemaUpdatePolicy::Apply {
                    continue;
                }
                match &change {
                    TableChange::AddColumn {
                        name, data_type, ..
                    } => {
                        update.add_column(name.clone(), data_type.clone());
                    }
                    TableChange::DeleteColumn { name } => {
                        update.delete_column(name.clone());
                    }
                    TableChange::Unsupported { .. } => continue,
                }
                applied.push(change);
            }
        }

        if txn.is_empty() {
            return Ok(EvolutionOutcome::Ignored {
                schema: self.live_schema(table)?,
            });
        }

        match self.catalog.commit_transaction(txn) {
            Ok(_) => {
                let schema = self.live_schema(table)?;
                tracing::info!(
                    table = %table,
                    changes = ?applied.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    schema = %schema,
                    "Schema evolution committed"
                );
                Ok(EvolutionOutcome::Evolved { schema, applied })
            }
            Err(e) if e.is_commit_conflict() => {
                tracing::warn!(
                    table = %table,
                    error = %e,
                    "Schema evolution lost to a concurrent writer, adopting live schema"
                );
                Ok(EvolutionOutcome::Stale {
                    schema: self.live_schema(table)?,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn live_schema(&self, table: &TableIdentifier) -> SinkResult<Arc<TableSchema>> {
        Ok(self.catalog.load_table(table)?.schema)
    }
}
