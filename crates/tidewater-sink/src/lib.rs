//! # Tidewater Sink
//!
//! Dynamic schema reconciliation for multi-table CDC sinks.
//!
//! Records bound for many target tables arrive on one stream. Each record is
//! queued per table and released once the table's catalog schema covers it,
//! evolving the schema through the catalog when policy allows. Tables whose
//! required changes are refused, or whose records cannot be projected, are
//! blacklisted without stalling the others.
//!
//! - [`format`]: payload adapters ([`CanalJsonFormat`], [`DebeziumJsonFormat`])
//! - [`schema`]: compatibility, diff and policy-gated evolution
//! - [`state`]: per-table state and pending queues
//! - [`operator`]: the dispatch loop ([`DynamicSchemaOperator`])
//! - [`task`]: a tokio task driving one operator ([`SchemaTaskHandle`])

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod format;
pub mod metrics;
pub mod operator;
pub mod policy;
pub mod record;
pub mod schema;
pub mod state;
pub mod task;

pub use config::{ConnectorConfig, MultipleSinkOptions};
pub use error::{SinkError, SinkResult};
pub use format::{
    create_format, CanalJsonFormat, DebeziumJsonFormat, DynamicSchemaFormat, FormatKind,
};
pub use metrics::{MetricsSnapshot, OperatorMetrics};
pub use operator::DynamicSchemaOperator;
pub use policy::{PolicyDecision, SchemaUpdatePolicy};
pub use record::{ReconciledRecord, RecordWithSchema, RowKind};
pub use schema::{diff_schemas, is_compatible, EvolutionOutcome, SchemaEvolver, TableChange};
pub use state::{TableState, TableStateCache};
pub use task::SchemaTaskHandle;
