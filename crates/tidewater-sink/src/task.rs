//! Dedicated tokio task owning one [`DynamicSchemaOperator`].
//!
//! Payloads arrive over a bounded command channel and are processed one at
//! a time; the diagnostic timer only fires between payloads. Reconciled
//! records are forwarded to the output channel in emission order.
//!
//! A fatal operator error ends the task. The error is returned from
//! [`SchemaTaskHandle::close`]; restarting is left to the caller.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{SinkError, SinkResult};
use crate::metrics::OperatorMetrics;
use crate::operator::DynamicSchemaOperator;
use crate::record::ReconciledRecord;

/// Default capacity for the command channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Commands sent to the operator's task.
enum SchemaCommand {
    /// Process one raw payload.
    Process { payload: Vec<u8> },
    /// Stop the task.
    Close,
}

/// Handle for feeding payloads to an operator's task.
///
/// Cheaply cloneable; every clone feeds the same task.
#[derive(Clone)]
pub struct SchemaTaskHandle {
    name: Arc<str>,
    tx: mpsc::Sender<SchemaCommand>,
    metrics: Arc<OperatorMetrics>,
    task: Arc<tokio::sync::Mutex<Option<JoinHandle<SinkResult<()>>>>>,
}

impl std::fmt::Debug for SchemaTaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaTaskHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SchemaTaskHandle {
    /// Spawns the task with the default channel capacity.
    ///
    /// The diagnostic timer runs at the operator's configured interval.
    #[must_use]
    pub fn spawn(operator: DynamicSchemaOperator, output: mpsc::Sender<ReconciledRecord>) -> Self {
        Self::spawn_with_options("dynamic-schema", operator, output, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Spawns the task with a custom name and channel capacity.
    #[must_use]
    pub fn spawn_with_options(
        name: &str,
        operator: DynamicSchemaOperator,
        output: mpsc::Sender<ReconciledRecord>,
        channel_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let name: Arc<str> = Arc::from(name);
        let metrics = operator.metrics();
        let handle = tokio::spawn(run_schema_task(Arc::clone(&name), operator, rx, output));

        Self {
            name,
            tx,
            metrics,
            task: Arc::new(tokio::sync::Mutex::new(Some(handle))),
        }
    }

    /// Returns the operator's metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<OperatorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Queues a payload. Applies backpressure when the channel is full.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Closed` if the task has stopped.
    pub async fn process(&self, payload: Vec<u8>) -> SinkResult<()> {
        self.tx
            .send(SchemaCommand::Process { payload })
            .await
            .map_err(|_| SinkError::Closed(format!("schema task '{}' has stopped", self.name)))
    }

    /// Stops the task after the payloads queued before this call and
    /// returns how it ended.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the task, or
    /// `SinkError::Closed` if the task panicked.
    pub async fn close(&self) -> SinkResult<()> {
        let _ = self.tx.send(SchemaCommand::Close).await;
        let Some(handle) = self.task.lock().await.take() else {
            return Ok(());
        };
        handle
            .await
            .map_err(|e| SinkError::Closed(format!("schema task '{}' panicked: {e}", self.name)))?
    }
}

/// Main loop for an operator task. Owns the operator exclusively.
async fn run_schema_task(
    name: Arc<str>,
    mut operator: DynamicSchemaOperator,
    mut rx: mpsc::Receiver<SchemaCommand>,
    output: mpsc::Sender<ReconciledRecord>,
) -> SinkResult<()> {
    let mut diagnostic_timer = tokio::time::interval(operator.options().diagnostic_interval());
    diagnostic_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Skip the first immediate tick
    diagnostic_timer.tick().await;

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let Some(SchemaCommand::Process { payload }) = cmd else {
                    tracing::debug!(task = %name, "Schema task closed");
                    return Ok(());
                };
                let records = operator.process_element(&payload).map_err(|e| {
                    tracing::error!(task = %name, error = %e, "Schema task stopped on fatal error");
                    e
                })?;
                for record in records {
                    if output.send(record).await.is_err() {
                        return Err(SinkError::Closed(format!(
                            "output of schema task '{name}' was dropped"
                        )));
                    }
                }
            }
            _ = diagnostic_timer.tick() => {
                operator.on_diagnostic_timer(Utc::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::MultipleSinkOptions;
    use crate::format::FormatKind;
    use serde_json::json;
    use tidewater_catalog::{InMemoryCatalog, TableCatalog, TableIdentifier};

    fn operator_with_interval(interval: Duration) -> DynamicSchemaOperator {
        let catalog: Arc<dyn TableCatalog> = Arc::new(InMemoryCatalog::new("mem"));
        let options = MultipleSinkOptions::new(FormatKind::CanalJson, "${database}", "${table}")
            .with_diagnostic_interval(interval)
            .unwrap();
        DynamicSchemaOperator::new(catalog, options)
    }

    fn operator() -> DynamicSchemaOperator {
        operator_with_interval(Duration::from_secs(60))
    }

    fn payload(table: &str, id: i64) -> Vec<u8> {
        json!({
            "data": [{"id": id}],
            "database": "db",
            "table": table,
            "pkNames": ["id"],
            "type": "INSERT"
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_process_and_close() {
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let handle = SchemaTaskHandle::spawn(operator(), out_tx);

        handle.process(payload("a", 1)).await.unwrap();
        handle.process(payload("b", 2)).await.unwrap();
        handle.process(payload("a", 3)).await.unwrap();
        handle.close().await.unwrap();

        let mut tables = Vec::new();
        while let Some(record) = out_rx.recv().await {
            tables.push(record.table_id.name().to_string());
        }
        assert_eq!(tables, vec!["a", "b", "a"]);
        assert_eq!(handle.metrics().snapshot().records_received, 3);
    }

    #[tokio::test]
    async fn test_fatal_error_ends_task() {
        let (out_tx, _out_rx) = mpsc::channel(16);
        let handle = SchemaTaskHandle::spawn(operator(), out_tx);

        handle.process(b"{broken".to_vec()).await.unwrap();
        let err = handle.close().await.unwrap_err();
        assert!(matches!(err, SinkError::Decode(_)));

        let err = handle.process(payload("a", 1)).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed(_)));
        // Second close is a no-op.
        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_output_is_fatal() {
        let (out_tx, out_rx) = mpsc::channel(1);
        drop(out_rx);
        let handle = SchemaTaskHandle::spawn(operator(), out_tx);
        handle.process(payload("a", 1)).await.unwrap();
        assert!(matches!(handle.close().await, Err(SinkError::Closed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnostic_ticks_between_records() {
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let operator = operator_with_interval(Duration::from_millis(100));
        let handle = SchemaTaskHandle::spawn(operator, out_tx);

        handle.process(payload("a", 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.process(payload("a", 2)).await.unwrap();
        handle.close().await.unwrap();

        // Runs at the operator's 100ms interval, not the default.
        let runs = handle.metrics().snapshot().diagnostic_runs;
        assert!((3..10).contains(&runs), "diagnostic runs: {runs}");

        let mut ids = Vec::new();
        while let Some(record) = out_rx.recv().await {
            assert_eq!(record.table_id, TableIdentifier::of(["db"], "a"));
            ids.push(record.num_rows());
        }
        assert_eq!(ids, vec![1, 1]);
    }
}
