use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::destination::DestinationClient;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::mutation::Mutation;
use crate::types::{ReplicationPosition, Row};

/// Operation received by a [`MemoryDestination`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationOp {
    Connect,
    BeginTransaction,
    CurrentPosition(String),
    Statement(String),
    Mutation(Mutation),
    Commit,
    Rollback,
    Close,
}

/// Operation a [`MemoryDestination`] can be told to fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FailurePoint {
    Connect,
    BeginTransaction,
    CurrentPosition,
    /// A raw statement with exactly this text.
    Statement(String),
    /// Any mutation against this table.
    MutationOn(String),
    Commit,
}

#[derive(Debug)]
struct Inner {
    connected: bool,
    position: Option<ReplicationPosition>,
    ops: Vec<DestinationOp>,
    tables: HashMap<String, Vec<Row>>,
    failures: Vec<(FailurePoint, SyncError)>,
}

/// In-memory destination for tests.
///
/// Every call is recorded as a [`DestinationOp`]. Mutations are also applied to in-memory tables so
/// tests can inspect the resulting view rows. Failures can be injected per [`FailurePoint`], failed
/// calls are recorded as well.
#[derive(Debug, Clone)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates a destination reporting no replication position.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a destination whose position query returns `position`.
    pub fn with_position(position: ReplicationPosition) -> Self {
        Self::build(Some(position))
    }

    fn build(position: Option<ReplicationPosition>) -> Self {
        let inner = Inner {
            connected: false,
            position,
            ops: Vec::new(),
            tables: HashMap::new(),
            failures: Vec::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Makes every call matching `point` fail with `error`.
    pub async fn fail_on(&self, point: FailurePoint, error: SyncError) {
        let mut inner = self.inner.lock().await;
        inner.failures.push((point, error));
    }

    pub async fn ops(&self) -> Vec<DestinationOp> {
        let inner = self.inner.lock().await;
        inner.ops.clone()
    }

    /// Returns the mutations received so far, including failed ones.
    pub async fn mutations(&self) -> Vec<Mutation> {
        let inner = self.inner.lock().await;
        inner
            .ops
            .iter()
            .filter_map(|op| match op {
                DestinationOp::Mutation(mutation) => Some(mutation.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the rows of `table` after applying every successful mutation.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).cloned().unwrap_or_default()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    async fn record(&self, op: DestinationOp) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        let failure = inner
            .failures
            .iter()
            .find(|(point, _)| matches_failure(point, &op))
            .map(|(_, error)| error.clone());
        let requires_connection = !matches!(op, DestinationOp::Connect | DestinationOp::Close);
        let connected = inner.connected;

        inner.ops.push(op.clone());

        if let Some(error) = failure {
            return Err(error);
        }

        if requires_connection && !connected {
            bail!(
                ErrorKind::DestinationConnectionFailed,
                "Destination is not connected"
            );
        }

        match op {
            DestinationOp::Connect => inner.connected = true,
            DestinationOp::Close => inner.connected = false,
            DestinationOp::Mutation(mutation) => apply(&mut inner.tables, mutation),
            _ => {}
        }

        Ok(())
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationClient for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn connect(&self) -> SyncResult<()> {
        self.record(DestinationOp::Connect).await
    }

    async fn begin_transaction(&self) -> SyncResult<()> {
        self.record(DestinationOp::BeginTransaction).await
    }

    async fn current_position(&self, query: &str) -> SyncResult<Option<ReplicationPosition>> {
        self.record(DestinationOp::CurrentPosition(query.to_string()))
            .await?;

        let inner = self.inner.lock().await;
        Ok(inner.position.clone())
    }

    async fn execute_statement(&self, statement: &str) -> SyncResult<()> {
        info!("executing statement: {}", statement);

        self.record(DestinationOp::Statement(statement.to_string()))
            .await
    }

    async fn execute(&self, mutation: &Mutation) -> SyncResult<()> {
        self.record(DestinationOp::Mutation(mutation.clone())).await
    }

    async fn commit(&self) -> SyncResult<()> {
        self.record(DestinationOp::Commit).await
    }

    async fn rollback(&self) -> SyncResult<()> {
        self.record(DestinationOp::Rollback).await
    }

    async fn close(&self) -> SyncResult<()> {
        self.record(DestinationOp::Close).await
    }
}

fn matches_failure(point: &FailurePoint, op: &DestinationOp) -> bool {
    match (point, op) {
        (FailurePoint::Connect, DestinationOp::Connect)
        | (FailurePoint::BeginTransaction, DestinationOp::BeginTransaction)
        | (FailurePoint::CurrentPosition, DestinationOp::CurrentPosition(_))
        | (FailurePoint::Commit, DestinationOp::Commit) => true,
        (FailurePoint::Statement(expected), DestinationOp::Statement(statement)) => {
            expected == statement
        }
        (FailurePoint::MutationOn(table), DestinationOp::Mutation(mutation)) => {
            mutation.table() == table
        }
        _ => false,
    }
}

/// Applies `mutation` to the in-memory tables. Rows are matched on the key column.
fn apply(tables: &mut HashMap<String, Vec<Row>>, mutation: Mutation) {
    match mutation {
        Mutation::Insert {
            table,
            columns,
            values,
        } => {
            let row: Row = columns.into_iter().zip(values).collect();
            tables.entry(table).or_default().push(row);
        }
        Mutation::Update {
            table,
            assignments,
            key_column,
            key_value,
        } => {
            let rows = tables.entry(table).or_default();
            for row in rows
                .iter_mut()
                .filter(|row| row.value(&key_column).same_value(&key_value))
            {
                for (column, value) in assignments.iter() {
                    row.insert(column, value.clone());
                }
            }
        }
        Mutation::Delete {
            table,
            key_column,
            key_value,
        } => {
            if let Some(rows) = tables.get_mut(&table) {
                rows.retain(|row| !row.value(&key_column).same_value(&key_value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    #[tokio::test]
    async fn mutations_are_applied_to_tables() {
        let destination = MemoryDestination::new();
        destination.connect().await.unwrap();

        destination
            .execute(&Mutation::insert(
                "orders_summary",
                Row::new().with("order_id", 5).with("status", "new"),
            ))
            .await
            .unwrap();
        destination
            .execute(&Mutation::update(
                "orders_summary",
                Row::new().with("status", "paid"),
                "order_id",
                Cell::U64(5),
            ))
            .await
            .unwrap();

        assert_eq!(
            destination.rows("orders_summary").await,
            vec![Row::new().with("order_id", 5).with("status", "paid")]
        );

        destination
            .execute(&Mutation::delete("orders_summary", "order_id", Cell::I64(5)))
            .await
            .unwrap();

        assert!(destination.rows("orders_summary").await.is_empty());
        assert_eq!(destination.mutations().await.len(), 3);
    }

    #[tokio::test]
    async fn injected_failures_are_returned_and_recorded() {
        let destination = MemoryDestination::new();
        destination.connect().await.unwrap();
        destination
            .fail_on(
                FailurePoint::MutationOn("orders_summary".to_string()),
                SyncError::from((
                    ErrorKind::DestinationQueryFailed,
                    "Destination statement failed",
                    "Duplicate entry '5' for key 'PRIMARY'",
                )),
            )
            .await;

        let err = destination
            .execute(&Mutation::delete("orders_summary", "order_id", Cell::I64(5)))
            .await
            .unwrap_err();

        assert!(err.is_statement_error());
        assert_eq!(destination.mutations().await.len(), 1);
    }

    #[tokio::test]
    async fn calls_before_connect_fail() {
        let destination = MemoryDestination::new();

        let err = destination.commit().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
    }
}
