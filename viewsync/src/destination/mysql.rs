use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Connection, Executor, Row as _};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use viewsync_config::shared::MySqlConnectionConfig;

use crate::destination::DestinationClient;
use crate::error::{ErrorKind, SyncResult};
use crate::mutation::Mutation;
use crate::sync_error;
use crate::types::{Cell, ReplicationPosition};

/// Column of the position query holding the current log file name.
const FILE_COLUMN: &str = "File";
/// Column of the position query holding the offset within the log file.
const POSITION_COLUMN: &str = "Position";

/// Destination writing views into a MySQL compatible server over a single connection.
#[derive(Debug, Clone)]
pub struct MySqlDestination {
    options: MySqlConnectOptions,
    connection: Arc<Mutex<Option<MySqlConnection>>>,
}

impl MySqlDestination {
    pub fn new(config: &MySqlConnectionConfig) -> Self {
        Self::with_options(config.connect_options())
    }

    pub fn with_options(options: MySqlConnectOptions) -> Self {
        Self {
            options,
            connection: Arc::new(Mutex::new(None)),
        }
    }

    async fn run_raw(&self, statement: &str) -> SyncResult<()> {
        let mut guard = self.connection.lock().await;
        let connection: &mut MySqlConnection = connected(&mut guard)?;

        connection.execute(sqlx::raw_sql(statement)).await?;

        Ok(())
    }
}

impl DestinationClient for MySqlDestination {
    fn name() -> &'static str {
        "mysql"
    }

    async fn connect(&self) -> SyncResult<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let connection = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|err| {
                sync_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "Failed to connect to the destination",
                    err.to_string(),
                    source: err
                )
            })?;
        *guard = Some(connection);

        info!("connected to the destination");

        Ok(())
    }

    async fn begin_transaction(&self) -> SyncResult<()> {
        // The position read inside the transaction is only consistent with its snapshot under
        // repeatable read.
        self.run_raw("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .await?;
        self.run_raw("START TRANSACTION WITH CONSISTENT SNAPSHOT")
            .await
    }

    async fn current_position(&self, query: &str) -> SyncResult<Option<ReplicationPosition>> {
        let mut guard = self.connection.lock().await;
        let connection: &mut MySqlConnection = connected(&mut guard)?;

        let row = connection.fetch_optional(sqlx::query(query)).await?;

        row.as_ref().map(position_from_row).transpose()
    }

    async fn execute_statement(&self, statement: &str) -> SyncResult<()> {
        self.run_raw(statement).await
    }

    async fn execute(&self, mutation: &Mutation) -> SyncResult<()> {
        let (statement, values) = mutation.to_prepared();

        let mut query = sqlx::query(&statement);
        for value in values {
            query = bind_cell(query, value);
        }

        let mut guard = self.connection.lock().await;
        let connection: &mut MySqlConnection = connected(&mut guard)?;
        let result = connection.execute(query).await?;

        debug!(
            rows_affected = result.rows_affected(),
            "executed mutation on {}",
            mutation.table()
        );

        Ok(())
    }

    async fn commit(&self) -> SyncResult<()> {
        self.run_raw("COMMIT").await
    }

    async fn rollback(&self) -> SyncResult<()> {
        self.run_raw("ROLLBACK").await
    }

    async fn close(&self) -> SyncResult<()> {
        let Some(connection) = self.connection.lock().await.take() else {
            return Ok(());
        };

        connection.close().await?;

        info!("closed the destination connection");

        Ok(())
    }
}

fn connected<'a>(
    guard: &'a mut MutexGuard<'_, Option<MySqlConnection>>,
) -> SyncResult<&'a mut MySqlConnection> {
    guard.as_mut().ok_or_else(|| {
        sync_error!(
            ErrorKind::DestinationConnectionFailed,
            "Destination is not connected"
        )
    })
}

/// Reads the log file and offset columns returned by the position query.
fn position_from_row(row: &MySqlRow) -> SyncResult<ReplicationPosition> {
    let log_file_name: String = row.try_get(FILE_COLUMN)?;
    let log_offset: u64 = row.try_get(POSITION_COLUMN)?;

    Ok(ReplicationPosition::new(log_file_name, log_offset))
}

fn bind_cell(
    query: Query<'_, MySql, MySqlArguments>,
    value: Cell,
) -> Query<'_, MySql, MySqlArguments> {
    match value {
        Cell::Null => query.bind(Option::<String>::None),
        Cell::Bool(value) => query.bind(value),
        Cell::I64(value) => query.bind(value),
        Cell::U64(value) => query.bind(value),
        Cell::F64(value) => query.bind(value),
        Cell::Decimal(value) | Cell::String(value) => query.bind(value),
        Cell::Bytes(value) => query.bind(value),
        Cell::Date(value) => query.bind(value),
        Cell::Time(value) => query.bind(value),
        Cell::DateTime(value) => query.bind(value),
        Cell::Timestamp(value) => query.bind(value),
        Cell::Json(value) => query.bind(sqlx::types::Json(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::bootstrap;
    use crate::registry::HandlerRegistry;
    use crate::types::{Row, TableName};
    use crate::views::{ViewDefinition, compile};

    /// Environment variable holding the URL of a scratch MySQL database.
    const TEST_DATABASE_URL_ENV: &str = "VIEWSYNC_TEST_MYSQL_URL";

    fn unreachable_destination() -> MySqlDestination {
        MySqlDestination::with_options(
            MySqlConnectOptions::new()
                .host("127.0.0.1")
                .port(1)
                .username("root"),
        )
    }

    #[tokio::test]
    async fn calls_before_connect_fail_without_a_connection() {
        let destination = unreachable_destination();

        let err = destination.execute_statement("SELECT 1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);

        let err = destination
            .current_position("SHOW MASTER STATUS")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);

        let err = destination
            .execute(&Mutation::delete("orders_summary", "order_id", Cell::I64(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
        assert!(!err.is_statement_error());
    }

    #[tokio::test]
    async fn close_without_connection_is_a_no_op() {
        unreachable_destination().close().await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let err = unreachable_destination().connect().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
    }

    #[tokio::test]
    #[ignore = "requires a MySQL server with binary logging, set VIEWSYNC_TEST_MYSQL_URL"]
    async fn mutations_and_bootstrap_run_against_mysql() {
        let url = std::env::var(TEST_DATABASE_URL_ENV).unwrap();
        let destination = MySqlDestination::with_options(url.parse().unwrap());
        destination.connect().await.unwrap();

        destination
            .execute_statement("DROP TABLE IF EXISTS viewsync_orders_summary")
            .await
            .unwrap();
        destination
            .execute_statement(
                "CREATE TABLE viewsync_orders_summary (order_id BIGINT PRIMARY KEY, status VARCHAR(32))",
            )
            .await
            .unwrap();

        let mut registry = HandlerRegistry::new();
        registry.append(
            compile(
                &ViewDefinition::direct(
                    "viewsync_orders_summary",
                    "order_id",
                    TableName::new("shop", "orders"),
                    ["status"],
                )
                .with_init_statement("INSERT INTO viewsync_orders_summary VALUES (1, 'new')"),
            )
            .unwrap(),
        );
        let position = bootstrap(&destination, "SHOW MASTER STATUS", registry.init_statements())
            .await
            .unwrap();
        assert!(!position.log_file_name.is_empty());

        destination
            .execute(&Mutation::insert(
                "viewsync_orders_summary",
                Row::new().with("order_id", 2).with("status", "it's new"),
            ))
            .await
            .unwrap();
        destination
            .execute(&Mutation::update(
                "viewsync_orders_summary",
                Row::new().with("status", "paid"),
                "order_id",
                Cell::I64(1),
            ))
            .await
            .unwrap();

        // A duplicate key is rejected by the server and reported as a skippable statement error.
        let err = destination
            .execute(&Mutation::insert(
                "viewsync_orders_summary",
                Row::new().with("order_id", 2).with("status", "new"),
            ))
            .await
            .unwrap_err();
        assert!(err.is_statement_error());

        destination
            .execute(&Mutation::delete(
                "viewsync_orders_summary",
                "order_id",
                Cell::I64(2),
            ))
            .await
            .unwrap();
        destination
            .execute_statement("DROP TABLE viewsync_orders_summary")
            .await
            .unwrap();
        destination.close().await.unwrap();
    }
}
