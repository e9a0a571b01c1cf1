#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use viewsync::destination::memory::MemoryDestination;
use viewsync::engine::Engine;
use viewsync::error::{ErrorKind, SyncError};
use viewsync::mutation::Mutation;
use viewsync::source::memory::MemoryLogReader;
use viewsync::types::{ReplicationPosition, TableName};
use viewsync_config::shared::{
    DEFAULT_POSITION_QUERY, EngineConfig, MySqlConnectionConfig, StartConfig, TlsConfig,
};

/// Upper bound for waiting on the workers. Reaching it means the expected state never came.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

pub type TestEngine = Engine<MemoryDestination, MemoryLogReader>;

pub fn connection_config(name: &str) -> MySqlConnectionConfig {
    MySqlConnectionConfig {
        host: "localhost".to_string(),
        port: 3306,
        name: name.to_string(),
        username: "root".to_string(),
        password: None,
        tls: TlsConfig::disabled(),
    }
}

pub fn engine_config(start: StartConfig) -> EngineConfig {
    EngineConfig {
        name: "test_engine".to_string(),
        destination: connection_config("analytics"),
        source: connection_config("shop"),
        start,
        position_query: DEFAULT_POSITION_QUERY.to_string(),
    }
}

pub fn snapshot_position() -> ReplicationPosition {
    ReplicationPosition::new("binlog.000007", 2048)
}

/// Creates an engine over an in-memory destination reporting [`snapshot_position`].
pub fn create_engine(start: StartConfig) -> (TestEngine, MemoryDestination, MemoryLogReader) {
    let destination = MemoryDestination::with_position(snapshot_position());
    let reader = MemoryLogReader::new();
    let engine = Engine::new(engine_config(start), destination.clone(), reader.clone());

    (engine, destination, reader)
}

pub fn orders() -> TableName {
    TableName::new("shop", "orders")
}

pub fn shipments() -> TableName {
    TableName::new("shop", "shipments")
}

/// Error the destination reports when it rejects a statement.
pub fn statement_error(message: &'static str) -> SyncError {
    SyncError::from((
        ErrorKind::DestinationQueryFailed,
        "Destination statement failed",
        message,
    ))
}

/// Polls `condition` until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within [`WAIT_TIMEOUT`].
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let polled = timeout(WAIT_TIMEOUT, async {
        while !condition().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    if polled.is_err() {
        panic!("condition not reached after {WAIT_TIMEOUT:?}");
    }
}

/// Waits until the destination received `count` mutations and returns them.
pub async fn wait_for_mutations(destination: &MemoryDestination, count: usize) -> Vec<Mutation> {
    wait_until(move || async move { destination.mutations().await.len() >= count }).await;

    destination.mutations().await
}
