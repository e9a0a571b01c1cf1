use std::future::Future;

use crate::error::SyncResult;
use crate::mutation::Mutation;
use crate::types::ReplicationPosition;

/// Client of the store holding the views.
///
/// All calls go through one connection, so statements are applied in the order they are issued.
/// Bootstrap uses the transaction calls and [`DestinationClient::current_position`], streaming
/// only [`DestinationClient::execute`].
///
/// Errors returned with [`crate::error::ErrorKind::DestinationQueryFailed`] mean the store
/// rejected a statement and the connection is still usable. Any other error is treated as fatal.
pub trait DestinationClient {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Opens the connection. Calling it on an open connection is a no-op.
    fn connect(&self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Starts a transaction whose snapshot is shared by every statement until commit or rollback.
    fn begin_transaction(&self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Runs `query` and reads the replication log position from its first row.
    ///
    /// Returns `None` when the query yields no row, which happens when binary logging is disabled.
    fn current_position(
        &self,
        query: &str,
    ) -> impl Future<Output = SyncResult<Option<ReplicationPosition>>> + Send;

    /// Executes a raw SQL statement, used for init statements.
    fn execute_statement(&self, statement: &str) -> impl Future<Output = SyncResult<()>> + Send;

    /// Executes a view mutation.
    fn execute(&self, mutation: &Mutation) -> impl Future<Output = SyncResult<()>> + Send;

    fn commit(&self) -> impl Future<Output = SyncResult<()>> + Send;

    fn rollback(&self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Closes the connection. Statements issued afterwards fail.
    fn close(&self) -> impl Future<Output = SyncResult<()>> + Send;
}
