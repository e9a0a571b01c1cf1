//! Initial population of the views.
//!
//! The init statements run in a single destination transaction, opened before the replication log
//! position is captured. Streaming resumes from that position once the transaction commits, so
//! changes are neither missed nor required twice as long as the destination reads the position
//! and the snapshot from the same consistent view.

use tracing::{error, info};

use crate::destination::DestinationClient;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::types::ReplicationPosition;
use crate::{bail, sync_error};

/// Populates the views and returns the position streaming must start from.
///
/// Runs `begin → capture position → init statements → commit`. Any failure rolls the transaction
/// back and is returned, nothing is retried.
pub async fn bootstrap<D>(
    destination: &D,
    position_query: &str,
    init_statements: &[String],
) -> SyncResult<ReplicationPosition>
where
    D: DestinationClient,
{
    info!(
        "bootstrapping views with {} init statements",
        init_statements.len()
    );

    if let Err(err) = destination.begin_transaction().await {
        return Err(rollback(destination, err).await);
    }

    let position = match populate(destination, position_query, init_statements).await {
        Ok(position) => position,
        Err(err) => return Err(rollback(destination, err).await),
    };

    if let Err(err) = destination.commit().await {
        return Err(rollback(destination, err).await);
    }

    info!("bootstrap committed, streaming resumes from {}", position);

    Ok(position)
}

async fn populate<D>(
    destination: &D,
    position_query: &str,
    init_statements: &[String],
) -> SyncResult<ReplicationPosition>
where
    D: DestinationClient,
{
    let Some(position) = destination.current_position(position_query).await? else {
        bail!(
            ErrorKind::ConfigError,
            "Replication log position is unavailable",
            format!(
                "The query '{position_query}' returned no row, binary logging may be disabled on the source"
            )
        );
    };

    info!("captured replication log position {}", position);

    for statement in init_statements {
        info!("executing: {}", statement);

        destination
            .execute_statement(statement)
            .await
            .map_err(|err| {
                sync_error!(
                    ErrorKind::BootstrapFailed,
                    "Init statement failed",
                    format!(
                        "'{statement}' failed: {}",
                        err.detail().unwrap_or(err.description())
                    ),
                    source: err
                )
            })?;
    }

    Ok(position)
}

/// Rolls back the bootstrap transaction after `err`, returning the error to report.
async fn rollback<D>(destination: &D, err: SyncError) -> SyncError
where
    D: DestinationClient,
{
    error!("bootstrap failed, rolling back: {}", err);

    match destination.rollback().await {
        Ok(()) => err,
        Err(rollback_err) => {
            error!("failed to roll back the bootstrap transaction: {}", rollback_err);

            vec![err, rollback_err].into()
        }
    }
}
