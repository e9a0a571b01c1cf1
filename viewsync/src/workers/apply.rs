use futures::StreamExt;
use std::pin::pin;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::router::EventRouter;
use crate::source::LogReader;
use crate::types::{BinlogEvent, ReplicationPosition, StartPosition};
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::writer::MutationTx;
use crate::{bail, sync_error};

/// Progress of the apply worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyWorkerState {
    /// Last position known to be fully routed. `None` until the log reports its first position
    /// when streaming from the latest position.
    pub position: Option<ReplicationPosition>,
    /// Row events received from the log.
    pub events_processed: u64,
    /// Mutations handed to the destination writer.
    pub mutations_queued: u64,
}

/// Handle of the apply worker.
#[derive(Debug)]
pub struct ApplyWorkerHandle {
    state_rx: watch::Receiver<ApplyWorkerState>,
    handle: Option<JoinHandle<SyncResult<()>>>,
}

impl WorkerHandle<ApplyWorkerState> for ApplyWorkerHandle {
    fn state(&self) -> ApplyWorkerState {
        self.state_rx.borrow().clone()
    }

    async fn wait(mut self) -> SyncResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            if err.is_cancelled() {
                sync_error!(
                    ErrorKind::ApplyWorkerPanic,
                    "Apply worker was cancelled",
                    err
                )
            } else {
                sync_error!(ErrorKind::ApplyWorkerPanic, "Apply worker panicked", err)
            }
        })??;

        Ok(())
    }
}

/// Worker consuming the replication log.
///
/// Events are processed one at a time: each row event is routed to completion and its mutations
/// are queued for the destination writer before the next event is read. The worker stops when
/// shutdown is signalled or the log stream ends.
#[derive(Debug)]
pub struct ApplyWorker<R> {
    engine_name: String,
    reader: R,
    router: EventRouter,
    start_position: StartPosition,
    mutations_tx: MutationTx,
    shutdown_rx: ShutdownRx,
}

impl<R> ApplyWorker<R> {
    pub fn new(
        engine_name: String,
        reader: R,
        router: EventRouter,
        start_position: StartPosition,
        mutations_tx: MutationTx,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            engine_name,
            reader,
            router,
            start_position,
            mutations_tx,
            shutdown_rx,
        }
    }
}

impl<R> Worker<ApplyWorkerHandle, ApplyWorkerState> for ApplyWorker<R>
where
    R: LogReader + Send + Sync + 'static,
{
    type Error = SyncError;

    async fn start(self) -> SyncResult<ApplyWorkerHandle> {
        info!("starting apply worker from {}", self.start_position);

        let initial_position = match &self.start_position {
            StartPosition::Latest => None,
            StartPosition::At(position) => Some(position.clone()),
        };
        let (state_tx, state_rx) = watch::channel(ApplyWorkerState {
            position: initial_position,
            ..ApplyWorkerState::default()
        });

        let ApplyWorker {
            engine_name,
            reader,
            mut router,
            start_position,
            mutations_tx,
            mut shutdown_rx,
        } = self;

        // Subscribing before spawning surfaces a rejected start position to the caller.
        let events = reader.start(start_position).await?;

        let apply_worker_span = tracing::info_span!("apply_worker", engine = engine_name);
        let apply_worker = async move {
            let mut events = pin!(events);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.wait_for_shutdown() => {
                        info!("shutting down apply worker");

                        reader.stop().await?;
                        break;
                    }

                    event = events.next() => {
                        let Some(event) = event else {
                            info!("replication log stream ended");
                            break;
                        };

                        let applied = event.and_then(|event| {
                            apply_event(event, &mut router, &mutations_tx, &state_tx)
                        });
                        if let Err(err) = applied {
                            error!("apply worker failed: {}", err);

                            if let Err(stop_err) = reader.stop().await {
                                error!("failed to stop the log reader: {}", stop_err);
                            }

                            return Err(err);
                        }
                    }
                }
            }

            let position = state_tx.borrow().position.clone();
            match position {
                Some(position) => info!("apply worker stopped at {}", position),
                None => info!("apply worker stopped before any position was reported"),
            }

            Ok(())
        }
        .instrument(apply_worker_span.or_current());

        let handle = tokio::spawn(apply_worker);

        Ok(ApplyWorkerHandle {
            state_rx,
            handle: Some(handle),
        })
    }
}

fn apply_event(
    event: BinlogEvent,
    router: &mut EventRouter,
    mutations_tx: &MutationTx,
    state_tx: &watch::Sender<ApplyWorkerState>,
) -> SyncResult<()> {
    match event {
        BinlogEvent::Rotate(rotate) => {
            debug!("log rotated to {}", rotate.position);

            state_tx.send_modify(|state| state.position = Some(rotate.position));
        }
        BinlogEvent::TableMap(table_map) => {
            router.handle_table_map(&table_map);
        }
        BinlogEvent::Rows(change) => {
            let mutations = router.route(&change);
            let queued = mutations.len() as u64;

            for mutation in mutations {
                if mutations_tx.send(mutation).is_err() {
                    bail!(
                        ErrorKind::DestinationError,
                        "Destination writer stopped",
                        "Mutations can no longer be queued because the destination writer exited"
                    );
                }
            }

            state_tx.send_modify(|state| {
                state.events_processed += 1;
                state.mutations_queued += queued;
                if let (Some(position), Some(next_offset)) =
                    (state.position.as_mut(), change.next_offset)
                {
                    position.log_offset = next_offset;
                }
            });
        }
        BinlogEvent::Unsupported => {}
    }

    Ok(())
}
