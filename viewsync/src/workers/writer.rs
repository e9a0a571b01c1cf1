use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info};

use crate::concurrency::shutdown::ShutdownTx;
use crate::destination::DestinationClient;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::mutation::Mutation;
use crate::sync_error;
use crate::workers::base::{Worker, WorkerHandle};

/// Queue of mutations waiting for the destination writer. Unbounded, a slow destination makes it
/// grow.
pub type MutationTx = mpsc::UnboundedSender<Mutation>;
pub type MutationRx = mpsc::UnboundedReceiver<Mutation>;

pub fn create_mutation_queue() -> (MutationTx, MutationRx) {
    mpsc::unbounded_channel()
}

/// Counters of the destination writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterWorkerState {
    /// Mutations applied by the destination.
    pub executed: u64,
    /// Mutations the destination rejected and that were dropped.
    pub skipped: u64,
}

/// Handle of the destination writer.
#[derive(Debug)]
pub struct WriterWorkerHandle {
    state_rx: watch::Receiver<WriterWorkerState>,
    handle: Option<JoinHandle<SyncResult<()>>>,
}

impl WorkerHandle<WriterWorkerState> for WriterWorkerHandle {
    fn state(&self) -> WriterWorkerState {
        *self.state_rx.borrow()
    }

    async fn wait(mut self) -> SyncResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            if err.is_cancelled() {
                sync_error!(
                    ErrorKind::WriterWorkerPanic,
                    "Destination writer was cancelled",
                    err
                )
            } else {
                sync_error!(
                    ErrorKind::WriterWorkerPanic,
                    "Destination writer panicked",
                    err
                )
            }
        })??;

        Ok(())
    }
}

/// Worker executing mutations on the destination, one at a time and in queue order.
///
/// Statements the destination rejects with a message are logged and dropped. Any other failure
/// stops the writer and signals shutdown to the engine. Once every sender of the queue is gone,
/// the remaining mutations are executed and the destination connection is closed.
#[derive(Debug)]
pub struct WriterWorker<D> {
    engine_name: String,
    destination: D,
    mutations_rx: MutationRx,
    shutdown_tx: ShutdownTx,
}

impl<D> WriterWorker<D> {
    pub fn new(
        engine_name: String,
        destination: D,
        mutations_rx: MutationRx,
        shutdown_tx: ShutdownTx,
    ) -> Self {
        Self {
            engine_name,
            destination,
            mutations_rx,
            shutdown_tx,
        }
    }
}

impl<D> Worker<WriterWorkerHandle, WriterWorkerState> for WriterWorker<D>
where
    D: DestinationClient + Send + Sync + 'static,
{
    type Error = SyncError;

    async fn start(self) -> SyncResult<WriterWorkerHandle> {
        info!("starting destination writer");

        let (state_tx, state_rx) = watch::channel(WriterWorkerState::default());

        let writer_span = tracing::info_span!(
            "destination_writer",
            engine = self.engine_name,
            destination = D::name()
        );
        let writer = async move {
            let WriterWorker {
                destination,
                mut mutations_rx,
                shutdown_tx,
                ..
            } = self;

            while let Some(mutation) = mutations_rx.recv().await {
                match destination.execute(&mutation).await {
                    Ok(()) => {
                        debug!("executed: {}", mutation);

                        state_tx.send_modify(|state| state.executed += 1);
                    }
                    Err(err) if err.is_statement_error() => {
                        error!(
                            "failed to execute statement {}: {}",
                            mutation,
                            err.detail().unwrap_or(err.description())
                        );

                        state_tx.send_modify(|state| state.skipped += 1);
                    }
                    Err(err) => {
                        error!("destination writer failed on {}: {}", mutation, err);

                        // Without a writer nothing reaches the destination, so the engine stops.
                        shutdown_tx.shutdown();
                        if let Err(close_err) = destination.close().await {
                            error!("failed to close the destination: {}", close_err);
                        }

                        return Err(err);
                    }
                }
            }

            destination.close().await?;

            info!("destination writer completed successfully");

            Ok(())
        }
        .instrument(writer_span.or_current());

        let handle = tokio::spawn(writer);

        Ok(WriterWorkerHandle {
            state_rx,
            handle: Some(handle),
        })
    }
}
