use std::sync::Arc;
use tracing::{info, warn};
use viewsync_config::shared::EngineConfig;

use crate::bail;
use crate::bootstrap::bootstrap;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::destination::DestinationClient;
use crate::error::{ErrorKind, SyncResult};
use crate::registry::HandlerRegistry;
use crate::router::EventRouter;
use crate::source::LogReader;
use crate::types::{LaunchMode, StartPosition};
use crate::views::{ViewDefinition, compile};
use crate::workers::apply::{ApplyWorker, ApplyWorkerHandle, ApplyWorkerState};
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::writer::{
    WriterWorker, WriterWorkerHandle, WriterWorkerState, create_mutation_queue,
};

#[derive(Debug)]
enum EngineState {
    NotStarted,
    Started {
        apply_worker: ApplyWorkerHandle,
        writer_worker: WriterWorkerHandle,
    },
}

/// Keeps views in a destination store in sync with a source replication log.
///
/// Views are added before the engine starts. Starting freezes them into a handler registry and
/// spawns the apply worker, which routes log events into mutations, and the destination writer,
/// which executes them in order.
#[derive(Debug)]
pub struct Engine<D, R> {
    config: Arc<EngineConfig>,
    registry: HandlerRegistry,
    destination: D,
    reader: R,
    state: EngineState,
    shutdown_tx: ShutdownTx,
}

impl<D, R> Engine<D, R>
where
    D: DestinationClient + Clone + Send + Sync + 'static,
    R: LogReader + Clone + Send + Sync + 'static,
{
    pub fn new(config: EngineConfig, destination: D, reader: R) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            registry: HandlerRegistry::new(),
            destination,
            reader,
            state: EngineState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Compiles `view` and appends its handlers and init statements.
    ///
    /// Views can only be added before the engine starts.
    pub fn add_view(&mut self, view: ViewDefinition) -> SyncResult<()> {
        if let EngineState::Started { .. } = self.state {
            bail!(
                ErrorKind::InvalidState,
                "Engine already started",
                format!(
                    "View '{}' cannot be added after the engine started",
                    view.name
                )
            );
        }

        let compiled = compile(&view)?;
        info!(
            "added view '{}' with {} triggers",
            compiled.name,
            compiled.triggers.len()
        );
        self.registry.append(compiled);

        Ok(())
    }

    /// Starts the engine the way its configuration asks for.
    pub async fn launch(&mut self) -> SyncResult<()> {
        match LaunchMode::from(&self.config.start) {
            LaunchMode::Bootstrap => self.init().await,
            LaunchMode::Stream(position) => self.start(position).await,
        }
    }

    /// Populates the views with their init statements and streams from the position captured in
    /// the same transaction.
    pub async fn init(&mut self) -> SyncResult<()> {
        self.ensure_not_started()?;

        info!("initializing engine '{}'", self.config.name);

        self.destination.connect().await?;
        let position = bootstrap(
            &self.destination,
            &self.config.position_query,
            self.registry.init_statements(),
        )
        .await?;

        self.spawn_workers(StartPosition::At(position)).await
    }

    /// Streams from `position` without bootstrapping.
    pub async fn start(&mut self, position: StartPosition) -> SyncResult<()> {
        self.ensure_not_started()?;

        info!("starting engine '{}' from {}", self.config.name, position);

        self.destination.connect().await?;

        self.spawn_workers(position).await
    }

    /// Returns the progress of the apply worker, `None` before the engine starts.
    pub fn apply_state(&self) -> Option<ApplyWorkerState> {
        match &self.state {
            EngineState::NotStarted => None,
            EngineState::Started { apply_worker, .. } => Some(apply_worker.state()),
        }
    }

    /// Returns the counters of the destination writer, `None` before the engine starts.
    pub fn writer_state(&self) -> Option<WriterWorkerState> {
        match &self.state {
            EngineState::NotStarted => None,
            EngineState::Started { writer_worker, .. } => Some(writer_worker.state()),
        }
    }

    /// Waits for both workers to complete. Failures of both are aggregated.
    pub async fn wait(self) -> SyncResult<()> {
        let EngineState::Started {
            apply_worker,
            writer_worker,
        } = self.state
        else {
            info!("engine was not started, nothing to wait for");

            return Ok(());
        };

        let mut errors = vec![];

        info!("waiting for apply worker to complete");

        if let Err(err) = apply_worker.wait().await {
            errors.push(err);

            info!("apply worker completed with an error");
        }

        info!("waiting for destination writer to complete");

        // The writer drains the mutations queued by the apply worker before closing the
        // destination connection.
        if let Err(err) = writer_worker.wait().await {
            errors.push(err);

            info!("destination writer completed with an error");
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }

    /// Detaches from the replication log. The destination connection is closed once the queued
    /// mutations are written.
    pub fn stop(&self) {
        info!("trying to stop engine '{}'", self.config.name);

        self.shutdown_tx.shutdown();

        info!("shutdown signal sent to all workers");
    }

    pub async fn stop_and_wait(self) -> SyncResult<()> {
        self.stop();
        self.wait().await
    }

    fn ensure_not_started(&self) -> SyncResult<()> {
        if let EngineState::Started { .. } = self.state {
            bail!(
                ErrorKind::InvalidState,
                "Engine already started",
                format!("Engine '{}' can only be started once", self.config.name)
            );
        }

        Ok(())
    }

    async fn spawn_workers(&mut self, start_position: StartPosition) -> SyncResult<()> {
        let registry = Arc::new(std::mem::take(&mut self.registry));
        if registry.is_empty() {
            warn!("no views registered, every change event will be dropped");
        }

        let (mutations_tx, mutations_rx) = create_mutation_queue();

        let writer_worker = WriterWorker::new(
            self.config.name.clone(),
            self.destination.clone(),
            mutations_rx,
            self.shutdown_tx.clone(),
        )
        .start()
        .await?;

        let apply_worker = ApplyWorker::new(
            self.config.name.clone(),
            self.reader.clone(),
            EventRouter::new(registry),
            start_position,
            mutations_tx,
            self.shutdown_tx.subscribe(),
        )
        .start()
        .await?;

        self.state = EngineState::Started {
            apply_worker,
            writer_worker,
        };

        Ok(())
    }
}
