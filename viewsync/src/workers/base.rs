use std::future::Future;

use crate::error::SyncResult;

/// Background worker of the engine.
///
/// Starting a worker spawns its task and returns a handle to observe and join it.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Spawns the worker and returns a handle for monitoring its execution.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle of a running worker.
///
/// The handle stays valid after the worker completes, so its final state can still be read.
pub trait WorkerHandle<S> {
    /// Returns a snapshot of the worker state.
    fn state(&self) -> S;

    /// Waits for the worker to complete and returns its result.
    ///
    /// Panics and cancellations of the worker task are turned into errors.
    fn wait(self) -> impl Future<Output = SyncResult<()>> + Send;
}
