use futures::Stream;
use std::future::Future;

use crate::error::SyncResult;
use crate::types::{BinlogEvent, StartPosition};

/// Reader of the source replication log.
///
/// Implementations connect to the source, decode its replication stream and deliver events one at
/// a time in commit order. An error item is fatal for the stream. The stream ends once the reader
/// is stopped.
pub trait LogReader {
    /// Stream of decoded log events.
    type Stream: Stream<Item = SyncResult<BinlogEvent>> + Send + 'static;

    /// Subscribes to the log starting at `position`.
    fn start(
        &self,
        position: StartPosition,
    ) -> impl Future<Output = SyncResult<Self::Stream>> + Send;

    /// Detaches the subscription started by [`LogReader::start`].
    fn stop(&self) -> impl Future<Output = SyncResult<()>> + Send;
}
