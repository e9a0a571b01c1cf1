use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::source::LogReader;
use crate::types::{BinlogEvent, StartPosition};

type EventTx = mpsc::UnboundedSender<SyncResult<BinlogEvent>>;

#[derive(Debug, Default)]
struct Inner {
    starts: Vec<StartPosition>,
    pending: Vec<SyncResult<BinlogEvent>>,
    events_tx: Option<EventTx>,
    stopped: bool,
}

/// In-memory log reader for tests.
///
/// Events pushed before the reader is started are buffered and delivered on start. The start
/// positions of every subscription are recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogReader {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLogReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to the current subscription, or buffers it until the next one starts.
    pub async fn push(&self, event: impl Into<BinlogEvent>) {
        self.push_item(Ok(event.into())).await;
    }

    /// Delivers an error, which ends the subscription with a failure.
    pub async fn push_error(&self, error: SyncError) {
        self.push_item(Err(error)).await;
    }

    /// Returns the start positions of all subscriptions, in order.
    pub async fn starts(&self) -> Vec<StartPosition> {
        self.inner.lock().await.starts.clone()
    }

    pub async fn is_stopped(&self) -> bool {
        self.inner.lock().await.stopped
    }

    async fn push_item(&self, item: SyncResult<BinlogEvent>) {
        let mut inner = self.inner.lock().await;

        let item = match &inner.events_tx {
            Some(events_tx) => match events_tx.send(item) {
                Ok(()) => return,
                Err(err) => err.0,
            },
            None => item,
        };

        inner.pending.push(item);
    }
}

impl LogReader for MemoryLogReader {
    type Stream = BoxStream<'static, SyncResult<BinlogEvent>>;

    async fn start(&self, position: StartPosition) -> SyncResult<Self::Stream> {
        let mut inner = self.inner.lock().await;
        if inner.events_tx.is_some() {
            bail!(
                ErrorKind::InvalidState,
                "Log reader already started",
                "A log reader can only serve one subscription at a time"
            );
        }

        info!("starting memory log reader from {}", position);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        for item in inner.pending.drain(..) {
            // The receiver is alive, sending cannot fail.
            let _ = events_tx.send(item);
        }

        inner.starts.push(position);
        inner.events_tx = Some(events_tx);
        inner.stopped = false;

        let events = stream::unfold(events_rx, |mut events_rx| async move {
            events_rx.recv().await.map(|item| (item, events_rx))
        });

        Ok(events.boxed())
    }

    async fn stop(&self) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.events_tx = None;
        inner.stopped = true;

        Ok(())
    }
}
