//! Bounded queue between the read path and a background publisher.

use common::{Error, Result};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{EventJournal, EventSink};

/// Non-blocking sink: enqueues with `try_send` and never waits.
#[derive(Debug, Clone)]
pub struct QueuedSink {
    tx: mpsc::Sender<String>,
}

impl QueuedSink {
    /// A sink plus the receiving end for the publisher task.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for QueuedSink {
    fn publish(&self, message: String) -> Result<()> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::Sink("event queue full".into()),
            TrySendError::Closed(_) => Error::Sink("event publisher stopped".into()),
        })
    }
}

/// Drains the queue into `journal` under `topic` until every sender is
/// dropped. Resolves to the number of events delivered.
pub fn spawn_publisher(
    mut rx: mpsc::Receiver<String>,
    topic: String,
    mut journal: EventJournal,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut delivered = 0usize;
        while let Some(message) = rx.recv().await {
            if journal.record(&topic, &message) {
                delivered += 1;
                info!("[{}] {}", topic, message);
            }
        }
        debug!("Event publisher for {} stopped after {} event(s)", topic, delivered);
        delivered
    })
}
