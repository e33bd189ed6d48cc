//! Latest-wins debounced draft writer.
//!
//! Each session owns one writer task. A save request replaces any pending
//! one and restarts the quiet window; when the window elapses the newest
//! snapshot is written. [`DebouncedDraftWriter::flush`] writes immediately
//! and reports the outcome, and [`DebouncedDraftWriter::shutdown`] flushes
//! before the task exits so no request is dropped.

use std::time::Duration;

use onboard_core::draft::DraftSnapshot;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::draft_store::DraftStore;
use crate::slot::DraftStoreError;

/// Default quiet window before a pending snapshot is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

type Ack = oneshot::Sender<Result<(), String>>;

enum Command {
    Save(Box<DraftSnapshot>),
    Flush(Ack),
    Shutdown(Ack),
}

pub struct DebouncedDraftWriter {
    sender: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl DebouncedDraftWriter {
    /// Spawn the writer task for one session key.
    pub fn spawn(store: DraftStore, session_key: String, window: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, session_key, window, receiver));
        Self { sender, handle }
    }

    /// Queue a snapshot, replacing any pending one.
    pub fn request(&self, snapshot: DraftSnapshot) -> Result<(), DraftStoreError> {
        self.sender
            .send(Command::Save(Box::new(snapshot)))
            .map_err(|_| DraftStoreError::WriterClosed)
    }

    /// Write the pending snapshot now, if any.
    pub async fn flush(&self) -> Result<(), DraftStoreError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Command::Flush(ack))
            .map_err(|_| DraftStoreError::WriterClosed)?;
        done.await
            .map_err(|_| DraftStoreError::WriterClosed)?
            .map_err(DraftStoreError::Deferred)
    }

    /// Queue `snapshot` and write it immediately.
    pub async fn save_now(&self, snapshot: DraftSnapshot) -> Result<(), DraftStoreError> {
        self.request(snapshot)?;
        self.flush().await
    }

    /// Flush and stop the task.
    pub async fn shutdown(self) -> Result<(), DraftStoreError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Command::Shutdown(ack))
            .map_err(|_| DraftStoreError::WriterClosed)?;
        let outcome = done.await.map_err(|_| DraftStoreError::WriterClosed)?;
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Draft writer task panicked");
        }
        outcome.map_err(DraftStoreError::Deferred)
    }
}

async fn write_pending(
    store: &DraftStore,
    session_key: &str,
    pending: &mut Option<Box<DraftSnapshot>>,
) -> Result<(), String> {
    let Some(snapshot) = pending.take() else {
        return Ok(());
    };
    store
        .save(session_key, *snapshot)
        .await
        .map(|_| ())
        .map_err(|e| {
            tracing::error!(session_key, error = %e, "Debounced draft write failed");
            e.to_string()
        })
}

async fn run(
    store: DraftStore,
    session_key: String,
    window: Duration,
    mut receiver: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<Box<DraftSnapshot>> = None;

    loop {
        let command = if pending.is_some() {
            tokio::select! {
                command = receiver.recv() => command,
                _ = tokio::time::sleep(window) => {
                    let _ = write_pending(&store, &session_key, &mut pending).await;
                    continue;
                }
            }
        } else {
            receiver.recv().await
        };

        match command {
            Some(Command::Save(snapshot)) => pending = Some(snapshot),
            Some(Command::Flush(ack)) => {
                let outcome = write_pending(&store, &session_key, &mut pending).await;
                let _ = ack.send(outcome);
            }
            Some(Command::Shutdown(ack)) => {
                let outcome = write_pending(&store, &session_key, &mut pending).await;
                let _ = ack.send(outcome);
                break;
            }
            None => {
                // All handles dropped without a shutdown.
                let _ = write_pending(&store, &session_key, &mut pending).await;
                break;
            }
        }
    }

    tracing::debug!(session_key = %session_key, "Draft writer stopped");
}
