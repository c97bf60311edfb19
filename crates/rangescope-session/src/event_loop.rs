//! Single-consumer event loop.
//!
//! Feed snapshots and user picks arrive on one bounded queue and are applied
//! strictly one at a time. Each event runs to completion (including the
//! cascade it triggers) before the next one is looked at, so the render
//! callback never observes a half-applied update.

use rangescope_catalog::Catalog;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::selection::Slot;
use crate::session::{Session, SessionView};

/// Default queue depth for [`channel`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Raw feed document, parsed inside the loop.
    Snapshot(String),
    /// Already-parsed catalog.
    Catalog(Catalog),
    Select { slot: Slot, key: String },
    ClearSelection,
    /// Re-render without changing anything.
    Refresh,
    Shutdown,
}

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session event loop has stopped")]
pub struct SessionClosed;

/// Cloneable sender side of a session's event queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn send(&self, event: SessionEvent) -> Result<(), SessionClosed> {
        self.tx.send(event).await.map_err(|_| SessionClosed)
    }

    pub async fn snapshot(&self, payload: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionEvent::Snapshot(payload.into())).await
    }

    pub async fn select(&self, slot: Slot, key: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionEvent::Select {
            slot,
            key: key.into(),
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(SessionEvent::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Completes once the event loop has stopped receiving.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

pub fn channel(capacity: usize) -> (SessionHandle, mpsc::Receiver<SessionEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (SessionHandle { tx }, rx)
}

impl Session {
    pub fn apply(&mut self, event: SessionEvent) -> Applied {
        match event {
            SessionEvent::Snapshot(payload) => match self.ingest(&payload) {
                Ok(_) => Applied::Changed,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        bytes = payload.len(),
                        "rejected feed snapshot; keeping previous catalog"
                    );
                    Applied::Unchanged
                }
            },
            SessionEvent::Catalog(catalog) => {
                self.replace_catalog(catalog);
                Applied::Changed
            }
            SessionEvent::Select { slot, key } => {
                if self.select(slot, key) {
                    Applied::Changed
                } else {
                    Applied::Unchanged
                }
            }
            SessionEvent::ClearSelection => {
                self.clear_selection();
                Applied::Changed
            }
            SessionEvent::Refresh => Applied::Changed,
            SessionEvent::Shutdown => Applied::Stop,
        }
    }
}

/// Drive `session` from `events` until the queue closes or a `Shutdown`
/// arrives, calling `render` after every event that changed something.
pub async fn run_session<F>(
    mut session: Session,
    mut events: mpsc::Receiver<SessionEvent>,
    mut render: F,
) -> Session
where
    F: FnMut(&SessionView),
{
    while let Some(event) = events.recv().await {
        match session.apply(event) {
            Applied::Changed => render(&session.view()),
            Applied::Unchanged => {}
            Applied::Stop => break,
        }
    }
    tracing::debug!(generation = session.generation(), "session event loop finished");
    session
}
