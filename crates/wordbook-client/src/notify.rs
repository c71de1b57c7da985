//! Peer-activity notifications.
//!
//! Insertion events from the sync engine become user-facing notifications
//! when they are genuinely new and written by someone else:
//!
//! - Events observed within the initial load window after the subscription
//!   opened are the replay of existing entries and are suppressed.
//! - Events whose `createdBy` is the local actor are this client's own
//!   writes echoing back and are suppressed.
//! - Events with no recorded author count as foreign.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wordbook_types::{ActorId, EntryId};

use crate::identity::Author;
use crate::sync::InsertionEvent;

/// A toast-worthy event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub headword: String,
    pub entry_id: EntryId,
}

/// Where notifications are rendered.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications into a channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Logs notifications at info level.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        info!(entry_id = %notification.entry_id, "new word: {}", notification.headword);
    }
}

/// Outcome of gating one insertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Notify(Notification),
    /// Part of the initial replay.
    InitialLoad,
    /// Written by the local actor.
    OwnWrite,
}

/// Decides which insertions notify.
#[derive(Clone, Copy, Debug)]
pub struct NotificationGate {
    window: Duration,
}

impl NotificationGate {
    pub fn new(initial_load_window: Duration) -> Self {
        Self {
            window: initial_load_window,
        }
    }

    /// Whether `event` arrived while the initial load window was open.
    pub fn in_initial_window(&self, event: &InsertionEvent) -> bool {
        event.since_subscribe() < self.window
    }

    pub fn evaluate(&self, event: &InsertionEvent, actor: &ActorId) -> Verdict {
        if self.in_initial_window(event) {
            return Verdict::InitialLoad;
        }
        if actor.authored(event.created_by.as_deref()) {
            return Verdict::OwnWrite;
        }
        Verdict::Notify(Notification {
            headword: event.headword.clone(),
            entry_id: event.id.clone(),
        })
    }
}

/// Run the dispatcher until the insertion channel closes.
///
/// The local actor is read from `author` per event, so sign-in and
/// sign-out take effect immediately.
pub fn spawn_dispatcher(
    gate: NotificationGate,
    mut insertions: broadcast::Receiver<InsertionEvent>,
    author: watch::Receiver<Author>,
    sink: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match insertions.recv().await {
                Ok(event) => {
                    let actor = author.borrow().actor.clone();
                    match gate.evaluate(&event, &actor) {
                        Verdict::Notify(notification) => sink.notify(notification),
                        suppressed => {
                            debug!(entry_id = %event.id, ?suppressed, "insertion suppressed");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification dispatcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("notification dispatcher finished");
    })
}
