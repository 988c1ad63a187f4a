//! Listener registration table and the notification context.
//!
//! Listeners are keyed by a [`ListenerId`] handed out on registration; the
//! consumer removes itself with that handle on teardown. All callbacks run
//! sequentially on one notifier task, so two notifications never overlap.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

pub trait DocumentsListener: Send + Sync {
    fn documents_were_updated(&self);
}

impl<F> DocumentsListener for F
where
    F: Fn() + Send + Sync,
{
    fn documents_were_updated(&self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ListenerTable {
    next_id: u64,
    listeners: BTreeMap<ListenerId, Arc<dyn DocumentsListener>>,
}

impl ListenerTable {
    pub fn insert(&mut self, listener: Arc<dyn DocumentsListener>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.insert(id, listener);
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn snapshot(&self) -> Vec<(ListenerId, Arc<dyn DocumentsListener>)> {
        self.listeners
            .iter()
            .map(|(id, l)| (*id, l.clone()))
            .collect()
    }
}

#[derive(Debug)]
pub(crate) enum NotifierMsg {
    Notify,
    /// Acknowledged once every message queued before it was delivered.
    Flush(oneshot::Sender<()>),
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

pub(crate) fn spawn_notifier(
    runtime: &Handle,
    listeners: Arc<Mutex<ListenerTable>>,
) -> mpsc::UnboundedSender<NotifierMsg> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    runtime.spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                NotifierMsg::Notify => {
                    // Taken at delivery time: listeners removed meanwhile are skipped.
                    let targets = listeners
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .snapshot();
                    log::debug!("[NOTIFY] documents updated -> {} listeners", targets.len());
                    for (id, listener) in targets {
                        log::trace!("[NOTIFY] delivering to {:?}", id);
                        let delivered =
                            panic::catch_unwind(AssertUnwindSafe(|| listener.documents_were_updated()));
                        if let Err(payload) = delivered {
                            log::warn!(
                                "[NOTIFY] listener {:?} panicked: {}",
                                id,
                                panic_message(payload.as_ref())
                            );
                        }
                    }
                }
                NotifierMsg::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        log::debug!("[NOTIFY] notifier stopped");
    });

    tx
}
