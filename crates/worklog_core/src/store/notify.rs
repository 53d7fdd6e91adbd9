//! Change notification feed.
//!
//! Events are queued while the store guard is held and handed to unbounded
//! channels once the operation's bookkeeping is done; sending never blocks
//! the mutation that produced the event.

use crate::model::{EntityKind, Oid};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Process-unique identity of an open store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(Uuid);

impl StoreId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for StoreId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub store: StoreId,
    pub kind: EntityKind,
    pub oid: Oid,
    pub change: ChangeKind,
}

#[derive(Debug, Default)]
pub(crate) struct Notifier {
    subscribers: Vec<Sender<ChangeEvent>>,
    pending: Vec<ChangeEvent>,
}

impl Notifier {
    pub(crate) fn subscribe(&mut self) -> Receiver<ChangeEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Queues one event. A `Modified` event is dropped when the same object
    /// already has a pending event, since observers re-read state anyway.
    pub(crate) fn post(&mut self, event: ChangeEvent) {
        if event.change == ChangeKind::Modified
            && self
                .pending
                .iter()
                .any(|pending| pending.oid == event.oid && pending.change != ChangeKind::Destroyed)
        {
            return;
        }
        self.pending.push(event);
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Sends queued events; subscribers whose receiver was dropped are forgotten.
    pub(crate) fn dispatch(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending);
        self.subscribers.retain(|subscriber| {
            events
                .iter()
                .all(|event| subscriber.send(*event).is_ok())
        });
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
