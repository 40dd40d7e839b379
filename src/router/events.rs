//! Events the router emits to subscribers.

use crate::core::Location;
use crate::transition::TransitionError;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// URL change requested by a committed transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationUpdate {
    pub url: String,
    /// Replace the current history entry instead of pushing
    pub replace: bool,
}

/// Lifecycle notifications, suppressed by `notify: false`.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionEvent {
    Started {
        transition: u64,
        from: Location,
        to: Location,
    },
    Success {
        transition: u64,
        from: Location,
        to: Location,
        location: Option<LocationUpdate>,
    },
    Error {
        transition: u64,
        to: Location,
        error: TransitionError,
    },
    Superseded {
        transition: u64,
        to: Location,
    },
    Ignored {
        to: Location,
    },
}

impl TransitionEvent {
    /// Id of the transition, if one was created.
    pub fn transition(&self) -> Option<u64> {
        match self {
            Self::Started { transition, .. }
            | Self::Success { transition, .. }
            | Self::Error { transition, .. }
            | Self::Superseded { transition, .. } => Some(*transition),
            Self::Ignored { .. } => None,
        }
    }
}

pub type Listener = Arc<dyn Fn(&TransitionEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

/// Subscriber list; listeners run synchronously, in subscription order.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    table: Arc<RwLock<ListenerTable>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, listener: Listener) -> Subscription {
        let mut table = self.table.write();
        table.next_id += 1;
        let id = table.next_id;
        table.listeners.push((id, listener));
        Subscription {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    pub(crate) fn emit(&self, event: &TransitionEvent) {
        let snapshot: Vec<Listener> = self
            .table
            .read()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

/// Handle returned by [`Router::subscribe`](super::Router::subscribe).
pub struct Subscription {
    id: u64,
    table: Weak<RwLock<ListenerTable>>,
}

impl Subscription {
    /// Stop receiving events.
    pub fn unsubscribe(self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let mut table = table.write();
        let before = table.listeners.len();
        table.listeners.retain(|(id, _)| *id != self.id);
        table.listeners.len() != before
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn listeners_receive_until_unsubscribed() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = listeners.subscribe(Arc::new(move |event: &TransitionEvent| {
            sink.lock().push(event.clone());
        }));

        let event = TransitionEvent::Ignored {
            to: Location::new("home", Default::default()),
        };
        listeners.emit(&event);
        assert!(sub.unsubscribe());
        listeners.emit(&event);

        assert_eq!(seen.lock().as_slice(), [event]);
    }
}
