//! Cooperative supersession tokens.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle identifying one transition and whether it is still current.
///
/// The router keeps one shared slot holding the id of the running
/// transition; starting a new one overwrites it, which is all it takes to
/// supersede the old one.
#[derive(Clone, Debug)]
pub struct TransitionToken {
    id: u64,
    current: Arc<AtomicU64>,
}

impl TransitionToken {
    pub(crate) fn new(id: u64, current: Arc<AtomicU64>) -> Self {
        Self { id, current }
    }

    /// A token with its own slot, active until [`release`](Self::release)d.
    pub fn detached(id: u64) -> Self {
        Self {
            id,
            current: Arc::new(AtomicU64::new(id)),
        }
    }

    /// Id of the transition holding the token.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this transition is still the current one.
    pub fn is_active(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.id
    }

    /// Clear the slot if this transition still owns it.
    ///
    /// Returns whether it did; a `false` means another transition took over.
    pub fn release(&self) -> bool {
        self.current
            .compare_exchange(self.id, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_id_supersedes() {
        let slot = Arc::new(AtomicU64::new(1));
        let first = TransitionToken::new(1, Arc::clone(&slot));
        assert!(first.is_active());

        slot.store(2, Ordering::SeqCst);
        let second = TransitionToken::new(2, slot);
        assert!(!first.is_active());
        assert!(second.is_active());
        assert!(!first.release());
        assert!(second.release());
        assert!(!second.is_active());
    }
}
