//! The descriptor registry: which descriptors the reactor knows about.
//!
//! The registry is the authoritative map from a live descriptor to its
//! interest set and handler. It is deliberately not thread-safe: one reactor
//! instance owns one registry and runs on one thread, so internal locking
//! would be pure overhead. The `RefCell` exists only so handlers invoked
//! during dispatch can mutate registrations re-entrantly; the type is
//! `!Send`, which turns cross-thread misuse into a compile error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use crate::handler::{EventHandler, HandlerEntry};
use crate::interest::{Interest, Trigger};

#[derive(Default)]
pub(crate) struct Registry {
    entries: RefCell<HashMap<RawFd, HandlerEntry>>,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry::default()
    }

    pub(crate) fn contains(&self, fd: RawFd) -> bool {
        self.entries.borrow().contains_key(&fd)
    }

    pub(crate) fn insert(&self, fd: RawFd, entry: HandlerEntry) {
        self.entries.borrow_mut().insert(fd, entry);
    }

    pub(crate) fn remove(&self, fd: RawFd) -> bool {
        self.entries.borrow_mut().remove(&fd).is_some()
    }

    /// Resolves the handler for a descriptor. Never fails: absence means the
    /// descriptor was deregistered, possibly by an earlier handler in the
    /// same batch, and the caller skips the event.
    ///
    /// The `Rc` clone matters: the map borrow ends before the handler runs,
    /// so the handler is free to mutate the registry.
    pub(crate) fn lookup(&self, fd: RawFd) -> Option<Rc<dyn EventHandler>> {
        self.entries
            .borrow()
            .get(&fd)
            .map(|entry| Rc::clone(&entry.handler))
    }

    pub(crate) fn interest(&self, fd: RawFd) -> Option<Interest> {
        self.entries.borrow().get(&fd).map(|entry| entry.interest)
    }

    pub(crate) fn trigger(&self, fd: RawFd) -> Option<Trigger> {
        self.entries.borrow().get(&fd).map(|entry| entry.trigger)
    }

    /// Updates the stored interest set of an existing entry. Returns false
    /// if the descriptor is unknown.
    pub(crate) fn set_interest(&self, fd: RawFd, interest: Interest, trigger: Trigger) -> bool {
        match self.entries.borrow_mut().get_mut(&fd) {
            Some(entry) => {
                entry.interest = interest;
                entry.trigger = trigger;
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::poll::PollHandle;

    struct NoOpHandler;
    impl EventHandler for NoOpHandler {
        fn handle_event(&self, _event: &Event, _poll: &PollHandle) {}
    }

    #[test]
    fn insert_lookup_remove() {
        let registry = Registry::new();
        assert!(!registry.contains(3));
        assert!(registry.lookup(3).is_none());

        registry.insert(
            3,
            HandlerEntry::new(NoOpHandler, Interest::READABLE, Trigger::Level),
        );
        assert!(registry.contains(3));
        assert!(registry.lookup(3).is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(3));
        assert!(!registry.remove(3));
        assert!(registry.lookup(3).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn set_interest_updates_existing_entry_only() {
        let registry = Registry::new();
        assert!(!registry.set_interest(5, Interest::WRITABLE, Trigger::Level));

        registry.insert(
            5,
            HandlerEntry::new(NoOpHandler, Interest::READABLE, Trigger::Level),
        );
        assert!(registry.set_interest(5, Interest::WRITABLE, Trigger::Edge));
        assert!(registry.interest(5).unwrap().is_writable());
        assert_eq!(registry.trigger(5), Some(Trigger::Edge));
    }
}
