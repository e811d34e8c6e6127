//! Readiness events and the bounded batch they arrive in.

use std::fmt;
use std::os::unix::io::RawFd;

use crate::interest::Ready;

/// A single readiness notification: which descriptor and which conditions.
///
/// Events live only inside the [`EventBatch`] that produced them; the batch
/// is overwritten on the next wait call, so nothing from an event should be
/// retained across cycles.
#[derive(Clone, Copy)]
pub struct Event {
    fd: RawFd,
    readiness: Ready,
}

impl Event {
    pub(crate) fn new(fd: RawFd, readiness: Ready) -> Event {
        Event { fd, readiness }
    }

    /// The descriptor this notification is for.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// The observed condition flags.
    pub fn readiness(&self) -> Ready {
        self.readiness
    }

    pub fn is_readable(&self) -> bool {
        self.readiness.contains(Ready::READABLE)
    }

    pub fn is_writable(&self) -> bool {
        self.readiness.contains(Ready::WRITABLE)
    }

    /// The peer closed its end, or the connection hung up.
    pub fn is_peer_closed(&self) -> bool {
        self.readiness.contains(Ready::PEER_CLOSED)
    }

    pub fn is_error(&self) -> bool {
        self.readiness.contains(Ready::ERROR)
    }

    /// Applies the dispatch priority rule: when an error or hangup is
    /// present, the read/write bits are masked out so the handler sees the
    /// failure instead of attempting a doomed read or write.
    pub(crate) fn prioritized(mut self) -> Event {
        if self.readiness.intersects(Ready::ERROR | Ready::PEER_CLOSED) {
            self.readiness &= !(Ready::READABLE | Ready::WRITABLE);
        }
        self
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("fd", &self.fd)
            .field("readiness", &self.readiness)
            .finish()
    }
}

/// A fixed-capacity, reusable buffer of readiness notifications.
///
/// One batch is filled per wait call and owned by the reactor loop for its
/// lifetime. Capacity is a hard bound: when more descriptors are ready than
/// fit, the kernel holds the remainder on its ready list and reports them on
/// the next wait call. Readiness is delayed in that case, never lost.
pub struct EventBatch {
    pub(crate) events: Vec<libc::epoll_event>,
    // Vec::with_capacity may over-allocate; the wait call needs the exact
    // bound that was asked for.
    capacity: usize,
}

impl EventBatch {
    /// Creates a batch able to hold up to `capacity` events per wait call.
    /// A capacity of zero is clamped to one.
    pub fn with_capacity(capacity: usize) -> EventBatch {
        let capacity = capacity.max(1);
        EventBatch {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events written by the most recent wait call.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates over the filled portion of the batch.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.events.iter().map(|ev| {
            let data = ev.u64;
            let bits = ev.events;
            Event::new(data as RawFd, Ready::from_epoll(bits))
        })
    }
}
