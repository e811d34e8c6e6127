//! Interest sets and trigger modes for descriptor registrations.

use bitflags::bitflags;

bitflags! {
    /// Readiness condition flags, used both to express interest at
    /// registration time and to report observed conditions in an
    /// [`Event`](crate::event::Event).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ready: u8 {
        /// A read can make progress without blocking.
        const READABLE = 0b0001;
        /// A write can make progress without blocking.
        const WRITABLE = 0b0010;
        /// The peer shut down its end of the connection.
        const PEER_CLOSED = 0b0100;
        /// The descriptor is in an error state.
        const ERROR = 0b1000;
    }
}

impl Ready {
    /// Translates epoll condition bits into readiness flags.
    pub(crate) fn from_epoll(events: u32) -> Ready {
        let mut ready = Ready::empty();
        if events & libc::EPOLLIN as u32 != 0 {
            ready |= Ready::READABLE;
        }
        if events & libc::EPOLLOUT as u32 != 0 {
            ready |= Ready::WRITABLE;
        }
        if events & (libc::EPOLLRDHUP | libc::EPOLLHUP) as u32 != 0 {
            ready |= Ready::PEER_CLOSED;
        }
        if events & libc::EPOLLERR as u32 != 0 {
            ready |= Ready::ERROR;
        }
        ready
    }
}

/// When a readiness condition is reported.
///
/// Level is the default: the condition is reported on every wait call for as
/// long as it holds. Edge reports a condition exactly once per transition
/// from not-ready to ready; the handler must then drain the descriptor
/// (read/write until `WouldBlock`) before the next wait, or remaining data
/// will never be reported again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    #[default]
    Level,
    Edge,
}

/// What to watch a descriptor for, plus an optional trigger-mode override.
///
/// Interests combine with `|`:
///
/// ```
/// use weir_io::{Interest, Trigger};
///
/// let interest = Interest::READABLE | Interest::PEER_CLOSED;
/// assert!(interest.is_readable());
/// assert_eq!(interest.trigger(), None); // falls back to the config default
///
/// let interest = Interest::READABLE.edge_triggered();
/// assert_eq!(interest.trigger(), Some(Trigger::Edge));
/// ```
///
/// Error and hangup conditions are always delivered by the kernel whether or
/// not they are part of the interest set; `PEER_CLOSED` additionally opts in
/// to half-close detection (`EPOLLRDHUP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    flags: Ready,
    trigger: Option<Trigger>,
}

impl Interest {
    pub const READABLE: Interest = Interest::new(Ready::READABLE);
    pub const WRITABLE: Interest = Interest::new(Ready::WRITABLE);
    pub const PEER_CLOSED: Interest = Interest::new(Ready::PEER_CLOSED);
    pub const ERROR: Interest = Interest::new(Ready::ERROR);

    const fn new(flags: Ready) -> Interest {
        Interest {
            flags,
            trigger: None,
        }
    }

    /// The condition flags of this interest set.
    pub fn flags(&self) -> Ready {
        self.flags
    }

    /// The explicit trigger mode, if one was chosen. `None` means the event
    /// loop's configured default applies.
    pub fn trigger(&self) -> Option<Trigger> {
        self.trigger
    }

    /// Requests edge-triggered delivery for this registration.
    pub const fn edge_triggered(mut self) -> Interest {
        self.trigger = Some(Trigger::Edge);
        self
    }

    /// Requests level-triggered delivery for this registration.
    pub const fn level_triggered(mut self) -> Interest {
        self.trigger = Some(Trigger::Level);
        self
    }

    pub fn is_readable(&self) -> bool {
        self.flags.contains(Ready::READABLE)
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(Ready::WRITABLE)
    }

    /// Builds the epoll event mask for this interest under the given
    /// effective trigger mode.
    pub(crate) fn epoll_flags(&self, trigger: Trigger) -> u32 {
        let mut flags = 0u32;
        if self.flags.contains(Ready::READABLE) {
            flags |= libc::EPOLLIN as u32;
        }
        if self.flags.contains(Ready::WRITABLE) {
            flags |= libc::EPOLLOUT as u32;
        }
        if self.flags.contains(Ready::PEER_CLOSED) {
            flags |= libc::EPOLLRDHUP as u32;
        }
        if trigger == Trigger::Edge {
            flags |= libc::EPOLLET as u32;
        }
        flags
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;

    /// Unions the flags. An explicit trigger on the right-hand side wins;
    /// otherwise the left-hand side's choice is kept.
    fn bitor(self, rhs: Interest) -> Interest {
        Interest {
            flags: self.flags | rhs.flags,
            trigger: rhs.trigger.or(self.trigger),
        }
    }
}
