//! # weir-io
//!
//! A small event-driven I/O reactor for Linux: one thread watches many
//! non-blocking descriptors through `epoll` and dispatches readiness
//! notifications to registered handlers, without pulling in an async
//! runtime.
//!
//! weir-io is the readiness-notification layer beneath a runtime, not a
//! runtime itself: there are no futures, no task scheduling and no green
//! threads. It consumes raw, already-created non-blocking descriptors
//! (sockets, pipes, eventfds) supplied by the caller, who keeps ownership of
//! them throughout; socket creation, `accept`, DNS and friends stay outside.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//! │ EventLoop   │───▶│   Reactor    │───▶│ PollHandle  │
//! └─────────────┘    └──────────────┘    └──────┬──────┘
//!                                               │
//!                                   ┌───────────┴───────────┐
//!                                   ▼                       ▼
//!                            ┌──────────────┐       ┌──────────────┐
//!                            │   Registry   │       │    Poller    │
//!                            │ fd → handler │       │   (epoll)    │
//!                            └──────────────┘       └──────────────┘
//! ```
//!
//! Registrations are level-triggered by default (a ready condition is
//! reported on every wait call until handled); edge-triggered delivery is a
//! per-registration opt-in via [`Interest::edge_triggered`]. Error and
//! peer-closed conditions always take priority over plain readability or
//! writability when an event is dispatched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::io::Read;
//! use std::os::unix::io::AsRawFd;
//! use std::os::unix::net::UnixStream;
//! use weir_io::{Event, EventHandler, EventLoop, Interest, PollHandle};
//!
//! struct EchoHandler {
//!     sock: UnixStream,
//! }
//!
//! impl EventHandler for EchoHandler {
//!     fn handle_event(&self, event: &Event, poll: &PollHandle) {
//!         if event.is_peer_closed() || event.is_error() {
//!             let _ = poll.deregister(event.fd());
//!             return;
//!         }
//!         if event.is_readable() {
//!             let mut buf = [0u8; 4096];
//!             // Non-blocking read; under edge triggering, loop until
//!             // WouldBlock.
//!             let _ = (&self.sock).read(&mut buf);
//!         }
//!     }
//! }
//!
//! fn main() -> weir_io::Result<()> {
//!     let event_loop = EventLoop::default();
//!
//!     let (sock, _peer) = UnixStream::pair()?;
//!     sock.set_nonblocking(true)?;
//!     let fd = sock.as_raw_fd();
//!
//!     event_loop.register(
//!         fd,
//!         Interest::READABLE | Interest::PEER_CLOSED,
//!         EchoHandler { sock },
//!     )?;
//!
//!     // Blocks until stopped or a fatal error occurs.
//!     event_loop.run()
//! }
//! ```
//!
//! ## Threading model
//!
//! One event loop runs on one thread; handlers are invoked synchronously on
//! that thread and run to completion before the next event is dispatched.
//! The loop types are `!Send` on purpose. The only pieces that cross
//! threads are [`ShutdownHandle`] and [`Waker`], which stop or nudge a loop
//! from outside. To use more cores, run one loop per thread over disjoint
//! descriptor sets; never register one descriptor with two loops.
//!
//! - [`EventLoop`]: main entry point for registering descriptors and running
//!   the loop
//! - [`EventHandler`]: trait for implementing event handling logic
//! - [`reactor`]: core wait/dispatch cycle and shutdown plumbing
//! - [`poll`]: registration surface combining the registry and the poller
//! - [`config`]: batch capacity, default trigger mode and wait timeout
//! - [`error`]: error taxonomy and result alias

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod interest;
pub mod poll;
mod poller;
pub mod reactor;
mod registry;

pub use config::{EventLoopConfig, EventLoopConfigBuilder};
pub use error::{Error, Result};
pub use event::{Event, EventBatch};
pub use handler::EventHandler;
pub use interest::{Interest, Ready, Trigger};
pub use poll::PollHandle;
pub use poller::Waker;
pub use reactor::{Reactor, ShutdownHandle};

use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

/// A convenient prelude re-exporting the commonly used types.
///
/// ```rust
/// use weir_io::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::EventLoopConfig;
    pub use crate::error::{Error, Result};
    pub use crate::event::Event;
    pub use crate::handler::EventHandler;
    pub use crate::interest::{Interest, Ready, Trigger};
    pub use crate::poll::PollHandle;
    pub use crate::reactor::{Reactor, ShutdownHandle};
    pub use crate::EventLoop;
}

/// The main event loop: registers descriptors and drives the reactor.
///
/// A thin facade over [`Reactor`] mirroring its lifecycle: create, register
/// descriptors, `run`, stop via [`ShutdownHandle`]. See the crate docs for a
/// complete example.
pub struct EventLoop {
    reactor: Reactor,
}

impl Default for EventLoop {
    /// Creates an event loop with the default configuration (batch capacity
    /// 1024, level triggering, 100ms wait timeout).
    ///
    /// # Panics
    ///
    /// Panics if the kernel poller cannot be created. Use
    /// [`EventLoop::with_config`] to handle that case.
    fn default() -> Self {
        Self::with_config(EventLoopConfig::default())
            .expect("failed to create the kernel poller")
    }
}

impl EventLoop {
    /// Creates an event loop with the given configuration.
    ///
    /// Fails only if the kernel poller cannot be acquired (descriptor
    /// limits).
    pub fn with_config(config: EventLoopConfig) -> Result<EventLoop> {
        Ok(EventLoop {
            reactor: Reactor::new(config)?,
        })
    }

    /// Registers a non-blocking descriptor with an interest set and handler.
    /// See [`PollHandle::register`] for the full contract.
    pub fn register<H>(&self, fd: RawFd, interest: Interest, handler: H) -> Result<()>
    where
        H: EventHandler + 'static,
    {
        self.reactor.poll_handle.register(fd, interest, handler)
    }

    /// Replaces the interest set of a registered descriptor. See
    /// [`PollHandle::modify`].
    pub fn modify(&self, fd: RawFd, interest: Interest) -> Result<()> {
        self.reactor.poll_handle.modify(fd, interest)
    }

    /// Removes a descriptor's registration. See [`PollHandle::deregister`].
    pub fn deregister(&self, fd: RawFd) -> Result<()> {
        self.reactor.poll_handle.deregister(fd)
    }

    /// Resolves the handler registered for a descriptor, if any.
    pub fn lookup(&self, fd: RawFd) -> Option<Rc<dyn EventHandler>> {
        self.reactor.poll_handle.lookup(fd)
    }

    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.reactor.poll_handle.is_registered(fd)
    }

    pub fn registration_count(&self) -> usize {
        self.reactor.poll_handle.registration_count()
    }

    /// Runs the event loop on the current thread, blocking until
    /// [`stop`](Self::stop) (or a [`ShutdownHandle`]) ends it or a fatal
    /// multiplexer error occurs.
    pub fn run(&self) -> Result<()> {
        self.reactor.run()
    }

    /// Drives a single wait/dispatch cycle; see [`Reactor::run_once`].
    pub fn run_once(&self, timeout: Option<Duration>) -> Result<usize> {
        self.reactor.run_once(timeout)
    }

    /// Signals the loop to stop after the current cycle and wakes a blocked
    /// wait. Non-blocking, callable from any thread via
    /// [`shutdown_handle`](Self::shutdown_handle); this method is the
    /// same-thread shorthand.
    pub fn stop(&self) {
        self.reactor.shutdown_handle().shutdown();
    }

    /// A `Send + Sync` handle that stops this loop from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.reactor.shutdown_handle()
    }
}
