//! The registration surface: one multiplexer plus one descriptor registry.

use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::event::EventBatch;
use crate::handler::{EventHandler, HandlerEntry};
use crate::interest::{Interest, Trigger};
use crate::poller::{Poller, Waker};
use crate::registry::Registry;

/// Combines the kernel poller and the descriptor registry behind the
/// registration API. All mutating operations keep the two in step: a
/// registration is visible in the registry only if the kernel accepted it,
/// so a failed call leaves no partial state behind.
///
/// Handlers receive a `&PollHandle` at dispatch and may call any of these
/// methods re-entrantly, including deregistering the descriptor they were
/// invoked for.
pub struct PollHandle {
    poller: Poller,
    registry: Registry,
    default_trigger: Trigger,
}

impl PollHandle {
    pub(crate) fn new(default_trigger: Trigger) -> Result<PollHandle> {
        Ok(PollHandle {
            poller: Poller::new()?,
            registry: Registry::new(),
            default_trigger,
        })
    }

    /// Registers a non-blocking descriptor with an interest set and handler.
    ///
    /// The descriptor stays owned by the caller; the reactor never closes
    /// it. Deregister before (or immediately after) closing it, or a reused
    /// descriptor number can receive the old registration's events.
    ///
    /// Fails with [`Error::AlreadyRegistered`] if the descriptor already has
    /// a live entry, and with [`Error::InvalidDescriptor`] if the kernel
    /// rejects it (closed, or not pollable). On failure no entry is created.
    pub fn register<H>(&self, fd: RawFd, interest: Interest, handler: H) -> Result<()>
    where
        H: EventHandler + 'static,
    {
        if self.registry.contains(fd) {
            return Err(Error::AlreadyRegistered(fd));
        }

        let trigger = interest.trigger().unwrap_or(self.default_trigger);
        self.poller
            .add(fd, interest.epoll_flags(trigger))
            .map_err(|err| Error::from_ctl(fd, err))?;
        self.registry
            .insert(fd, HandlerEntry::new(handler, interest, trigger));
        Ok(())
    }

    /// Replaces the interest set of a registered descriptor.
    ///
    /// An explicit trigger on `interest` switches the trigger mode;
    /// otherwise the registration keeps its current one. The stored entry is
    /// updated only after the kernel accepted the change.
    pub fn modify(&self, fd: RawFd, interest: Interest) -> Result<()> {
        let current = self.registry.trigger(fd).ok_or(Error::NotRegistered(fd))?;
        let trigger = interest.trigger().unwrap_or(current);

        self.poller
            .update(fd, interest.epoll_flags(trigger))
            .map_err(|err| Error::from_ctl(fd, err))?;
        self.registry.set_interest(fd, interest, trigger);
        Ok(())
    }

    /// Removes a descriptor from the registry and the kernel poller.
    ///
    /// Fails with [`Error::NotRegistered`] if the descriptor is unknown, so
    /// a second deregister errors cleanly instead of crashing. If the caller
    /// already closed the descriptor the kernel has auto-removed it; that
    /// case is tolerated and the registry entry is still dropped.
    pub fn deregister(&self, fd: RawFd) -> Result<()> {
        if !self.registry.contains(fd) {
            return Err(Error::NotRegistered(fd));
        }

        match self.poller.remove(fd) {
            Ok(()) => {}
            Err(err)
                if matches!(err.raw_os_error(), Some(libc::ENOENT) | Some(libc::EBADF)) =>
            {
                log::debug!("descriptor {fd} already gone from the kernel poller: {err}");
            }
            Err(err) => return Err(Error::Io(err)),
        }
        self.registry.remove(fd);
        Ok(())
    }

    /// Resolves the handler registered for a descriptor, if any. Absence is
    /// not an error; during dispatch it means the descriptor was
    /// deregistered after the batch was filled.
    pub fn lookup(&self, fd: RawFd) -> Option<Rc<dyn EventHandler>> {
        self.registry.lookup(fd)
    }

    /// The interest set currently stored for a descriptor.
    pub fn interest(&self, fd: RawFd) -> Option<Interest> {
        self.registry.interest(fd)
    }

    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.registry.contains(fd)
    }

    pub fn registration_count(&self) -> usize {
        self.registry.len()
    }

    /// Interrupts a blocked wait on this handle's poller.
    pub fn wake(&self) -> Result<()> {
        self.poller.waker().wake()?;
        Ok(())
    }

    pub(crate) fn waker(&self) -> Waker {
        self.poller.waker()
    }

    pub(crate) fn poll(&self, batch: &mut EventBatch, timeout: Option<Duration>) -> io::Result<usize> {
        self.poller.wait(batch, timeout)
    }
}
