//! Thin wrapper over the kernel readiness multiplexer (Linux `epoll`).
//!
//! One `Poller` instance backs one reactor loop. It owns the epoll
//! descriptor and an internal `eventfd` registered as a permanent wake
//! source, so a blocked wait can be interrupted from another thread.

use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::event::EventBatch;

/// Reserved event data for the internal wake eventfd. Real registrations
/// carry their descriptor number, which can never be this large.
const WAKE_TOKEN: u64 = u64::MAX;

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Wakes a blocked [`Poller::wait`] call from any thread.
///
/// Writing to the shared eventfd makes `epoll_wait` return immediately; the
/// poller drains and filters the wake event before handing the batch back,
/// so callers only ever observe an early (possibly empty) return.
#[derive(Clone)]
pub struct Waker {
    eventfd: Arc<OwnedFd>,
}

impl Waker {
    pub fn wake(&self) -> io::Result<()> {
        let value: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.eventfd.as_raw_fd(),
                &value as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // A saturated counter means a wake is already pending.
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Resets the eventfd counter after a wake was observed.
    fn drain(&self) {
        let mut value: u64 = 0;
        unsafe {
            libc::read(
                self.eventfd.as_raw_fd(),
                &mut value as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            );
        }
    }
}

/// The readiness multiplexer: owns one epoll instance.
pub(crate) struct Poller {
    epoll: OwnedFd,
    waker: Waker,
}

impl Poller {
    /// Creates the epoll instance and its wake eventfd. Fails only on
    /// resource exhaustion (descriptor limits).
    pub(crate) fn new() -> io::Result<Poller> {
        let epoll = cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })?;
        let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };

        let eventfd = cvt(unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) })?;
        let eventfd = unsafe { OwnedFd::from_raw_fd(eventfd) };

        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };
        cvt(unsafe {
            libc::epoll_ctl(
                epoll.as_raw_fd(),
                libc::EPOLL_CTL_ADD,
                eventfd.as_raw_fd(),
                &mut event,
            )
        })?;

        Ok(Poller {
            epoll,
            waker: Waker {
                eventfd: Arc::new(eventfd),
            },
        })
    }

    pub(crate) fn waker(&self) -> Waker {
        self.waker.clone()
    }

    /// Starts watching `fd` with the given epoll event mask.
    pub(crate) fn add(&self, fd: RawFd, mask: u32) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, mask)
    }

    /// Replaces the event mask of an already watched descriptor.
    pub(crate) fn update(&self, fd: RawFd, mask: u32) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, mask)
    }

    /// Stops watching `fd`.
    pub(crate) fn remove(&self, fd: RawFd) -> io::Result<()> {
        cvt(unsafe {
            libc::epoll_ctl(
                self.epoll.as_raw_fd(),
                libc::EPOLL_CTL_DEL,
                fd,
                ptr::null_mut(),
            )
        })?;
        Ok(())
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, mask: u32) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: mask,
            u64: fd as u64,
        };
        cvt(unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), op, fd, &mut event) })?;
        Ok(())
    }

    /// Blocks until at least one watched descriptor is ready, the timeout
    /// elapses, or the waker fires. `None` blocks indefinitely;
    /// `Duration::ZERO` polls without blocking.
    ///
    /// Signal interruptions are retried internally against the original
    /// deadline, so `EINTR` never surfaces as a spurious empty result.
    /// Returns the number of events written into `batch`.
    pub(crate) fn wait(
        &self,
        batch: &mut EventBatch,
        timeout: Option<Duration>,
    ) -> io::Result<usize> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let timeout_ms: libc::c_int = match deadline {
                None => -1,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    remaining.as_millis().min(libc::c_int::MAX as u128) as libc::c_int
                }
            };

            let capacity = batch.capacity();
            // The kernel writes initialized epoll_event values into the
            // spare capacity; length is corrected right after the call.
            unsafe { batch.events.set_len(capacity) };

            let n = unsafe {
                libc::epoll_wait(
                    self.epoll.as_raw_fd(),
                    batch.events.as_mut_ptr(),
                    capacity as libc::c_int,
                    timeout_ms,
                )
            };

            if n < 0 {
                unsafe { batch.events.set_len(0) };
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            return Ok(0);
                        }
                    }
                    log::trace!("epoll_wait interrupted by signal, retrying");
                    continue;
                }
                return Err(err);
            }

            unsafe { batch.events.set_len(n as usize) };

            let mut woken = false;
            batch.events.retain(|ev| {
                let data = ev.u64;
                if data == WAKE_TOKEN {
                    woken = true;
                    false
                } else {
                    true
                }
            });
            if woken {
                self.waker.drain();
            }

            return Ok(batch.events.len());
        }
    }
}
