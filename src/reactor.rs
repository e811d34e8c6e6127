//! The reactor core: repeated wait/dispatch cycles over one poll handle.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EventLoopConfig;
use crate::error::{Error, Result};
use crate::event::EventBatch;
use crate::poll::PollHandle;
use crate::poller::Waker;

/// Drives wait/dispatch cycles for one poll handle.
///
/// A reactor is single-threaded by construction (`!Send`): the wait call is
/// its only suspension point, and handlers run to completion on the loop
/// thread before the next event in the batch is dispatched. Run several
/// reactors on separate threads if you need more; a descriptor must only
/// ever be registered with one of them.
pub struct Reactor {
    pub(crate) poll_handle: Rc<PollHandle>,
    batch: RefCell<EventBatch>,
    running: Arc<AtomicBool>,
    poll_timeout: Option<Duration>,
}

impl Reactor {
    pub fn new(config: EventLoopConfig) -> Result<Reactor> {
        Ok(Reactor {
            poll_handle: Rc::new(PollHandle::new(config.default_trigger)?),
            batch: RefCell::new(EventBatch::with_capacity(config.batch_capacity)),
            running: Arc::new(AtomicBool::new(true)),
            poll_timeout: config.poll_timeout,
        })
    }

    /// Runs wait/dispatch cycles until a [`ShutdownHandle`] stops the loop
    /// or a fatal multiplexer error occurs. After either, the loop does not
    /// restart; a stopped reactor is done and a failed one leaves every
    /// registration stale.
    pub fn run(&self) -> Result<()> {
        while self.running.load(Ordering::Acquire) {
            if let Err(err) = self.cycle(self.poll_timeout) {
                log::error!("reactor terminating: {err}");
                return Err(err);
            }
        }
        log::debug!("reactor stopped");
        Ok(())
    }

    /// Runs exactly one wait/dispatch cycle and returns how many events were
    /// dispatched to handlers (skipped stale events are not counted).
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` polls without
    /// blocking.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a handler: the cycle is not
    /// re-entrant.
    pub fn run_once(&self, timeout: Option<Duration>) -> Result<usize> {
        self.cycle(timeout)
    }

    fn cycle(&self, timeout: Option<Duration>) -> Result<usize> {
        let mut batch = self
            .batch
            .try_borrow_mut()
            .unwrap_or_else(|_| panic!("reactor cycle re-entered from inside a handler"));

        let filled = self
            .poll_handle
            .poll(&mut batch, timeout)
            .map_err(Error::Io)?;
        log::trace!("wait returned {filled} event(s)");

        let mut dispatched = 0;
        for event in batch.iter() {
            // A handler earlier in this batch may have deregistered this
            // descriptor; its event is stale, not an error.
            let Some(handler) = self.poll_handle.lookup(event.fd()) else {
                log::trace!("fd {} deregistered mid-batch, skipping event", event.fd());
                continue;
            };

            let event = event.prioritized();
            handler.handle_event(&event, &self.poll_handle);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// A `Send + Sync` handle that stops this reactor from any thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            waker: self.poll_handle.waker(),
        }
    }
}

/// Stops a running reactor from any thread.
///
/// Clears the running flag and wakes the poller so an in-flight infinite
/// wait unblocks. Shutdown is permanent for the reactor instance.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    waker: Waker,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        if let Err(err) = self.waker.wake() {
            log::warn!("failed to wake reactor during shutdown: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::handler::EventHandler;
    use crate::interest::{Interest, Ready};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::io::Write;
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::os::unix::net::UnixStream;

    struct Recorder {
        seen: Rc<RefCell<Vec<(RawFd, Ready)>>>,
    }

    impl EventHandler for Recorder {
        fn handle_event(&self, event: &Event, _poll: &PollHandle) {
            self.seen.borrow_mut().push((event.fd(), event.readiness()));
        }
    }

    fn pair() -> (UnixStream, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        b.set_nonblocking(true).unwrap();
        (a, b)
    }

    fn reactor() -> Reactor {
        Reactor::new(EventLoopConfig::default()).unwrap()
    }

    #[test]
    fn readable_and_writable_descriptors_in_one_cycle() {
        let reactor = reactor();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (r_sock, mut r_peer) = pair();
        let (w_sock, _w_peer) = pair();
        r_peer.write_all(b"data").unwrap();

        reactor
            .poll_handle
            .register(r_sock.as_raw_fd(), Interest::READABLE, Recorder { seen: seen.clone() })
            .unwrap();
        reactor
            .poll_handle
            .register(w_sock.as_raw_fd(), Interest::WRITABLE, Recorder { seen: seen.clone() })
            .unwrap();

        let dispatched = reactor.run_once(None).unwrap();
        assert_eq!(dispatched, 2);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        let readiness_of = |fd: RawFd| {
            seen.iter()
                .find(|(f, _)| *f == fd)
                .map(|(_, r)| *r)
                .unwrap()
        };
        assert_eq!(readiness_of(r_sock.as_raw_fd()), Ready::READABLE);
        assert_eq!(readiness_of(w_sock.as_raw_fd()), Ready::WRITABLE);
    }

    #[test]
    fn level_trigger_reports_until_drained() {
        let reactor = reactor();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (sock, mut peer) = pair();
        peer.write_all(b"undrained").unwrap();

        reactor
            .poll_handle
            .register(sock.as_raw_fd(), Interest::READABLE, Recorder { seen: seen.clone() })
            .unwrap();

        // Nothing reads the data, so every cycle reports the descriptor.
        for _ in 0..3 {
            let dispatched = reactor
                .run_once(Some(Duration::from_millis(100)))
                .unwrap();
            assert_eq!(dispatched, 1);
        }
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn edge_trigger_reports_once_per_transition() {
        let reactor = reactor();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (sock, mut peer) = pair();
        peer.write_all(b"once").unwrap();

        reactor
            .poll_handle
            .register(
                sock.as_raw_fd(),
                Interest::READABLE.edge_triggered(),
                Recorder { seen: seen.clone() },
            )
            .unwrap();

        let dispatched = reactor
            .run_once(Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(dispatched, 1);

        // No new data and no drain: the edge never re-fires.
        let dispatched = reactor
            .run_once(Some(Duration::from_millis(50)))
            .unwrap();
        assert_eq!(dispatched, 0);

        // A fresh write is a new transition.
        peer.write_all(b"again").unwrap();
        let dispatched = reactor
            .run_once(Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(dispatched, 1);
    }

    #[test]
    fn batch_capacity_defers_but_never_drops_readiness() {
        let reactor = Reactor::new(
            EventLoopConfig::builder().batch_capacity(2).build(),
        )
        .unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        // Three immediately writable sockets against a capacity of two.
        let socks: Vec<(UnixStream, UnixStream)> = (0..3).map(|_| pair()).collect();
        for (sock, _peer) in &socks {
            reactor
                .poll_handle
                .register(sock.as_raw_fd(), Interest::WRITABLE, Recorder { seen: seen.clone() })
                .unwrap();
        }

        let first = reactor.run_once(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(first, 2);

        let second = reactor.run_once(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(second, 2);

        // The descriptor missed by the first cycle was reported by the
        // second: across both cycles every registered fd appeared.
        let reported: HashSet<RawFd> = seen.borrow().iter().map(|(fd, _)| *fd).collect();
        let registered: HashSet<RawFd> =
            socks.iter().map(|(sock, _)| sock.as_raw_fd()).collect();
        assert_eq!(reported, registered);
    }

    struct DeregisterOther {
        other: RawFd,
        calls: Rc<RefCell<Vec<RawFd>>>,
    }

    impl EventHandler for DeregisterOther {
        fn handle_event(&self, event: &Event, poll: &PollHandle) {
            self.calls.borrow_mut().push(event.fd());
            let _ = poll.deregister(self.other);
        }
    }

    #[test]
    fn same_batch_deregistration_skips_the_stale_event() {
        let reactor = reactor();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let (sock_a, mut peer_a) = pair();
        let (sock_b, mut peer_b) = pair();
        peer_a.write_all(b"a").unwrap();
        peer_b.write_all(b"b").unwrap();

        // Whichever handler runs first deregisters the other descriptor, so
        // the second event in the batch must be skipped silently.
        reactor
            .poll_handle
            .register(
                sock_a.as_raw_fd(),
                Interest::READABLE,
                DeregisterOther { other: sock_b.as_raw_fd(), calls: calls.clone() },
            )
            .unwrap();
        reactor
            .poll_handle
            .register(
                sock_b.as_raw_fd(),
                Interest::READABLE,
                DeregisterOther { other: sock_a.as_raw_fd(), calls: calls.clone() },
            )
            .unwrap();

        let dispatched = reactor
            .run_once(Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn peer_close_masks_readability() {
        let reactor = reactor();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (sock, mut peer) = pair();
        peer.write_all(b"tail").unwrap();
        drop(peer);

        reactor
            .poll_handle
            .register(
                sock.as_raw_fd(),
                Interest::READABLE | Interest::PEER_CLOSED,
                Recorder { seen: seen.clone() },
            )
            .unwrap();

        let dispatched = reactor
            .run_once(Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(dispatched, 1);

        let (_, readiness) = seen.borrow()[0];
        assert!(readiness.contains(Ready::PEER_CLOSED));
        // Close takes priority over the pending data.
        assert!(!readiness.contains(Ready::READABLE));
    }

    #[test]
    fn shutdown_handle_stops_a_blocked_run() {
        let (tx, rx) = std::sync::mpsc::channel();

        let worker = std::thread::spawn(move || {
            let reactor = Reactor::new(
                EventLoopConfig::builder().poll_timeout(None).build(),
            )
            .unwrap();
            tx.send(reactor.shutdown_handle()).unwrap();
            reactor.run()
        });

        let handle = rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        handle.shutdown();

        let result = worker.join().unwrap();
        assert!(result.is_ok());
    }
}
