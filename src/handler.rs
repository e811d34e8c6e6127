use crate::event::Event;
use crate::interest::{Interest, Trigger};
use crate::poll::PollHandle;
use std::rc::Rc;

/// User-supplied callback invoked for every readiness event on a registered
/// descriptor.
///
/// Handlers run synchronously on the loop thread and must complete promptly:
/// nothing preempts them, and the next event in the batch is not dispatched
/// until they return. Perform non-blocking I/O only. Under edge-triggered
/// registration the handler must drain the descriptor (read or write until
/// `WouldBlock`) before returning, or remaining readiness is never reported
/// again.
///
/// The `poll` argument is the loop's registration surface, so a handler can
/// deregister its own descriptor (the usual way to signal a handler-level
/// failure), re-arm it, or register new ones from inside the callback.
pub trait EventHandler {
    fn handle_event(&self, event: &Event, poll: &PollHandle);
}

/// One live registration: the interest set, its effective trigger mode, and
/// the owning handler.
pub(crate) struct HandlerEntry {
    pub(crate) handler: Rc<dyn EventHandler>,
    pub(crate) interest: Interest,
    pub(crate) trigger: Trigger,
}

impl HandlerEntry {
    pub(crate) fn new<H>(handler: H, interest: Interest, trigger: Trigger) -> HandlerEntry
    where
        H: EventHandler + 'static,
    {
        HandlerEntry {
            handler: Rc::new(handler),
            interest,
            trigger,
        }
    }
}
