//! Event loop configuration.

use std::time::Duration;

use crate::interest::Trigger;

/// Events held per wait call unless configured otherwise.
pub const DEFAULT_BATCH_CAPACITY: usize = 1024;
/// Default wait timeout for [`crate::EventLoop::run`], in milliseconds.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

/// Configuration for an [`crate::EventLoop`].
///
/// Use [`EventLoopConfig::builder`] for ergonomic construction:
///
/// ```
/// use weir_io::{EventLoopConfig, Trigger};
/// use std::time::Duration;
///
/// let config = EventLoopConfig::builder()
///     .batch_capacity(256)                       // events per wait call
///     .default_trigger(Trigger::Level)           // per-registration override possible
///     .poll_timeout(Some(Duration::from_millis(50)))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Upper bound on readiness events delivered by one wait call. Excess
    /// readiness is deferred to the next call, not dropped. Zero is clamped
    /// to one.
    pub batch_capacity: usize,
    /// Trigger mode applied to registrations that do not pick one
    /// explicitly.
    pub default_trigger: Trigger,
    /// Timeout for each wait call inside `run`. `None` blocks indefinitely
    /// (shutdown then relies on the waker); `Some(Duration::ZERO)` busy
    /// polls and is rarely what you want.
    pub poll_timeout: Option<Duration>,
}

impl EventLoopConfig {
    pub fn builder() -> EventLoopConfigBuilder {
        EventLoopConfigBuilder::new()
    }
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            default_trigger: Trigger::Level,
            poll_timeout: Some(Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS)),
        }
    }
}

/// Builder for [`EventLoopConfig`]. Unset fields fall back to the defaults.
pub struct EventLoopConfigBuilder {
    batch_capacity: Option<usize>,
    default_trigger: Option<Trigger>,
    poll_timeout: Option<Option<Duration>>,
}

impl EventLoopConfigBuilder {
    pub fn new() -> Self {
        Self {
            batch_capacity: None,
            default_trigger: None,
            poll_timeout: None,
        }
    }

    /// Set the maximum number of events per wait call.
    pub fn batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = Some(capacity);
        self
    }

    /// Set the trigger mode used when a registration does not choose one.
    pub fn default_trigger(mut self, trigger: Trigger) -> Self {
        self.default_trigger = Some(trigger);
        self
    }

    /// Set the wait timeout used by `run`; `None` blocks indefinitely.
    pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> EventLoopConfig {
        let default = EventLoopConfig::default();
        EventLoopConfig {
            batch_capacity: self.batch_capacity.unwrap_or(default.batch_capacity).max(1),
            default_trigger: self.default_trigger.unwrap_or(default.default_trigger),
            poll_timeout: self.poll_timeout.unwrap_or(default.poll_timeout),
        }
    }
}

impl Default for EventLoopConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
