use std::io;
use std::os::unix::io::RawFd;
use std::result::Result as StdResult;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = StdResult<T, Error>;

/// Errors produced by registration operations and the reactor loop.
///
/// Registration misuse (`AlreadyRegistered`, `NotRegistered`,
/// `InvalidDescriptor`) is reported synchronously to the caller of the
/// mutating operation and never terminates the loop. `Io` covers fatal
/// conditions: if [`crate::EventLoop::run`] returns it, every registration is
/// stale and the caller must build a fresh event loop.
#[derive(Debug, Error)]
pub enum Error {
    /// The descriptor already has a live registration entry. Deregister it
    /// before registering again.
    #[error("descriptor {0} is already registered")]
    AlreadyRegistered(RawFd),

    /// The descriptor is not known to the registry.
    #[error("descriptor {0} is not registered")]
    NotRegistered(RawFd),

    /// The kernel poller rejected the descriptor. Typically the descriptor
    /// was closed before the operation, or it refers to something epoll
    /// cannot watch (regular files report readiness this way).
    #[error("descriptor {fd} rejected by the kernel poller: {source}")]
    InvalidDescriptor {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    /// A non-retryable I/O failure from the multiplexer itself. Interrupted
    /// waits are retried internally and never surface here.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Maps an `epoll_ctl` failure onto the registration error taxonomy.
    pub(crate) fn from_ctl(fd: RawFd, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EEXIST) => Error::AlreadyRegistered(fd),
            Some(libc::ENOENT) => Error::NotRegistered(fd),
            Some(libc::EBADF) | Some(libc::EPERM) => Error::InvalidDescriptor { fd, source: err },
            _ => Error::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctl_errors_map_to_taxonomy() {
        let err = Error::from_ctl(7, io::Error::from_raw_os_error(libc::EEXIST));
        assert!(matches!(err, Error::AlreadyRegistered(7)));

        let err = Error::from_ctl(7, io::Error::from_raw_os_error(libc::ENOENT));
        assert!(matches!(err, Error::NotRegistered(7)));

        let err = Error::from_ctl(7, io::Error::from_raw_os_error(libc::EBADF));
        assert!(matches!(err, Error::InvalidDescriptor { fd: 7, .. }));

        let err = Error::from_ctl(7, io::Error::from_raw_os_error(libc::EPERM));
        assert!(matches!(err, Error::InvalidDescriptor { fd: 7, .. }));

        let err = Error::from_ctl(7, io::Error::from_raw_os_error(libc::ENOMEM));
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn display_names_the_descriptor() {
        let err = Error::AlreadyRegistered(42);
        assert!(err.to_string().contains("42"));
    }
}
