use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::warn;
use thiserror::Error;

/// The failure carried by a rejected [`Future`](crate::Future).
///
/// Failures are cloned once per observer, so custom payloads are shared behind an
/// `Arc`. Nothing in this crate inspects the payload.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Custom(Arc<dyn std::error::Error + Send + Sync + 'static>),
    #[error("{0}")]
    Message(String),
    #[error("callback panicked: {0}")]
    Panicked(String),
    #[error("promise was dropped before it was resolved")]
    BrokenPromise,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap any error type as an opaque failure.
    ///
    /// ```
    /// use promise_future::Error;
    /// use std::io;
    ///
    /// let err = Error::new(io::Error::new(io::ErrorKind::Other, "disk on fire"));
    /// assert_eq!(err.to_string(), "disk on fire");
    /// assert!(err.downcast_ref::<io::Error>().is_some());
    /// ```
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Custom(Arc::new(error))
    }

    pub fn msg<M: ToString>(message: M) -> Self {
        Error::Message(message.to_string())
    }

    /// Borrow the wrapped error if it was built by [`Error::new`] with an `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Custom(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Message(message.to_owned())
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message(message)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Run a user callback, turning a panic into `Error::Panicked`.
pub(crate) fn catch_panic<R, F>(f: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!("captured panic in callback: {}", message);
        Error::Panicked(message)
    })
}

#[cfg(test)]
mod tests {
    use super::{catch_panic, Error};
    use std::fmt;

    #[derive(Debug)]
    struct Teapot;

    impl fmt::Display for Teapot {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "short and stout")
        }
    }

    impl std::error::Error for Teapot {}

    #[test]
    fn test_custom_error_is_transparent() {
        let err = Error::new(Teapot);
        assert_eq!(err.to_string(), "short and stout");
        assert!(err.downcast_ref::<Teapot>().is_some());
        assert!(Error::msg("x").downcast_ref::<Teapot>().is_none());
    }

    #[test]
    fn test_clone_shares_payload() {
        let err = Error::new(Teapot);
        let copy = err.clone();
        assert_eq!(copy.to_string(), err.to_string());
    }

    #[test]
    fn test_catch_panic() {
        assert_eq!(catch_panic(|| 7).unwrap(), 7);
        match catch_panic(|| -> i32 { panic!("💥") }) {
            Err(Error::Panicked(message)) => assert_eq!(message, "💥"),
            other => panic!("unexpected {:?}", other),
        }
        match catch_panic(|| -> i32 { panic!("{} {}", "formatted", 1) }) {
            Err(Error::Panicked(message)) => assert_eq!(message, "formatted 1"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
