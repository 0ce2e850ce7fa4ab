use std::fmt;

use log::debug;

use crate::error::{Error, Result};
use crate::future::Future;

/// The writer half of a [`Future`].
///
/// Only a `Promise` can finish its future. The first of `fulfill`, `reject` or
/// `resolve` wins; later calls are silently ignored. Dropping a promise that never
/// resolved rejects its future with [`Error::BrokenPromise`].
///
/// # Examples
///
/// ```
/// use promise_future::Promise;
/// use std::thread;
///
/// let promise = Promise::new();
/// let future = promise.future();
///
/// let task = thread::spawn(move || {
///     promise.fulfill(String::from("🍓"));
///     promise.fulfill(String::from("🍌"));
/// });
/// task.join().expect("The task thread has panicked");
/// assert_eq!(future.wait().unwrap(), "🍓");
/// ```
pub struct Promise<T: Clone + Send + 'static> {
    future: Future<T>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    pub fn new() -> Self {
        Self {
            future: Future::pending(),
        }
    }

    /// A handle onto the future this promise writes to.
    pub fn future(&self) -> Future<T> {
        self.future.clone()
    }

    pub fn fulfill(&self, value: T) {
        self.resolve(Ok(value))
    }

    /// ```
    /// use promise_future::{Error, Promise};
    ///
    /// let promise = Promise::<()>::new();
    /// promise.reject("💥");
    /// assert!(matches!(promise.future().wait(), Err(Error::Message(m)) if m == "💥"));
    /// ```
    pub fn reject<E: Into<Error>>(&self, error: E) {
        self.resolve(Err(error.into()))
    }

    pub fn resolve(&self, result: Result<T>) {
        self.future.resolve(result);
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Drop for Promise<T> {
    /// If this is an unresolved promise, reject its future.
    fn drop(&mut self) {
        if self.future.resolve(Err(Error::BrokenPromise)) {
            debug!("promise dropped before it was resolved");
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("pending", &self.future.is_pending())
            .finish()
    }
}

/// Create a pending future together with its promise.
pub fn pair<T: Clone + Send + 'static>() -> (Promise<T>, Future<T>) {
    let promise = Promise::new();
    let future = promise.future();
    (promise, future)
}
