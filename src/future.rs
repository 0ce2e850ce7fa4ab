//! The single-assignment `Future` and its observer registry.
//!
//! A `Future<T>` is a cheap, cloneable handle onto shared state that is either
//! pending (with an ordered set of observers) or finished with a `Result<T>`.
//! The only way to finish it is through the paired [`Promise`](crate::Promise).
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::executor::{default_executor, Executor};

pub(crate) type Callback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

struct Observer<T> {
    executor: Arc<dyn Executor>,
    callback: Callback<T>,
}

impl<T: Send + 'static> Observer<T> {
    fn dispatch(self, result: Result<T>) {
        let callback = self.callback;
        self.executor.execute(Box::new(move || callback(result)));
    }
}

enum State<T> {
    Pending(BTreeMap<u64, Observer<T>>),
    Finished(Result<T>),
}

pub(crate) struct Inner<T> {
    state: Mutex<State<T>>,
    next_id: AtomicU64,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Callbacks never run under this lock, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A read-only handle onto a value that becomes available exactly once.
///
/// Cloning a `Future` clones the handle, not the value; every clone observes the
/// same resolution.
///
/// ```
/// use promise_future::{Future, Promise};
///
/// let promise = Promise::new();
/// let future = promise.future();
/// assert!(future.is_pending());
///
/// promise.fulfill("🍓");
/// assert!(future.is_fulfilled());
/// assert_eq!(future.wait().unwrap(), "🍓");
/// ```
pub struct Future<T> {
    pub(crate) inner: Arc<Inner<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Future<T> {
    pub(crate) fn pending() -> Self {
        Self::with_state(State::Pending(BTreeMap::new()))
    }

    fn with_state(state: State<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// A future that is already finished with `result`.
    pub fn resolved(result: Result<T>) -> Self {
        Self::with_state(State::Finished(result))
    }

    pub fn fulfilled(value: T) -> Self {
        Self::resolved(Ok(value))
    }

    pub fn rejected<E: Into<Error>>(error: E) -> Self {
        Self::resolved(Err(error.into()))
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.lock(), State::Pending(_))
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(*self.inner.lock(), State::Finished(Ok(_)))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(*self.inner.lock(), State::Finished(Err(_)))
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// A snapshot of the result, or `None` while the future is pending.
    pub fn result(&self) -> Option<Result<T>> {
        match &*self.inner.lock() {
            State::Pending(_) => None,
            State::Finished(result) => Some(result.clone()),
        }
    }

    /// Finish the future. Returns `false`, without notifying anyone, if it was
    /// already finished.
    pub(crate) fn resolve(&self, result: Result<T>) -> bool {
        let observers = {
            let mut state = self.inner.lock();
            if let State::Finished(_) = *state {
                debug!("ignoring resolution of an already finished future");
                return false;
            }
            match mem::replace(&mut *state, State::Finished(result.clone())) {
                State::Pending(observers) => observers,
                State::Finished(_) => BTreeMap::new(),
            }
        };
        trace!("future resolved, notifying {} observers", observers.len());
        for observer in observers.into_values() {
            observer.dispatch(result.clone());
        }
        true
    }

    /// Register `callback` to run on `executor` with the eventual result.
    ///
    /// If the future is already finished the callback is dispatched right away.
    /// Observers registered while pending run in registration order, each exactly
    /// once.
    ///
    /// ```
    /// use promise_future::{Promise, SerialExecutor};
    /// use std::sync::{mpsc::channel, Arc};
    ///
    /// let promise = Promise::new();
    /// let (tx, rx) = channel();
    /// let serial = Arc::new(SerialExecutor::new("observer").unwrap());
    /// promise.future().observe(serial, move |result| {
    ///     tx.send(result.unwrap()).unwrap();
    /// });
    /// promise.fulfill(3);
    /// assert_eq!(rx.recv().unwrap(), 3);
    /// ```
    pub fn observe<F>(&self, executor: Arc<dyn Executor>, callback: F) -> ObserverHandle<T>
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let observer = Observer {
            executor,
            callback: Box::new(callback),
        };
        let result = {
            let mut state = self.inner.lock();
            match &mut *state {
                State::Pending(observers) => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    observers.insert(id, observer);
                    return ObserverHandle {
                        future: Arc::downgrade(&self.inner),
                        id,
                    };
                }
                State::Finished(result) => result.clone(),
            }
        };
        observer.dispatch(result);
        ObserverHandle::detached()
    }

    /// `observe` on the default executor.
    pub fn on_complete<F>(&self, callback: F) -> ObserverHandle<T>
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.observe(default_executor(), callback)
    }

    pub fn on_success<F>(&self, callback: F) -> ObserverHandle<T>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_complete(move |result| {
            if let Ok(value) = result {
                callback(value)
            }
        })
    }

    pub fn on_failure<F>(&self, callback: F) -> ObserverHandle<T>
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.on_complete(move |result| {
            if let Err(err) = result {
                callback(err)
            }
        })
    }
}

impl<T> fmt::Debug for Future<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.lock() {
            State::Pending(observers) => f
                .debug_struct("Future")
                .field("observers", &observers.len())
                .finish(),
            State::Finished(result) => f.debug_tuple("Future").field(result).finish(),
        }
    }
}

/// Identifies one registered observer so it can be withdrawn before it fires.
///
/// The handle does not keep the future alive.
pub struct ObserverHandle<T> {
    future: Weak<Inner<T>>,
    id: u64,
}

impl<T> ObserverHandle<T> {
    fn detached() -> Self {
        Self {
            future: Weak::new(),
            id: 0,
        }
    }

    /// Withdraw the observer. Returns `true` if it was still queued; `false` if it
    /// already ran, was removed before, or the future no longer exists.
    pub fn remove(&self) -> bool {
        let Some(inner) = self.future.upgrade() else {
            return false;
        };
        let removed = match &mut *inner.lock() {
            State::Pending(observers) => observers.remove(&self.id),
            State::Finished(_) => None,
        };
        // Dropped outside the lock: the callback may own a promise whose drop resolves.
        removed.is_some()
    }
}

impl<T> fmt::Debug for ObserverHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Future;
    use crate::executor::{Executor, ImmediateExecutor, SerialExecutor};
    use crate::Error;
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    fn immediate() -> Arc<dyn Executor> {
        Arc::new(ImmediateExecutor)
    }

    #[test]
    fn test_resolved_constructors() {
        let ok = Future::fulfilled(1);
        assert!(ok.is_fulfilled());
        assert!(!ok.is_pending());
        assert!(!ok.is_rejected());

        let err = Future::<i32>::rejected("nope");
        assert!(err.is_rejected());
        assert_eq!(err.result().unwrap().unwrap_err().to_string(), "nope");
    }

    #[test]
    fn test_first_resolution_wins() {
        let future = Future::pending();
        assert!(future.resolve(Ok(1)));
        assert!(!future.resolve(Ok(2)));
        assert!(!future.resolve(Err(Error::msg("late"))));
        assert_eq!(future.result().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_observers_fire_once_in_registration_order() {
        let future = Future::pending();
        let seen = Arc::new(Mutex::new(vec![]));
        for i in 0..5 {
            let seen = seen.clone();
            future.observe(immediate(), move |result| {
                seen.lock().unwrap().push((i, result.unwrap()));
            });
        }
        future.resolve(Ok("a"));
        future.resolve(Ok("b"));
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..5).map(|i| (i, "a")).collect::<Vec<_>>());
    }

    #[test]
    fn test_observe_after_finish_dispatches_immediately() {
        let future = Future::fulfilled(9);
        let (tx, rx) = channel();
        let handle = future.observe(immediate(), move |result| tx.send(result.unwrap()).unwrap());
        assert_eq!(rx.try_recv().unwrap(), 9);
        assert!(!handle.remove());
    }

    #[test]
    fn test_remove_observer() {
        let future = Future::pending();
        let (tx, rx) = channel();
        let kept_tx = tx.clone();
        let removed = future.observe(immediate(), move |result: crate::Result<i32>| {
            tx.send(("removed", result.unwrap())).unwrap()
        });
        future.observe(immediate(), move |result| {
            kept_tx.send(("kept", result.unwrap())).unwrap()
        });
        assert!(removed.remove());
        assert!(!removed.remove());
        future.resolve(Ok(4));
        assert_eq!(rx.recv().unwrap(), ("kept", 4));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_after_future_dropped_is_noop() {
        let future = Future::<i32>::pending();
        let handle = future.observe(immediate(), |_| {});
        drop(future);
        assert!(!handle.remove());
    }

    #[test]
    fn test_observer_runs_on_its_executor() {
        let serial: Arc<dyn Executor> = Arc::new(SerialExecutor::new("observer-home").unwrap());
        let future = Future::pending();
        let (tx, rx) = channel();
        future.observe(serial, move |_: crate::Result<()>| {
            tx.send(thread::current().name().map(str::to_owned)).unwrap();
        });
        future.resolve(Ok(()));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().as_deref(),
            Some("observer-home")
        );
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let future = Future::pending();
        let (tx, rx) = channel();
        future.observe(immediate(), |_: crate::Result<i32>| panic!("bad observer"));
        future.observe(immediate(), move |result| tx.send(result.unwrap()).unwrap());
        future.resolve(Ok(5));
        assert_eq!(rx.recv().unwrap(), 5);
    }

    #[test]
    fn test_success_and_failure_callbacks() {
        let (tx, rx) = channel();
        for future in [Future::fulfilled(1), Future::rejected("broken")] {
            let on_success = tx.clone();
            let on_failure = tx.clone();
            let on_complete = tx.clone();
            future.on_success(move |value| on_success.send(format!("success {}", value)).unwrap());
            future.on_failure(move |err| on_failure.send(format!("failure {}", err)).unwrap());
            future.on_complete(move |result| {
                on_complete.send(format!("complete {}", result.is_ok())).unwrap()
            });
        }
        drop(tx);
        let mut seen: Vec<String> = rx.iter().collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                "complete false",
                "complete true",
                "failure broken",
                "success 1",
            ]
        );
    }

    #[test]
    fn test_debug_shows_state() {
        let future = Future::<i32>::pending();
        future.observe(immediate(), |_| {});
        assert_eq!(format!("{:?}", future), "Future { observers: 1 }");
        assert_eq!(format!("{:?}", Future::fulfilled(2)), "Future(Ok(2))");
    }
}
