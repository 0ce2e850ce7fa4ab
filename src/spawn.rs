//! Shortcuts that hide the promise plumbing.
use std::sync::Arc;

use crate::error::{catch_panic, Result};
use crate::executor::{default_executor, Executor};
use crate::future::Future;
use crate::promise::Promise;

/// Completion function handed out by [`from_callback`].
pub type Completion<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

/// Run `f` on the default executor and capture its outcome in a future.
///
/// ```
/// use promise_future::spawn;
///
/// let answer = spawn(|| Ok(6 * 7));
/// assert_eq!(answer.wait().unwrap(), 42);
/// ```
pub fn spawn<T, F>(f: F) -> Future<T>
where
    T: Clone + Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    spawn_on(&default_executor(), f)
}

pub fn spawn_on<T, F>(executor: &Arc<dyn Executor>, f: F) -> Future<T>
where
    T: Clone + Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let promise = Promise::new();
    let future = promise.future();
    executor.execute(Box::new(move || {
        promise.resolve(catch_panic(f).and_then(|result| result))
    }));
    future
}

/// Hand `f` a completion function instead of a promise.
///
/// `f` runs on the calling thread; the future resolves whenever the completion is
/// called. A panic in `f` rejects the future unless the completion ran first.
/// Dropping the completion without calling it rejects the future with
/// [`Error::BrokenPromise`](crate::Error::BrokenPromise).
///
/// ```
/// use promise_future::from_callback;
/// use std::thread;
///
/// let future = from_callback(|done| {
///     thread::spawn(move || done(Ok("called back")));
/// });
/// assert_eq!(future.wait().unwrap(), "called back");
/// ```
pub fn from_callback<T, F>(f: F) -> Future<T>
where
    T: Clone + Send + 'static,
    F: FnOnce(Completion<T>),
{
    let promise = Arc::new(Promise::new());
    let future = promise.future();
    let writer = promise.clone();
    let completion: Completion<T> = Box::new(move |result| writer.resolve(result));
    if let Err(err) = catch_panic(move || f(completion)) {
        // No-op if the completion already ran.
        promise.reject(err);
    }
    future
}

#[cfg(test)]
mod tests {
    use super::{from_callback, spawn, spawn_on};
    use crate::executor::{Executor, SerialExecutor};
    use crate::Error;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_spawn_captures_failure() {
        let failed = spawn(|| -> crate::Result<()> { Err(Error::msg("no luck")) });
        assert_eq!(failed.wait().unwrap_err().to_string(), "no luck");

        let panicked = spawn(|| -> crate::Result<()> { panic!("worker died") });
        assert!(matches!(panicked.wait(), Err(Error::Panicked(_))));
    }

    #[test]
    fn test_spawn_on_runs_on_executor() {
        let serial: Arc<dyn Executor> = Arc::new(SerialExecutor::new("spawn-target").unwrap());
        let name = spawn_on(&serial, || Ok(thread::current().name().map(str::to_owned)));
        assert_eq!(name.wait().unwrap().as_deref(), Some("spawn-target"));
    }

    #[test]
    fn test_from_callback_dropped_completion() {
        let future = from_callback::<i32, _>(drop);
        assert!(matches!(future.wait(), Err(Error::BrokenPromise)));
    }

    #[test]
    fn test_from_callback_completion_beats_later_panic() {
        let future = from_callback(|done| {
            done(Ok(1));
            panic!("after done");
        });
        assert_eq!(future.wait().unwrap(), 1);
    }

    #[test]
    fn test_from_callback_panic() {
        let future = from_callback::<i32, _>(|_done| panic!("before completing"));
        assert!(matches!(future.wait(), Err(Error::Panicked(_))));
    }
}
