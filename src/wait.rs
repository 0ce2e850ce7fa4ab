//! Getting at a future's result from synchronous or async code.
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::executor::immediate;
use crate::future::{Future, ObserverHandle};

impl<T: Clone + Send + 'static> Future<T> {
    /// Block the calling thread until the future is finished.
    ///
    /// Do not call this from an executor thread that still has to run the work
    /// resolving this future; that thread would wait on itself forever.
    ///
    /// ```
    /// use promise_future::Promise;
    /// use std::thread;
    /// use std::time::Duration;
    ///
    /// let promise = Promise::new();
    /// let future = promise.future();
    /// thread::spawn(move || {
    ///     thread::sleep(Duration::from_millis(50));
    ///     promise.fulfill(42);
    /// });
    /// assert_eq!(future.wait().unwrap(), 42);
    /// ```
    pub fn wait(&self) -> Result<T> {
        let (sender, receiver) = sync_channel(1);
        self.observe(immediate(), move |result| {
            let _ = sender.send(result);
        });
        receiver.recv().unwrap_or(Err(Error::BrokenPromise))
    }

    /// Like [`wait`](Future::wait), but give up after `timeout` and return `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let (sender, receiver) = sync_channel(1);
        let handle = self.observe(immediate(), move |result| {
            let _ = sender.send(result);
        });
        match receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => {
                handle.remove();
                None
            }
            Err(RecvTimeoutError::Disconnected) => Some(Err(Error::BrokenPromise)),
        }
    }
}

/// The `.await` adapter for [`Future`].
///
/// ```
/// use futures::executor::block_on;
/// use promise_future::Promise;
/// use std::thread;
///
/// let promise = Promise::new();
/// let future = promise.future();
/// let task = thread::spawn(move || block_on(async { future.await }));
/// promise.fulfill("Hi");
/// assert_eq!(task.join().expect("The task thread has panicked.").unwrap(), "Hi");
/// ```
pub struct Waiter<T: Clone + Send + 'static> {
    future: Future<T>,
    waker: Arc<Mutex<Option<Waker>>>,
    observer: Option<ObserverHandle<T>>,
}

impl<T: Clone + Send + 'static> IntoFuture for Future<T> {
    type Output = Result<T>;
    type IntoFuture = Waiter<T>;

    fn into_future(self) -> Self::IntoFuture {
        Waiter {
            future: self,
            waker: Arc::new(Mutex::new(None)),
            observer: None,
        }
    }
}

impl<T: Clone + Send + 'static> std::future::Future for Waiter<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // Store the waker before looking at the state so a resolution in between
        // still finds it.
        *this.waker.lock().unwrap_or_else(PoisonError::into_inner) = Some(cx.waker().clone());
        if let Some(result) = this.future.result() {
            this.observer = None;
            return Poll::Ready(result);
        }
        if this.observer.is_none() {
            let waker = this.waker.clone();
            this.observer = Some(this.future.observe(immediate(), move |_| {
                let waker = waker.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(waker) = waker {
                    waker.wake()
                }
            }));
        }
        Poll::Pending
    }
}

impl<T: Clone + Send + 'static> Drop for Waiter<T> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.remove();
        }
    }
}
