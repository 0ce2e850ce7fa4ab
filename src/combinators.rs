//! Combinators that derive new futures from existing ones.
//!
//! Each combinator makes a fresh [`Promise`], observes its inputs and resolves the
//! promise from inside those observers. Methods without an `_on` suffix run their
//! callbacks on the default executor as it is at the moment they are called.
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{catch_panic, Error, Result};
use crate::executor::{default_executor, Executor};
use crate::future::Future;
use crate::promise::Promise;

/// What a chaining callback may hand back: a future, or a synchronous failure.
pub trait Continuation<T> {
    fn into_continuation(self) -> Future<T>;
}

impl<T> Continuation<T> for Future<T> {
    fn into_continuation(self) -> Future<T> {
        self
    }
}

impl<T> Continuation<T> for Result<Future<T>> {
    fn into_continuation(self) -> Future<T> {
        self.unwrap_or_else(Future::rejected)
    }
}

fn continue_with<T, R, F>(f: F) -> Future<T>
where
    R: Continuation<T>,
    F: FnOnce() -> R,
{
    match catch_panic(f) {
        Ok(next) => next.into_continuation(),
        Err(err) => Future::rejected(err),
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Forward this future's result into `promise` once it is known.
    fn pipe(&self, executor: &Arc<dyn Executor>, promise: Promise<T>) {
        self.observe(executor.clone(), move |result| promise.resolve(result));
    }

    /// Chain a dependent future onto a fulfilled value.
    ///
    /// ```
    /// use promise_future::Future;
    ///
    /// let total = Future::fulfilled(10)
    ///     .and_then(|v| Future::fulfilled(v + 10))
    ///     .and_then(|v| Future::fulfilled(v + 5));
    /// assert_eq!(total.wait().unwrap(), 25);
    /// ```
    pub fn and_then<U, R, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        R: Continuation<U>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        self.and_then_on(&default_executor(), f)
    }

    pub fn and_then_on<U, R, F>(&self, executor: &Arc<dyn Executor>, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        R: Continuation<U>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        let promise = Promise::new();
        let output = promise.future();
        let next_executor = executor.clone();
        self.observe(executor.clone(), move |result| match result {
            Ok(value) => {
                continue_with::<U, _, _>(move || f(value)).pipe(&next_executor, promise)
            }
            Err(err) => promise.reject(err),
        });
        output
    }

    /// Transform a fulfilled value. An `Err` from `f` rejects the output.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        self.map_on(&default_executor(), f)
    }

    pub fn map_on<U, F>(&self, executor: &Arc<dyn Executor>, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let promise = Promise::new();
        let output = promise.future();
        self.observe(executor.clone(), move |result| {
            let mapped = result.and_then(|value| catch_panic(move || f(value)));
            promise.resolve(mapped.and_then(|inner| inner))
        });
        output
    }

    /// Replace a rejection with the future returned by `f`.
    ///
    /// ```
    /// use promise_future::Future;
    ///
    /// let fallback = Future::<&str>::rejected("offline").recover(|_| Future::fulfilled("fallback"));
    /// assert_eq!(fallback.wait().unwrap(), "fallback");
    /// ```
    pub fn recover<R, F>(&self, f: F) -> Future<T>
    where
        R: Continuation<T>,
        F: FnOnce(Error) -> R + Send + 'static,
    {
        self.recover_on(&default_executor(), f)
    }

    pub fn recover_on<R, F>(&self, executor: &Arc<dyn Executor>, f: F) -> Future<T>
    where
        R: Continuation<T>,
        F: FnOnce(Error) -> R + Send + 'static,
    {
        let promise = Promise::new();
        let output = promise.future();
        let next_executor = executor.clone();
        self.observe(executor.clone(), move |result| match result {
            Ok(value) => promise.fulfill(value),
            Err(err) => {
                continue_with::<T, _, _>(move || f(err)).pipe(&next_executor, promise)
            }
        });
        output
    }

    /// Replace a rejection with a value.
    pub fn recover_value<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(Error) -> T + Send + 'static,
    {
        self.recover_value_on(&default_executor(), f)
    }

    pub fn recover_value_on<F>(&self, executor: &Arc<dyn Executor>, f: F) -> Future<T>
    where
        F: FnOnce(Error) -> T + Send + 'static,
    {
        let promise = Promise::new();
        let output = promise.future();
        self.observe(executor.clone(), move |result| {
            promise.resolve(result.or_else(|err| catch_panic(move || f(err))))
        });
        output
    }

    /// Pair this future with `other`.
    ///
    /// The pair is fulfilled once both sides are; the first rejection from either
    /// side rejects it without waiting for the other.
    ///
    /// ```
    /// use promise_future::Future;
    ///
    /// let both = Future::fulfilled(1).zip(&Future::fulfilled("one"));
    /// assert_eq!(both.wait().unwrap(), (1, "one"));
    /// ```
    pub fn zip<U>(&self, other: &Future<U>) -> Future<(T, U)>
    where
        U: Clone + Send + 'static,
    {
        self.zip_on(&default_executor(), other)
    }

    pub fn zip_on<U>(&self, executor: &Arc<dyn Executor>, other: &Future<U>) -> Future<(T, U)>
    where
        U: Clone + Send + 'static,
    {
        let promise = Arc::new(Promise::new());
        let output = promise.future();
        let slots = Arc::new(Mutex::new((None::<T>, None::<U>)));
        {
            let promise = promise.clone();
            let slots = slots.clone();
            self.observe(executor.clone(), move |result| match result {
                Ok(left) => {
                    let right = {
                        let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
                        match slots.1.take() {
                            Some(right) => right,
                            None => {
                                slots.0 = Some(left);
                                return;
                            }
                        }
                    };
                    promise.fulfill((left, right));
                }
                Err(err) => promise.reject(err),
            });
        }
        other.observe(executor.clone(), move |result| match result {
            Ok(right) => {
                let left = {
                    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
                    match slots.0.take() {
                        Some(left) => left,
                        None => {
                            slots.1 = Some(right);
                            return;
                        }
                    }
                };
                promise.fulfill((left, right));
            }
            Err(err) => promise.reject(err),
        });
        output
    }

    /// Run `f` once this future finishes, whatever the outcome.
    ///
    /// The output carries this future's value only if both this future and the one
    /// returned by `f` are fulfilled. If both fail, this future's error wins.
    pub fn always<R, F>(&self, f: F) -> Future<T>
    where
        R: Continuation<()>,
        F: FnOnce() -> R + Send + 'static,
    {
        self.always_on(&default_executor(), f)
    }

    pub fn always_on<R, F>(&self, executor: &Arc<dyn Executor>, f: F) -> Future<T>
    where
        R: Continuation<()>,
        F: FnOnce() -> R + Send + 'static,
    {
        let promise = Promise::new();
        let output = promise.future();
        let next_executor = executor.clone();
        self.observe(executor.clone(), move |source| {
            continue_with::<(), _, _>(f).observe(next_executor, move |cleanup| {
                promise.resolve(match (source, cleanup) {
                    (Err(err), _) | (Ok(_), Err(err)) => Err(err),
                    (Ok(value), Ok(())) => Ok(value),
                })
            });
        });
        output
    }

    /// Drop the value, keeping only success or failure.
    pub fn discard(&self) -> Future<()> {
        self.discard_on(&default_executor())
    }

    pub fn discard_on(&self, executor: &Arc<dyn Executor>) -> Future<()> {
        self.map_on(executor, |_| Ok(()))
    }
}

/// Thread an accumulator through `futures` in iteration order.
///
/// Each step waits for both the running accumulator and the next element, then
/// calls `f`. A rejection anywhere skips the remaining steps.
///
/// ```
/// use promise_future::{fold, Future};
///
/// let words = vec![Future::fulfilled("a"), Future::fulfilled("b")];
/// let joined = fold(Future::fulfilled(String::new()), words, |mut acc, word| {
///     acc.push_str(word);
///     Future::fulfilled(acc)
/// });
/// assert_eq!(joined.wait().unwrap(), "ab");
/// ```
pub fn fold<A, B, I, R, F>(seed: Future<A>, futures: I, f: F) -> Future<A>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    I: IntoIterator<Item = Future<B>>,
    R: Continuation<A>,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    fold_on(&default_executor(), seed, futures, f)
}

pub fn fold_on<A, B, I, R, F>(
    executor: &Arc<dyn Executor>,
    seed: Future<A>,
    futures: I,
    f: F,
) -> Future<A>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    I: IntoIterator<Item = Future<B>>,
    R: Continuation<A>,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    let f = Arc::new(f);
    futures.into_iter().fold(seed, |acc, next| {
        let f = f.clone();
        acc.zip_on(executor, &next)
            .and_then_on(executor, move |(acc, item)| f(acc, item))
    })
}

/// `fold` with a combining function that cannot fail.
///
/// ```
/// use promise_future::{reduce, Future};
///
/// let numbers = (1..=10).map(Future::fulfilled);
/// assert_eq!(reduce(Future::fulfilled(0), numbers, |a, b| a + b).wait().unwrap(), 55);
/// ```
pub fn reduce<A, B, I, F>(seed: Future<A>, futures: I, f: F) -> Future<A>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    I: IntoIterator<Item = Future<B>>,
    F: Fn(A, B) -> A + Send + Sync + 'static,
{
    reduce_on(&default_executor(), seed, futures, f)
}

pub fn reduce_on<A, B, I, F>(
    executor: &Arc<dyn Executor>,
    seed: Future<A>,
    futures: I,
    f: F,
) -> Future<A>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    I: IntoIterator<Item = Future<B>>,
    F: Fn(A, B) -> A + Send + Sync + 'static,
{
    fold_on(executor, seed, futures, move |acc, item| {
        Future::fulfilled(f(acc, item))
    })
}

/// Collect every value, in order, or the first rejection met along the way.
pub fn all<T, I>(futures: I) -> Future<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    reduce(Future::fulfilled(Vec::new()), futures, |mut values, value| {
        values.push(value);
        values
    })
}
