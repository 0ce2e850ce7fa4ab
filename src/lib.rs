//! Single-assignment futures, their promise writers, and combinators.
//!
//! A [`Future`] holds a value that becomes available exactly once. Its paired
//! [`Promise`] is the only thing that can set it. Interested parties register
//! observers, which run on an [`Executor`] once the result is known, or build new
//! futures from old ones with combinators such as [`Future::and_then`],
//! [`Future::zip`] and [`reduce`].
//!
//! ```
//! use promise_future::{pair, reduce, Future};
//! use std::thread;
//!
//! let (promise, future) = pair();
//! thread::spawn(move || promise.fulfill(10));
//!
//! let chained = future
//!     .and_then(|v| Future::fulfilled(v + 10))
//!     .map(|v| Ok(v + 5));
//! assert_eq!(chained.wait().unwrap(), 25);
//!
//! let total = reduce(Future::fulfilled(0), (1..=10).map(Future::fulfilled), |a, b| a + b);
//! assert_eq!(total.wait().unwrap(), 55);
//! ```
//!
//! Failures travel as [`Error`] and pass unchanged through every combinator except
//! [`Future::recover`] and [`Future::recover_value`]. Panics raised by callbacks are
//! caught and turned into rejections.
mod combinators;
mod error;
pub mod executor;
mod future;
mod promise;
mod spawn;
mod wait;

pub use combinators::{all, fold, fold_on, reduce, reduce_on, Continuation};
pub use error::{Error, Result};
pub use executor::{
    default_executor, set_default_executor, Executor, Job, SerialExecutor, ThreadExecutor,
    ThreadPoolExecutor,
};
pub use future::{Future, ObserverHandle};
pub use promise::{pair, Promise};
pub use spawn::{from_callback, spawn, spawn_on, Completion};
pub use wait::Waiter;
