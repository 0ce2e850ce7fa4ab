//! Executors run the continuation work of futures.
//!
//! Nothing in this crate owns a thread. Every observer callback is handed to an
//! [`Executor`], either one passed explicitly to an `_on` method or the process-wide
//! default returned by [`default_executor`].
use std::fmt;
use std::io;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::thread;

use futures::executor::ThreadPool;
use log::{error, warn};

use crate::error::catch_panic;

/// A zero-argument unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Accepts jobs and runs each of them eventually.
///
/// Implementations are expected to run jobs asynchronously relative to the caller and
/// to keep FIFO order for jobs submitted from one thread when they can.
///
/// Any `Fn(Job)` closure is an executor:
///
/// ```
/// use promise_future::{Executor, Future, Job};
/// use std::sync::Arc;
/// use std::thread;
///
/// let spawner: Arc<dyn Executor> = Arc::new(|job: Job| {
///     thread::spawn(job);
/// });
/// let doubled = Future::fulfilled(21).map_on(&spawner, |v| Ok(v * 2));
/// assert_eq!(doubled.wait().unwrap(), 42);
/// ```
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

impl<F> Executor for F
where
    F: Fn(Job) + Send + Sync,
{
    fn execute(&self, job: Job) {
        self(job)
    }
}

/// Runs jobs on a `futures` thread pool.
#[derive(Clone)]
pub struct ThreadPoolExecutor {
    pool: ThreadPool,
}

impl ThreadPoolExecutor {
    /// A pool with one worker per CPU.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            pool: ThreadPool::builder()
                .name_prefix("promise-future-")
                .create()?,
        })
    }

    pub fn with_size(size: usize) -> io::Result<Self> {
        Ok(Self {
            pool: ThreadPool::builder()
                .pool_size(size)
                .name_prefix("promise-future-")
                .create()?,
        })
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, job: Job) {
        self.pool.spawn_ok(async move { guarded(job) });
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor").finish_non_exhaustive()
    }
}

/// Runs jobs one at a time, in submission order, on a single dedicated thread.
///
/// The worker exits once the executor has been dropped and its queue is drained.
///
/// ```
/// use promise_future::{Executor, SerialExecutor};
/// use std::sync::mpsc::channel;
///
/// let serial = SerialExecutor::new("worker").unwrap();
/// let (tx, rx) = channel();
/// for i in 0..3 {
///     let tx = tx.clone();
///     serial.execute(Box::new(move || tx.send(i).unwrap()));
/// }
/// assert_eq!(rx.iter().take(3).collect::<Vec<_>>(), vec![0, 1, 2]);
/// ```
#[derive(Debug)]
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Sender<Job>>,
}

impl SerialExecutor {
    pub fn new(name: &str) -> io::Result<Self> {
        let (sender, receiver) = channel::<Job>();
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                for job in receiver {
                    guarded(job);
                }
            })?;
        Ok(Self {
            name: name.to_owned(),
            sender: Mutex::new(sender),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Executor for SerialExecutor {
    fn execute(&self, job: Job) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if sender.send(job).is_err() {
            error!("serial executor {:?} has no worker, dropping job", self.name);
        }
    }
}

/// Spawns a new thread for every job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        if let Err(err) = thread::Builder::new().spawn(move || guarded(job)) {
            error!("failed to spawn executor thread: {}", err);
        }
    }
}

/// Runs each job on the submitting thread before `execute` returns.
///
/// Kept inside the crate for wakeups and blocking waits: chaining combinators on it
/// would nest every resolution on the caller's stack.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn execute(&self, job: Job) {
        guarded(job)
    }
}

pub(crate) fn immediate() -> Arc<dyn Executor> {
    Arc::new(ImmediateExecutor)
}

// A panicking job must not take its worker thread down with it.
fn guarded(job: Job) {
    if let Err(err) = catch_panic(job) {
        error!("executor job failed: {}", err);
    }
}

fn default_slot() -> &'static RwLock<Arc<dyn Executor>> {
    static DEFAULT: OnceLock<RwLock<Arc<dyn Executor>>> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        let executor: Arc<dyn Executor> = match ThreadPoolExecutor::new() {
            Ok(pool) => Arc::new(pool),
            Err(err) => {
                warn!("could not start default thread pool ({}), spawning threads instead", err);
                Arc::new(ThreadExecutor)
            }
        };
        RwLock::new(executor)
    })
}

/// The executor used by every operation that is not given one explicitly.
pub fn default_executor() -> Arc<dyn Executor> {
    default_slot()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the process-wide default executor, returning the previous one.
///
/// Operations read the default when they are called, so futures created earlier
/// pick up the new executor for combinators attached afterwards.
pub fn set_default_executor(executor: Arc<dyn Executor>) -> Arc<dyn Executor> {
    let mut slot = default_slot()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, executor)
}
