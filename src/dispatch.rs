//! Capability to run blocking handler jobs off the asynchronous scheduler.
//!
//! The adapter never decides by itself where the blocking handler runs. It
//! is handed a [`Dispatch`] and gives every request's job to it. Any
//! closure `Fn(Job) -> io::Result<()>` is a `Dispatch`, which makes it easy
//! to hand jobs to the blocking pool of whichever runtime drives the server:
//!
//! ```
//! use blockbridge::dispatch::Job;
//! use std::io;
//!
//! let dispatch = |job: Job| -> io::Result<()> {
//!     std::thread::spawn(job);
//!     Ok(())
//! };
//! # let _ = dispatch;
//! ```
//!
//! A dispatch must never run the job inline on the thread that drives the
//! request future. The job blocks while waiting for body data that only
//! that future can deliver.
//!
//! [`Dispatch`]: trait.Dispatch.html

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

/// A unit of blocking work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs on some execution unit that is allowed to block.
///
/// Implementations are shared by all in-flight requests and must accept
/// concurrent calls.
pub trait Dispatch: Send + Sync {
    /// Start running `job`. Errors if the job can't be accepted.
    fn dispatch(&self, job: Job) -> io::Result<()>;
}

impl<F> Dispatch for F
where
    F: Fn(Job) -> io::Result<()> + Send + Sync,
{
    fn dispatch(&self, job: Job) -> io::Result<()> {
        self(job)
    }
}

/// Runs each job on a newly spawned thread.
#[derive(Debug, Clone)]
pub struct ThreadPerRequest {
    name: String,
}

impl ThreadPerRequest {
    /// Create a dispatcher with default thread name.
    pub fn new() -> Self {
        ThreadPerRequest {
            name: "blockbridge-handler".to_string(),
        }
    }

    /// Name given to spawned threads.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl Default for ThreadPerRequest {
    fn default() -> Self {
        ThreadPerRequest::new()
    }
}

impl Dispatch for ThreadPerRequest {
    fn dispatch(&self, job: Job) -> io::Result<()> {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(job)
            .map(|_| ())
    }
}

/// A fixed size pool of worker threads.
///
/// Jobs queue up when all workers are busy. Clones share the same pool,
/// and the threads are joined when the last clone is dropped.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Start a pool with `size` worker threads.
    pub fn new(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Worker pool needs at least one thread",
            ));
        }

        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(size);

        for i in 0..size {
            let rx = rx.clone();

            let handle = thread::Builder::new()
                .name(format!("blockbridge-worker-{}", i))
                .spawn(move || worker_loop(rx))?;

            workers.push(handle);
        }

        debug!("Worker pool started with {} threads", size);

        Ok(WorkerPool {
            inner: Arc::new(PoolInner {
                tx: Mutex::new(Some(tx)),
                workers,
            }),
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.inner.workers.len()
    }
}

fn worker_loop(rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let next = {
            let lock = rx.lock().unwrap();
            lock.recv()
        };

        match next {
            Ok(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("Worker job panicked");
                }
            }
            // All senders gone, pool is shutting down.
            Err(_) => break,
        }
    }

    trace!("Worker exits");
}

impl Dispatch for WorkerPool {
    fn dispatch(&self, job: Job) -> io::Result<()> {
        let lock = self.inner.tx.lock().unwrap();

        let sent = match lock.as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        };

        if sent {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "Worker pool is shut down",
            ))
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // closing the queue makes every idle worker exit.
        self.tx.lock().unwrap().take();

        let current = thread::current().id();

        for handle in self.workers.drain(..) {
            // a job holding the last clone can't join its own thread.
            if handle.thread().id() == current {
                continue;
            }
            handle.join().ok();
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerPool {{ size: {} }}", self.size())
    }
}
