//! Growable worker pool executing opaque tasks from a [`MsgQueue`].
//!
//! A pool owns a set of long-running OS worker threads fed by an unbounded
//! message queue.  Callers submit closures with [`ThreadPool::schedule`];
//! any idle worker picks them up.  The pool can grow one worker at a time
//! with [`ThreadPool::increase`], and it shuts down cooperatively: the queue
//! is switched to nonblock, workers finish their current task and leave, and
//! every undispatched task is handed to a caller-supplied pending hook.
//!
//! Shutdown may be initiated from *inside* a worker: a task that owns the
//! pool handle (received, say, over a channel) may call
//! [`ThreadPool::shutdown`] on the pool it is running in.  The call joins
//! every other worker, drains the queue, and returns; the calling worker is
//! detached and finalises the shared state when it leaves.

use std::cell::Cell;
use std::error::Error;
use std::fmt;
use std::io;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::config;
use crate::msgqueue::MsgQueue;

/// A unit of work: a closure invoked at most once on some worker thread.
///
/// The closure carries its own context by capture; the pool never inspects
/// it.  A task that is still queued when the pool shuts down is delivered,
/// unexecuted, to the pending hook of [`ThreadPool::shutdown_with`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors surfaced by pool construction and growth.
#[derive(Debug)]
pub enum PoolError {
    /// The OS could not create a worker thread.  Carries the underlying
    /// error for callers to inspect.
    Spawn(io::Error),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}

impl Error for PoolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PoolError::Spawn(e) => Some(e),
        }
    }
}

thread_local! {
    /// Address of the shared state of the pool this thread works for.
    /// Zero outside workers.  Written once at worker startup, cleared when
    /// the worker leaves; only ever compared, never dereferenced.
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// Handle to a worker pool.
///
/// The handle is the pool's owner: dropping it (or calling
/// [`shutdown`](ThreadPool::shutdown)) terminates and joins the workers.
/// Because shutdown consumes the handle, scheduling onto an already-shut
/// pool is a compile error, not a runtime one.
pub struct ThreadPool {
    /// `Some` from construction until shutdown (or `Drop`) takes it.
    shared: Option<Arc<PoolShared>>,
}

struct PoolShared {
    queue: MsgQueue<Task>,
    state: Mutex<PoolState>,
    /// Set once termination begins.  Workers poll it between tasks; tasks
    /// still queued afterwards are delivered to the pending hook.
    terminating: AtomicBool,
    /// Tasks scheduled but not yet finished, for [`ThreadPool::tasks_completed`].
    /// Incremented before the enqueue so the barrier cannot observe zero
    /// between submission and execution start.
    pending: Mutex<usize>,
    pending_cond: Condvar,
    /// Per-worker stack hint in bytes; `0` means the platform default.
    stacksize: usize,
}

struct PoolState {
    /// Workers spawned and not yet exited.
    nthreads: usize,
    /// Join handles of all live workers, harvested by the terminate
    /// protocol.
    workers: Vec<JoinHandle<()>>,
    /// Monotonic counter naming worker threads.
    next_worker_id: usize,
}

impl ThreadPool {
    /// Creates a pool and starts `nthreads` workers immediately.
    ///
    /// `stacksize` is a per-worker stack hint in bytes; `0` selects the
    /// platform default.  If any spawn fails after some workers already
    /// started, the started workers are terminated and reaped before the
    /// error is returned.
    pub fn new(nthreads: usize, stacksize: usize) -> Result<Self, PoolError> {
        let shared = Arc::new(PoolShared {
            queue: MsgQueue::new(config::MSG_MAX_UNBOUNDED),
            state: Mutex::new(PoolState {
                nthreads: 0,
                workers: Vec::with_capacity(nthreads),
                next_worker_id: 0,
            }),
            terminating: AtomicBool::new(false),
            pending: Mutex::new(0),
            pending_cond: Condvar::new(),
            stacksize,
        });
        for _ in 0..nthreads {
            if let Err(e) = spawn_worker(&shared) {
                terminate(&shared, false, None);
                return Err(e);
            }
        }
        Ok(ThreadPool {
            shared: Some(shared),
        })
    }

    /// Submits a task for execution on any worker.
    ///
    /// Never blocks: the internal queue is unbounded.  A task still queued
    /// when the pool shuts down is delivered to the pending hook instead of
    /// running.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = self.shared();
        *shared.pending.lock().unwrap() += 1;
        shared.queue.put(Box::new(job));
    }

    /// Blocks until every scheduled task has finished.
    ///
    /// Does not shut the pool down; more tasks may be submitted afterwards
    /// and the barrier may be used again.  On a pool with no workers this
    /// waits until workers are added and catch up.
    pub fn tasks_completed(&self) {
        let shared = self.shared();
        let mut pending = shared.pending.lock().unwrap();
        while *pending > 0 {
            pending = shared.pending_cond.wait(pending).unwrap();
        }
    }

    /// Starts one additional worker.
    ///
    /// The spawn happens under the pool lock, so a concurrent observer never
    /// sees a worker count that excludes a thread already running.  On
    /// failure the pool is unchanged.
    pub fn increase(&self) -> Result<(), PoolError> {
        spawn_worker(self.shared())
    }

    /// Returns `true` iff the calling thread is a worker of this pool.
    pub fn in_pool(&self) -> bool {
        current_thread_in(self.shared())
    }

    /// Number of workers currently owned by the pool.
    pub fn num_workers(&self) -> usize {
        self.shared().state.lock().unwrap().nthreads
    }

    /// Shuts the pool down, discarding any still-queued tasks.
    ///
    /// Equivalent to [`shutdown_with`](ThreadPool::shutdown_with) with a
    /// hook that drops each task (dropping an unexecuted task drops its
    /// captured context).
    pub fn shutdown(self) {
        self.shutdown_with(drop);
    }

    /// Shuts the pool down, delivering every undispatched task to `pending`.
    ///
    /// Workers finish the task they are running, stop taking new ones, and
    /// exit; each is joined exactly once.  Afterwards the queue is drained
    /// and `pending` is invoked once per task that never ran.  The call may
    /// be made from inside one of the pool's own workers (the handle having
    /// reached the task by channel or similar); in that case the calling
    /// worker is detached rather than joined, and the shared state is
    /// released when that worker leaves.
    pub fn shutdown_with<F>(mut self, mut pending: F)
    where
        F: FnMut(Task),
    {
        let shared = self.shared.take().expect("pool handle already shut down");
        let in_pool = current_thread_in(&shared);
        terminate(&shared, in_pool, Some(&mut pending));
    }

    fn shared(&self) -> &Arc<PoolShared> {
        // `Some` from construction until shutdown consumes the handle, and
        // shutdown is the only taker.
        self.shared.as_ref().expect("pool handle already shut down")
    }
}

impl Drop for ThreadPool {
    /// Dropping an un-shut-down handle terminates the pool and silently
    /// discards queued tasks.
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let in_pool = current_thread_in(&shared);
            terminate(&shared, in_pool, None);
        }
    }
}

fn current_thread_in(shared: &Arc<PoolShared>) -> bool {
    CURRENT_POOL.with(|slot| slot.get()) == Arc::as_ptr(shared) as usize
}

/// Spawns one worker under the pool lock.
fn spawn_worker(shared: &Arc<PoolShared>) -> Result<(), PoolError> {
    let mut state = shared.state.lock().unwrap();
    let id = state.next_worker_id;
    let mut builder = thread::Builder::new().name(format!("workq-worker-{id}"));
    if shared.stacksize > 0 {
        builder = builder.stack_size(shared.stacksize);
    }
    let worker_shared = Arc::clone(shared);
    let handle = builder
        .spawn(move || worker_main(worker_shared))
        .map_err(PoolError::Spawn)?;
    state.next_worker_id = id + 1;
    state.nthreads += 1;
    state.workers.push(handle);
    Ok(())
}

/// Worker thread body: consume tasks until termination or end-of-stream.
fn worker_main(shared: Arc<PoolShared>) {
    CURRENT_POOL.with(|slot| slot.set(Arc::as_ptr(&shared) as usize));
    loop {
        if shared.terminating.load(Ordering::Acquire) {
            break;
        }
        let task = match shared.queue.get() {
            Some(task) => task,
            None => break,
        };
        task();
        finish_task(&shared);
        if shared.terminating.load(Ordering::Acquire)
            && shared.state.lock().unwrap().nthreads == 0
        {
            // The task we just ran owned the handle and tore the pool down
            // from inside.  It already counted this worker out and nobody
            // will join it: leave without touching the exit bookkeeping.
            CURRENT_POOL.with(|slot| slot.set(0));
            return;
        }
    }
    shared.state.lock().unwrap().nthreads -= 1;
    CURRENT_POOL.with(|slot| slot.set(0));
}

/// Marks one task finished and wakes barrier waiters when none remain.
fn finish_task(shared: &PoolShared) {
    let mut pending = shared.pending.lock().unwrap();
    *pending -= 1;
    if *pending == 0 {
        shared.pending_cond.notify_all();
    }
}

/// Terminate protocol, shared by external shutdown, in-pool shutdown and the
/// partial-construction rollback in `new`.
///
/// Flips the queue to nonblock so no worker parks again, collects every join
/// handle, joins them (detaching the caller's own in the in-pool case), then
/// drains the queue through the pending hook.
fn terminate(shared: &Arc<PoolShared>, in_pool: bool, mut pending: Option<&mut dyn FnMut(Task)>) {
    let workers = {
        let mut state = shared.state.lock().unwrap();
        shared.queue.set_nonblock();
        shared.terminating.store(true, Ordering::Release);
        if in_pool {
            // The calling worker is mid-task and will never run its own
            // exit path; count it out here.
            state.nthreads -= 1;
        }
        mem::take(&mut state.workers)
    };

    let self_id = thread::current().id();
    for handle in workers {
        if in_pool && handle.thread().id() == self_id {
            // Our own handle: dropping it detaches the thread.
            drop(handle);
        } else {
            // A task panic unwinds its worker; the join error carries the
            // payload, which is the task's business, not the pool's.
            let _ = handle.join();
        }
    }

    // Workers are gone and the queue is nonblock: everything left never ran.
    while let Some(task) = shared.queue.get() {
        match pending.as_mut() {
            Some(hook) => hook(task),
            None => drop(task),
        }
    }
}
