//! Compile-time configuration constants for `workq`.
//!
//! These constants govern defaults for pool sizing and queue bounding.
//! They are deliberately plain `const`s: embedders that want runtime
//! tuning read their own configuration and pass explicit values to
//! [`crate::ThreadPool::new`] and [`crate::MsgQueue::new`].

/// Queue bound meaning "unbounded": producers never block.
///
/// The pool's internal task queue is created with this bound, so
/// [`crate::ThreadPool::schedule`] never blocks the submitter.
pub const MSG_MAX_UNBOUNDED: usize = 0;

/// Default number of workers for callers that do not size the pool
/// themselves.
///
/// A fixed small default rather than the core count: worker pools of this
/// kind typically run short blocking tasks, and embedders that care size
/// the pool via [`crate::util::count_cores`].
pub const NB_WORKERS_DEFAULT: usize = 4;

/// Default per-worker stack hint, in bytes.
///
/// `0` defers to the platform default stack size
/// (see [`std::thread::Builder::stack_size`] for the override path).
pub const STACK_SIZE_DEFAULT: usize = 0;
