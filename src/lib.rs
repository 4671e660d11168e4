//! `workq` — a worker pool for independent short-lived tasks, fed by a
//! dual-headed MPMC FIFO message queue.
//!
//! The crate is a reusable concurrency primitive for embedding in larger
//! servers: callers submit opaque work items, the pool guarantees orderly
//! execution, orderly growth, and orderly shutdown, including shutdown
//! initiated from *inside* one of the pool's own workers.
//!
//! # Crate layout
//!
//! | Module       | Contents |
//! |--------------|----------|
//! | `msgqueue`   | Bounded/unbounded FIFO with separate producer and consumer locks and a nonblock drain mode. |
//! | `threadpool` | Growable worker set consuming tasks from a queue, with cooperative shutdown and a pending-task hook. |
//! | `config`     | Compile-time configuration constants. |
//! | `util`       | Host-environment queries (CPU core counting). |
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use workq::ThreadPool;
//!
//! let pool = ThreadPool::new(4, 0).unwrap();
//! let counter = Arc::new(AtomicUsize::new(0));
//! for _ in 0..100 {
//!     let c = Arc::clone(&counter);
//!     pool.schedule(move || {
//!         c.fetch_add(1, Ordering::Relaxed);
//!     });
//! }
//! pool.tasks_completed();
//! assert_eq!(counter.load(Ordering::Relaxed), 100);
//! pool.shutdown();
//! ```

pub mod config;
pub mod msgqueue;
pub mod threadpool;
pub mod util;

// ── Top-level re-exports ──────────────────────────────────────────────────────
pub use msgqueue::MsgQueue;
pub use threadpool::{PoolError, Task, ThreadPool};
