//! E2E Scenario Suite 01: worker-pool lifecycle.
//!
//! Exercises the pool end-to-end through the public API:
//! - Fan-out counting: 10 000 tasks across 4 workers all run exactly once.
//! - Shutdown with backlog: a slow single worker and an immediate shutdown;
//!   every task either ran or reached the pending hook, never both, never
//!   neither.
//! - Self-destruction: a task shuts down the pool it is running in.
//! - Dynamic growth: workers added mid-flight drain queued tasks while the
//!   original worker is still occupied.

extern crate workq;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use workq::ThreadPool;

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 1: fan-out counting
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn fan_out_counting() {
    const N: usize = 10_000;
    let pool = ThreadPool::new(4, 0).expect("spawn workers");
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..N {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
    }

    pool.tasks_completed();
    assert_eq!(counter.load(Ordering::SeqCst), N);
    pool.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 2: shutdown with backlog
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn shutdown_with_backlog_accounts_for_every_task() {
    const N: usize = 100;
    let pool = ThreadPool::new(1, 0).expect("spawn worker");
    let ran = Arc::new(AtomicUsize::new(0));

    // The first task signals once it is on the worker, so the shutdown below
    // is guaranteed to land while the backlog is still mostly queued.
    let (started_tx, started_rx) = bounded(1);
    {
        let r = Arc::clone(&ran);
        pool.schedule(move || {
            started_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(20));
            r.fetch_add(1, Ordering::SeqCst);
        });
    }
    for _ in 1..N {
        let r = Arc::clone(&ran);
        pool.schedule(move || {
            std::thread::sleep(Duration::from_millis(20));
            r.fetch_add(1, Ordering::SeqCst);
        });
    }

    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first task started");

    let mut pending = 0usize;
    pool.shutdown_with(|_task| pending += 1);

    let k = ran.load(Ordering::SeqCst);
    assert!(k >= 1, "the in-flight task must have finished");
    assert!(k < N, "shutdown should have cut the backlog short");
    assert_eq!(k + pending, N, "each task ran once or was delivered once");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 3: self-destruction
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn self_destruction_from_a_worker_task() {
    let pool = ThreadPool::new(3, 0).expect("spawn workers");

    // The handle travels into a task over a channel; the task then tears the
    // pool down from inside one of its own workers.
    let (handle_tx, handle_rx) = bounded::<ThreadPool>(1);
    let (done_tx, done_rx) = bounded(1);
    pool.schedule(move || {
        let pool = handle_rx.recv().unwrap();
        assert!(pool.in_pool(), "the destroying task runs on a pool worker");
        pool.shutdown();
        // Reaching this point means shutdown returned cleanly with the two
        // sibling workers joined.
        done_tx.send(()).unwrap();
    });
    handle_tx.send(pool).unwrap();

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("in-pool shutdown completed");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 4: dynamic growth
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn growth_drains_quick_tasks_past_an_occupied_worker() {
    let pool = ThreadPool::new(1, 0).expect("spawn worker");

    let (started_tx, started_rx) = bounded(1);
    let (release_tx, release_rx) = bounded::<()>(1);
    let long_ran = Arc::new(AtomicUsize::new(0));
    {
        let l = Arc::clone(&long_ran);
        pool.schedule(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            l.fetch_add(1, Ordering::SeqCst);
        });
    }
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("long task occupies the original worker");

    for _ in 0..4 {
        pool.increase().expect("grow pool");
    }
    assert_eq!(pool.num_workers(), 5);

    let quick = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
        let q = Arc::clone(&quick);
        pool.schedule(move || {
            q.fetch_add(1, Ordering::SeqCst);
        });
    }

    // The quick tasks must complete while the long task still holds its gate.
    let deadline = Instant::now() + Duration::from_secs(5);
    while quick.load(Ordering::SeqCst) < 4 {
        assert!(
            Instant::now() < deadline,
            "quick tasks waited behind the long task"
        );
        std::thread::yield_now();
    }
    assert_eq!(long_ran.load(Ordering::SeqCst), 0);

    release_tx.send(()).unwrap();
    pool.tasks_completed();
    assert_eq!(long_ran.load(Ordering::SeqCst), 1);
    pool.shutdown();
}
