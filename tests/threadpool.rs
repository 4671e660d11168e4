// Behavioural tests for the worker pool (threadpool.rs)
//
// Coverage:
//   - new spawns the requested number of workers; num_workers reports it
//   - a zero-worker pool is constructible; shutdown delivers every task pending
//   - schedule executes the submitted task exactly once
//   - every scheduled task runs when the pool drains before shutdown
//   - tasks run concurrently across workers
//   - tasks_completed returns immediately when idle and is reusable
//   - in_pool distinguishes worker threads from outsiders and other pools
//   - increase adds workers that pick up queued tasks
//   - shutdown_with hands unrun tasks to the pending hook
//   - shutdown from inside a worker tears the pool down cleanly
//   - dropping the handle waits for the in-flight task

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use crossbeam_channel::bounded;
use workq::ThreadPool;

// ─────────────────────────────────────────────────────────────────────────────
// Construction and worker counting
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn new_spawns_requested_workers() {
    let pool = ThreadPool::new(3, 0).expect("spawn workers");
    assert_eq!(pool.num_workers(), 3);
    pool.shutdown();
}

#[test]
fn zero_worker_pool_delivers_everything_pending() {
    let pool = ThreadPool::new(0, 0).expect("empty pool");
    assert_eq!(pool.num_workers(), 0);

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }

    let mut pending = 0;
    pool.shutdown_with(|_task| pending += 1);
    assert_eq!(pending, 3, "no worker existed to run anything");
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn new_with_stack_hint_is_usable() {
    // 1 MiB explicit stacks; behaviourally identical to the default.
    let pool = ThreadPool::new(2, 1 << 20).expect("spawn with stack hint");
    let counter = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&counter);
    pool.schedule(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    pool.tasks_completed();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    pool.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduling and execution
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn schedule_executes_task_exactly_once() {
    let pool = ThreadPool::new(1, 0).expect("spawn worker");
    let counter = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&counter);
    pool.schedule(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    pool.tasks_completed();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    pool.shutdown();
}

#[test]
fn all_scheduled_tasks_run() {
    const N: usize = 200;
    let pool = ThreadPool::new(4, 0).expect("spawn workers");
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..N {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }

    pool.tasks_completed();
    assert_eq!(counter.load(Ordering::SeqCst), N);
    pool.shutdown();
}

#[test]
fn tasks_run_concurrently_across_workers() {
    // All four tasks rendezvous at a barrier; a pool running them serially
    // would deadlock here.
    const N: usize = 4;
    let pool = ThreadPool::new(N, 0).expect("spawn workers");
    let barrier = Arc::new(Barrier::new(N));
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..N {
        let b = Arc::clone(&barrier);
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            b.wait();
            c.fetch_add(1, Ordering::SeqCst);
        });
    }

    pool.tasks_completed();
    assert_eq!(counter.load(Ordering::SeqCst), N);
    pool.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// tasks_completed — barrier semantics
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn tasks_completed_returns_immediately_when_idle() {
    let pool = ThreadPool::new(2, 0).expect("spawn workers");
    pool.tasks_completed();
    pool.shutdown();
}

#[test]
fn tasks_completed_is_reusable() {
    let pool = ThreadPool::new(2, 0).expect("spawn workers");
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.tasks_completed();
    assert_eq!(counter.load(Ordering::SeqCst), 4);

    // The pool must still accept and drain a second batch.
    for _ in 0..4 {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.tasks_completed();
    assert_eq!(counter.load(Ordering::SeqCst), 8);
    pool.shutdown();
}

#[test]
fn tasks_completed_waits_for_slow_task() {
    let pool = ThreadPool::new(1, 0).expect("spawn worker");
    let flag = Arc::new(AtomicUsize::new(0));

    let f = Arc::clone(&flag);
    pool.schedule(move || {
        std::thread::sleep(Duration::from_millis(50));
        f.store(1, Ordering::SeqCst);
    });

    pool.tasks_completed();
    assert_eq!(flag.load(Ordering::SeqCst), 1);
    pool.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// in_pool — worker identity
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn in_pool_is_false_on_the_calling_thread() {
    let pool = ThreadPool::new(2, 0).expect("spawn workers");
    assert!(!pool.in_pool());
    pool.shutdown();
}

#[test]
fn in_pool_is_true_inside_a_worker() {
    let pool = ThreadPool::new(2, 0).expect("spawn workers");

    // Hand the handle into a task and get it back out, recording what the
    // worker saw.
    let (handle_tx, handle_rx) = bounded::<ThreadPool>(1);
    let (back_tx, back_rx) = bounded(1);
    pool.schedule(move || {
        let pool = handle_rx.recv().unwrap();
        let inside = pool.in_pool();
        back_tx.send((pool, inside)).unwrap();
    });
    handle_tx.send(pool).unwrap();

    let (pool, inside) = back_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker returned the handle");
    assert!(inside, "a worker must identify its own pool");
    assert!(!pool.in_pool(), "back on the caller thread");
    pool.shutdown();
}

#[test]
fn in_pool_is_false_for_a_different_pool() {
    let pool_a = ThreadPool::new(1, 0).expect("spawn pool a");
    let pool_b = ThreadPool::new(1, 0).expect("spawn pool b");

    let (handle_tx, handle_rx) = bounded::<ThreadPool>(1);
    let (back_tx, back_rx) = bounded(1);
    // A worker of pool B checks membership against pool A's handle.
    pool_b.schedule(move || {
        let pool_a = handle_rx.recv().unwrap();
        let inside = pool_a.in_pool();
        back_tx.send((pool_a, inside)).unwrap();
    });
    handle_tx.send(pool_a).unwrap();

    let (pool_a, inside) = back_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker returned the handle");
    assert!(!inside, "membership must not leak across pools");
    pool_a.shutdown();
    pool_b.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// increase — dynamic growth
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn increase_adds_workers_that_pick_up_queued_tasks() {
    let pool = ThreadPool::new(1, 0).expect("spawn worker");

    // Occupy the only worker with a gated task.
    let (started_tx, started_rx) = bounded(1);
    let (release_tx, release_rx) = bounded::<()>(1);
    pool.schedule(move || {
        started_tx.send(()).unwrap();
        release_rx.recv().unwrap();
    });
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("long task started");

    pool.increase().expect("grow pool");
    pool.increase().expect("grow pool");
    assert_eq!(pool.num_workers(), 3);

    // The new workers must drain these while the original is still occupied.
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while counter.load(Ordering::SeqCst) < 2 {
        assert!(
            std::time::Instant::now() < deadline,
            "quick tasks starved behind the occupied worker"
        );
        std::thread::yield_now();
    }

    release_tx.send(()).unwrap();
    pool.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown — pending delivery, in-pool shutdown, Drop
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn shutdown_with_delivers_unrun_tasks() {
    let pool = ThreadPool::new(1, 0).expect("spawn worker");
    let counter = Arc::new(AtomicUsize::new(0));

    // Keep the worker busy long enough for shutdown to land first.
    let (started_tx, started_rx) = bounded(1);
    {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            started_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(100));
            c.fetch_add(1, Ordering::SeqCst);
        });
    }
    for _ in 0..5 {
        let c = Arc::clone(&counter);
        pool.schedule(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first task started");

    let mut pending = 0;
    pool.shutdown_with(|_task| pending += 1);

    let ran = counter.load(Ordering::SeqCst);
    assert!(ran >= 1, "the in-flight task must finish");
    assert_eq!(ran + pending, 6, "every task ran or reached the hook");
}

#[test]
fn shutdown_from_inside_a_worker() {
    let pool = ThreadPool::new(3, 0).expect("spawn workers");

    let (handle_tx, handle_rx) = bounded::<ThreadPool>(1);
    let (done_tx, done_rx) = bounded(1);
    pool.schedule(move || {
        let pool = handle_rx.recv().unwrap();
        assert!(pool.in_pool());
        pool.shutdown();
        done_tx.send(()).unwrap();
    });
    handle_tx.send(pool).unwrap();

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("in-pool shutdown returned");
}

#[test]
fn drop_waits_for_in_flight_task() {
    let flag = Arc::new(AtomicUsize::new(0));
    let (started_tx, started_rx) = bounded(1);

    {
        let pool = ThreadPool::new(1, 0).expect("spawn worker");
        let f = Arc::clone(&flag);
        pool.schedule(move || {
            started_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(50));
            f.store(1, Ordering::SeqCst);
        });
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("task started");
        // pool drops here without an explicit shutdown
    }

    assert_eq!(flag.load(Ordering::SeqCst), 1, "drop joined the worker");
}
