//! E2E Scenario Suite 02: message-queue backpressure.
//!
//! Exercises the queue end-to-end across threads:
//! - Bounded backpressure: four producers against a depth-8 queue with no
//!   consumer; the producer-side count never exceeds the bound while the
//!   queue is blocking, and a nonblock drain recovers every message.
//! - Nonblock wakes waiters: a producer parked on a full queue returns in
//!   bounded time once another thread flips the queue to nonblock.

extern crate workq;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use workq::MsgQueue;

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 5: bounded queue backpressure
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn bounded_backpressure_holds_and_drains_completely() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 100;
    const BOUND: usize = 8;

    let q = Arc::new(MsgQueue::new(BOUND));
    let released = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let q = Arc::clone(&q);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    q.put(p * PER_PRODUCER + i);
                    // Order matters: snapshot the count first.  If the
                    // release flag was still clear afterwards, the queue was
                    // in blocking mode when the snapshot was taken and the
                    // bound must have held.
                    let backlog = q.backlog();
                    if !released.load(Ordering::SeqCst) {
                        assert!(
                            backlog <= BOUND,
                            "bound breached in blocking mode: {backlog}"
                        );
                    }
                }
            })
        })
        .collect();

    // Let the producers pile up against the bound, then release them.
    thread::sleep(Duration::from_millis(100));
    released.store(true, Ordering::SeqCst);
    q.set_nonblock();

    for p in producers {
        p.join().unwrap();
    }

    let mut drained = 0usize;
    while q.get().is_some() {
        drained += 1;
    }
    assert_eq!(drained, PRODUCERS * PER_PRODUCER);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 6: nonblock wakes a parked producer
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn set_nonblock_unparks_full_queue_producer() {
    const BOUND: usize = 4;
    let q = Arc::new(MsgQueue::new(BOUND));
    for i in 0..BOUND {
        q.put(i);
    }

    let producer = {
        let q = Arc::clone(&q);
        thread::spawn(move || q.put(BOUND))
    };

    // Give the producer time to park against the full queue.
    thread::sleep(Duration::from_millis(50));
    q.set_nonblock();

    // Bounded time: join must complete with the message enqueued.
    producer.join().unwrap();
    assert_eq!(q.backlog(), BOUND + 1);
}
