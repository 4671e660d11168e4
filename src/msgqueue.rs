//! Dual-headed MPMC FIFO message queue.
//!
//! Producers and consumers synchronise on *separate* mutexes.  `put` appends
//! to a producer-side list; `get` pops from a consumer-side list; the two
//! sides only meet when the consumer side runs dry, at which point the whole
//! producer list is flipped over to the consumer side in one O(1) exchange.
//! Under steady load producers and consumers therefore almost never contend
//! on the same lock; cross-side contention is limited to the brief flip.
//!
//! The queue is bounded (`maxlen > 0`) or unbounded (`maxlen == 0`).  A
//! bounded queue blocks producers while full; an empty queue blocks
//! consumers.  Switching the queue to *nonblock* mode disables both waits,
//! which is how a shutdown path drains the queue: flip to nonblock, then
//! `get` until `None`.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Condvar, Mutex};

/// FIFO queue with separate producer-side and consumer-side locks.
///
/// All operations take `&self`; share the queue between threads with
/// [`std::sync::Arc`] (or scoped borrows).  Elements put by one thread are
/// delivered in put order; across producers, delivery order is the order in
/// which `put` calls acquired the producer lock.
pub struct MsgQueue<T> {
    /// Soft bound on producer-side messages; `0` means unbounded.
    max: usize,
    /// Consumer-side list.  Mutated only under this lock.
    get_list: Mutex<VecDeque<T>>,
    /// Producer-side list plus the nonblock flag.
    put_side: Mutex<PutSide<T>>,
    /// Consumers park here (with `put_side` held) until a message arrives.
    get_cond: Condvar,
    /// Producers park here (with `put_side` held) while the queue is full.
    put_cond: Condvar,
}

struct PutSide<T> {
    list: VecDeque<T>,
    nonblock: bool,
}

impl<T> MsgQueue<T> {
    /// Creates a queue holding at most `maxlen` undelivered messages on the
    /// producer side, in blocking mode.
    ///
    /// `maxlen == 0` means unbounded: `put` never blocks.
    pub fn new(maxlen: usize) -> Self {
        MsgQueue {
            max: maxlen,
            get_list: Mutex::new(VecDeque::new()),
            put_side: Mutex::new(PutSide {
                list: VecDeque::new(),
                nonblock: false,
            }),
            get_cond: Condvar::new(),
            put_cond: Condvar::new(),
        }
    }

    /// Appends `msg` to the queue.
    ///
    /// On a bounded queue in blocking mode this waits until the producer-side
    /// backlog falls below the bound.  In nonblock mode the bound is not
    /// enforced and the message is appended immediately.
    pub fn put(&self, msg: T) {
        let mut put = self.put_side.lock().unwrap();
        while self.max != 0 && put.list.len() >= self.max && !put.nonblock {
            put = self.put_cond.wait(put).unwrap();
        }
        put.list.push_back(msg);
        drop(put);
        self.get_cond.notify_one();
    }

    /// Removes and returns the oldest message.
    ///
    /// In blocking mode this waits until a message is available.  Returns
    /// `None` only when the queue is empty *and* in nonblock mode: the
    /// end-of-stream signal a drain loop terminates on.
    pub fn get(&self) -> Option<T> {
        let mut get_list = self.get_list.lock().unwrap();
        if let Some(msg) = get_list.pop_front() {
            return Some(msg);
        }
        if self.swap(&mut get_list) > 0 {
            get_list.pop_front()
        } else {
            None
        }
    }

    /// Flips the producer list onto the empty consumer side and returns the
    /// number of messages moved.
    ///
    /// Called with the consumer lock held; nests the producer lock inside it,
    /// fixing the lock order as get-side before put-side.  No other path
    /// nests.  Waiting on `get_cond` releases only the producer lock; the
    /// consumer lock stays held, so at most one consumer runs the flip while
    /// the rest queue up behind it.
    fn swap(&self, get_list: &mut VecDeque<T>) -> usize {
        debug_assert!(get_list.is_empty());
        let mut put = self.put_side.lock().unwrap();
        while put.list.is_empty() && !put.nonblock {
            put = self.get_cond.wait(put).unwrap();
        }
        let cnt = put.list.len();
        if self.max != 0 && cnt >= self.max {
            // The queue was full, so producers may be parked; the flip is
            // about to empty the producer side for them.
            self.put_cond.notify_all();
        }
        // Exchange the buffers: the producer list becomes the consumer list,
        // and the producer side inherits the drained (but still allocated)
        // consumer buffer.
        mem::swap(get_list, &mut put.list);
        cnt
    }

    /// Switches the queue to nonblock mode and wakes every parked thread.
    ///
    /// Takes only the producer lock: a consumer parked in the flip holds the
    /// consumer lock while it waits, so it must be woken, not waited on.
    /// Woken threads re-evaluate their predicates and fall through.
    pub fn set_nonblock(&self) {
        let mut put = self.put_side.lock().unwrap();
        put.nonblock = true;
        self.get_cond.notify_all();
        self.put_cond.notify_all();
    }

    /// Restores blocking mode.
    pub fn set_block(&self) {
        let mut put = self.put_side.lock().unwrap();
        put.nonblock = false;
    }

    /// Number of messages accumulated on the producer side since the last
    /// flip.
    ///
    /// This is the count the bound applies to; it drops to zero whenever a
    /// consumer flips the lists, even while flipped messages are still
    /// waiting to be delivered.
    pub fn backlog(&self) -> usize {
        self.put_side.lock().unwrap().list.len()
    }
}
