//! parked-waiter coordination for the blocking operations.
//!
//! each side of the channel owns a [`WaiterQueue`]: a FIFO of single-shot
//! wakeup tokens behind one mutex, with a lock-free non-empty hint so the
//! hot path (nobody parked, which is the common case) never touches the
//! lock. a blocked sender parks in the queue owned by the send side and is
//! woken by a receive that made room; receivers mirror this.
//!
//! the wakeup primitive is latched: setting a token before its owner waits
//! is legal and makes the wait return immediately. that is what closes the
//! window between a waiter's last failed fast-path attempt and its sleep.
//!
//! # protocol
//!
//! a blocking operation that failed its fast path does:
//!
//! 1. [`WaiterQueue::register`] - enqueue a token (`None` means closed)
//! 2. re-check the predicate it is about to sleep on
//! 3. either [`WaiterQueue::cancel`] and retry, or [`WaitToken::wait`]
//!
//! the publisher on the other side stores its slot sequence first and calls
//! [`WaiterQueue::wake_one`] second. two seqcst fences - one after
//! registration, one at the top of `wake_one` - pin the store-buffering
//! case: either the registrant's re-check sees the publication, or the
//! publisher sees the non-empty hint and takes the lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Thread};

use strand_cpu::fence_seq_cst;

/// a latched manual-reset wakeup flag bound to one parked thread.
///
/// `set` may race with or precede `wait`; the flag makes the wakeup stick.
/// the park loop re-checks the flag because `thread::park` may also return
/// spuriously or consume an unrelated unpark.
struct Event {
    set: AtomicBool,
    thread: Thread,
}

impl Event {
    fn wait(&self) {
        while !self.set.load(Ordering::Acquire) {
            thread::park();
        }
    }

    fn set(&self) {
        self.set.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

/// a registration handle for one blocking attempt.
///
/// consumed exactly once on every path out of a blocking operation: by
/// [`wait`](WaitToken::wait), by [`WaiterQueue::cancel`], or implicitly
/// when [`WaiterQueue::close`] wakes it. owned by the stack frame that
/// registered, so it cannot leak past the operation.
pub(crate) struct WaitToken {
    event: Arc<Event>,
}

impl WaitToken {
    /// block the registering thread until the token is woken.
    ///
    /// must run on the thread that called `register`; the token captured
    /// that thread's handle for the unpark.
    pub(crate) fn wait(self) {
        self.event.wait();
    }
}

struct Inner {
    queue: VecDeque<Arc<Event>>,
    closed: bool,
}

/// a closable FIFO of parked waiters.
pub(crate) struct WaiterQueue {
    /// lock-free hint that the FIFO might be non-empty. advisory only:
    /// wakers use it to skip the mutex when nothing is parked, and the
    /// fence pairing (not the hint) carries correctness.
    waiting: AtomicBool,
    inner: Mutex<Inner>,
}

impl WaiterQueue {
    pub(crate) fn new() -> Self {
        Self {
            waiting: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
        }
    }

    /// append a fresh token for the calling thread.
    ///
    /// returns `None` iff the queue is closed. the caller must re-check its
    /// wait predicate after this returns and before sleeping.
    pub(crate) fn register(&self) -> Option<WaitToken> {
        let event = {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return None;
            }
            let event = Arc::new(Event {
                set: AtomicBool::new(false),
                thread: thread::current(),
            });
            inner.queue.push_back(Arc::clone(&event));
            self.waiting.store(true, Ordering::Relaxed);
            event
        };
        // pairs with the fence in wake_one: the predicate re-check that
        // follows this registration cannot be hoisted above it
        fence_seq_cst();
        Some(WaitToken { event })
    }

    /// drop a token out of the FIFO without waking it.
    ///
    /// idempotent: a token already woken or already removed is left alone.
    pub(crate) fn cancel(&self, token: &WaitToken) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner
            .queue
            .iter()
            .position(|event| Arc::ptr_eq(event, &token.event))
        {
            inner.queue.remove(pos);
        }
        if inner.queue.is_empty() {
            self.waiting.store(false, Ordering::Relaxed);
        }
    }

    /// wake the oldest parked waiter, if any.
    ///
    /// double-checked: an empty hint returns without locking. the event is
    /// set after the lock is released so the woken thread never contends on
    /// the mutex it was just popped from.
    pub(crate) fn wake_one(&self) {
        // pairs with the fence in register; see the module docs
        fence_seq_cst();
        if !self.waiting.load(Ordering::Relaxed) {
            return;
        }
        let woken = {
            let mut inner = self.inner.lock().unwrap();
            let event = inner.queue.pop_front();
            if inner.queue.is_empty() {
                self.waiting.store(false, Ordering::Relaxed);
            }
            event
        };
        if let Some(event) = woken {
            event.set();
        }
    }

    /// wake every parked waiter and reject all future registrations.
    pub(crate) fn close(&self) {
        let drained = {
            let mut inner = self.inner.lock().unwrap();
            inner.closed = true;
            self.waiting.store(false, Ordering::Relaxed);
            std::mem::take(&mut inner.queue)
        };
        for event in drained {
            event.set();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_wake_before_wait_is_latched() {
        let queue = WaiterQueue::new();
        let token = queue.register().unwrap();

        queue.wake_one();

        // the wakeup was latched into the token; this returns immediately
        token.wait();
    }

    #[test]
    fn test_cancel_skips_to_next_waiter() {
        let queue = WaiterQueue::new();
        let first = queue.register().unwrap();
        let second = queue.register().unwrap();

        queue.cancel(&first);
        queue.wake_one();

        // the wake went to the second token; a hang here means it went to
        // the canceled one
        second.wait();

        // canceling again (and canceling an already-removed token) is a no-op
        queue.cancel(&first);
    }

    #[test]
    fn test_register_after_close_fails() {
        let queue = WaiterQueue::new();
        queue.close();
        assert!(queue.register().is_none());
    }

    #[test]
    fn test_close_wakes_everyone() {
        let queue = Arc::new(WaiterQueue::new());
        let registered = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let registered = Arc::clone(&registered);
                let released = Arc::clone(&released);
                thread::spawn(move || {
                    let token = queue.register().unwrap();
                    registered.fetch_add(1, Ordering::AcqRel);
                    token.wait();
                    released.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();

        // close only once all four are in the queue
        while registered.load(Ordering::Acquire) != 4 {
            thread::yield_now();
        }
        queue.close();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(released.load(Ordering::Acquire), 4);
    }

    #[test]
    fn test_wake_order_is_fifo() {
        let queue = Arc::new(WaiterQueue::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let turn = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let order = Arc::clone(&order);
                let turn = Arc::clone(&turn);
                thread::spawn(move || {
                    // serialize registration so FIFO position equals i
                    while turn.load(Ordering::Acquire) != i {
                        thread::yield_now();
                    }
                    let token = queue.register().unwrap();
                    turn.store(i + 1, Ordering::Release);
                    token.wait();
                    order.lock().unwrap().push(i);
                })
            })
            .collect();

        while turn.load(Ordering::Acquire) != 10 {
            thread::yield_now();
        }

        // wake one at a time, waiting for each waiter to record itself so
        // the recording order reflects the wake order
        for woken in 1..=10 {
            queue.wake_one();
            while order.lock().unwrap().len() != woken {
                thread::yield_now();
            }
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }
}
