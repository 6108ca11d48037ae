//! multi producer multi consumer (MPMC) bounded channel.
//!
//! a fixed-capacity FIFO safe for any number of concurrent senders and
//! receivers. the ring is a lock-free slot-sequenced queue in the vyukov
//! style: each slot carries an atomic target-lap that serializes producers
//! against producers and consumers against consumers, while a
//! producer/consumer pair working different slots never touch the same
//! cache line.
//!
//! the blocking variants compose the lock-free fast path with per-side
//! parking sets: exhaust the exponential backoff first, then park the OS
//! thread until the opposite side makes progress or the channel closes.
//!
//! # closing
//!
//! closing is explicit ([`Sender::close`] / [`Receiver::close`]) or
//! implicit when the last handle of a side drops. after close every send
//! fails, but receives keep draining buffered values in FIFO order and
//! only fail once the ring is empty.
//!
//! # example
//!
//! ```
//! use strand_channel::mpmc;
//! use std::thread;
//!
//! let (tx, rx) = mpmc::channel::<u64>(128);
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|p| {
//!         let tx = tx.clone();
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 tx.send(p * 100 + i).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//! drop(tx); // the channel closes once the producer threads finish
//!
//! let mut received = 0;
//! while rx.recv().is_ok() {
//!     received += 1;
//! }
//! assert_eq!(received, 400);
//!
//! for handle in producers {
//!     handle.join().unwrap();
//! }
//! ```

mod receiver;
mod sender;
mod shared;

pub use receiver::Receiver;
pub use sender::Sender;

use crate::stamp::wrap_add;
use shared::Shared;
use std::sync::Arc;

/// create a bounded MPMC channel with the given capacity.
///
/// returns a (sender, receiver) pair; clone either handle for more
/// producers or consumers.
///
/// # panics
///
/// panics if `capacity` is zero (or exceeds the 32-bit slot index space).
///
/// # example
///
/// ```
/// use strand_channel::mpmc;
///
/// let (tx, rx) = mpmc::channel::<String>(1024);
/// tx.send(String::from("hi")).unwrap();
/// assert_eq!(rx.recv().unwrap(), "hi");
/// ```
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    channel_with_laps(capacity, 0, 1)
}

/// create a channel with explicit starting laps for the cursors.
///
/// test hook: starting the laps near the 2^31 boundary exercises lap wrap
/// without sending billions of values first. `head_lap` must be one past
/// `tail_lap` modulo 2^31, and `tail_lap` must be even.
pub(crate) fn channel_with_laps<T>(
    capacity: usize,
    tail_lap: u32,
    head_lap: u32,
) -> (Sender<T>, Receiver<T>) {
    debug_assert_eq!(head_lap, wrap_add(tail_lap, 1));

    let shared = Arc::new(Shared::new(capacity, tail_lap, head_lap));
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RecvError, TryRecvError, TrySendError};
    use crate::stamp::MAX_LAP;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_basic_send_recv() {
        let (tx, rx) = channel::<u64>(64);

        tx.send(42).unwrap();
        assert_eq!(rx.recv().unwrap(), 42);
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn test_zero_capacity_panics() {
        let _ = channel::<u64>(0);
    }

    #[test]
    fn test_capacity_one_ping_pong() {
        let (tx, rx) = channel::<u64>(1);

        for i in 0..10 {
            tx.send(i).unwrap();
            assert_eq!(rx.recv().unwrap(), i);
        }
    }

    // property: one producer, one consumer, any capacity - values arrive
    // in the order they were sent
    #[test]
    fn test_fifo_single_pair() {
        let (tx, rx) = channel::<u64>(8);

        let producer = thread::spawn(move || {
            for i in 0..1000 {
                tx.send(i).unwrap();
            }
        });

        for i in 0..1000 {
            assert_eq!(rx.recv().unwrap(), i);
        }
        producer.join().unwrap();
    }

    // scenario S1: fill to capacity, overflow fails, drain in order, then
    // empty
    #[test]
    fn test_fill_then_drain() {
        let (tx, rx) = channel::<u64>(5);

        for i in 0..5 {
            assert!(tx.try_send(i).is_ok());
        }
        match tx.try_send(99) {
            Err(TrySendError::Full(99)) => {}
            other => panic!("expected Full(99), got {:?}", other),
        }

        for i in 0..5 {
            assert_eq!(rx.try_recv().unwrap(), i);
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    // scenario S2: a send blocked on a full ring completes as soon as one
    // receive makes room, and lands behind the buffered values
    #[test]
    fn test_blocked_send_completes_after_recv() {
        let (tx, rx) = channel::<u64>(5);

        for i in 0..5 {
            tx.try_send(i).unwrap();
        }

        let done = Arc::new(AtomicBool::new(false));
        let sender = {
            let tx = tx.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                tx.send(42).unwrap();
                done.store(true, Ordering::Release);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!done.load(Ordering::Acquire), "send returned on a full ring");

        assert_eq!(rx.try_recv().unwrap(), 0);
        sender.join().unwrap();
        assert!(done.load(Ordering::Acquire));

        for expected in [1, 2, 3, 4, 42] {
            assert_eq!(rx.recv().unwrap(), expected);
        }
    }

    // scenario S3: close unblocks every parked sender with a closed error
    #[test]
    fn test_close_unblocks_senders() {
        let (tx, rx) = channel::<u64>(5);

        for i in 0..5 {
            tx.try_send(i).unwrap();
        }

        let done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tx = tx.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let err = tx.send(100 + i).unwrap_err();
                    assert_eq!(err.into_inner(), 100 + i);
                    done.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(done.load(Ordering::Acquire), 0, "a send slipped through");

        assert!(tx.close());
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(done.load(Ordering::Acquire), 8);

        // the five buffered values are still drainable
        for i in 0..5 {
            assert_eq!(rx.recv().unwrap(), i);
        }
        assert_eq!(rx.recv(), Err(RecvError));
    }

    // scenario S4: close unblocks every parked receiver with a closed error
    #[test]
    fn test_close_unblocks_receivers() {
        let (tx, rx) = channel::<u64>(5);

        let done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rx = rx.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    assert_eq!(rx.recv(), Err(RecvError));
                    done.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(done.load(Ordering::Acquire), 0, "a recv returned early");

        assert!(tx.close());
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(done.load(Ordering::Acquire), 8);
    }

    // scenario S5: alternating send/recv walks the ring across several laps
    #[test]
    fn test_multi_lap_ping_pong() {
        let (tx, rx) = channel::<u64>(5);

        for i in 0..14 {
            assert!(tx.try_send(i).is_ok(), "send failed at {}", i);
            assert_eq!(rx.try_recv().unwrap(), i);
        }
    }

    // scenario S6: cursors started at the top of the lap range wrap
    // through 2^31 without confusing empty and full
    #[test]
    fn test_lap_wrap_at_boundary() {
        let (tx, rx) = channel_with_laps::<u64>(5, MAX_LAP - 1, MAX_LAP);

        assert!(tx.is_empty());
        for i in 0..5 {
            assert!(tx.try_send(i).is_ok());
            assert_eq!(tx.len(), i as usize + 1);
        }
        // the tail lap has wrapped past 2^31 here
        assert!(tx.is_full());
        assert!(tx.try_send(99).unwrap_err().is_full());

        for i in 0..5 {
            assert_eq!(rx.try_recv().unwrap(), i);
        }
        // and now the head lap has wrapped too
        assert!(rx.is_empty());
        assert_eq!(rx.len(), 0);

        // the ring keeps working on the far side of the wrap
        for i in 0..12 {
            tx.send(i).unwrap();
            assert_eq!(rx.recv().unwrap(), i);
        }
    }

    // property: the multiset received equals the multiset sent, for any
    // mix of producers and consumers
    #[test]
    fn test_conservation_many_to_many() {
        const PRODUCERS: u64 = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: u64 = 500;

        let (tx, rx) = channel::<u64>(16);
        let received = Arc::new(Mutex::new(Vec::new()));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        tx.send(p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();
        // the channel closes when the last producer thread drops its clone
        drop(tx);

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let rx = rx.clone();
                let received = Arc::clone(&received);
                thread::spawn(move || {
                    let mut local = Vec::new();
                    while let Ok(value) = rx.recv() {
                        local.push(value);
                    }
                    received.lock().unwrap().append(&mut local);
                })
            })
            .collect();

        for handle in producers {
            handle.join().unwrap();
        }
        for handle in consumers {
            handle.join().unwrap();
        }

        let mut all = received.lock().unwrap().clone();
        all.sort_unstable();
        let expected: Vec<u64> = (0..PRODUCERS * PER_PRODUCER).collect();
        assert_eq!(all, expected);
    }

    // property: len() never leaves [0, capacity] while traffic is flowing
    #[test]
    fn test_len_stays_bounded() {
        let (tx, rx) = channel::<u64>(8);
        let observer = tx.clone();

        let producer = thread::spawn(move || {
            for i in 0..2000 {
                tx.send(i).unwrap();
            }
        });
        let consumer = thread::spawn(move || {
            for _ in 0..2000 {
                rx.recv().unwrap();
            }
        });

        for _ in 0..1000 {
            assert!(observer.len() <= observer.capacity());
        }

        producer.join().unwrap();
        consumer.join().unwrap();
    }

    // property: under quiescence the advisory predicates agree with len()
    #[test]
    fn test_empty_full_len_agree_at_rest() {
        let (tx, rx) = channel::<u64>(5);

        assert!(tx.is_empty());
        assert!(!tx.is_full());
        assert_eq!(tx.len(), 0);

        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert!(!rx.is_empty());
        assert!(!rx.is_full());
        assert_eq!(rx.len(), 2);

        for i in 3..=5 {
            tx.try_send(i).unwrap();
        }
        assert!(tx.is_full());
        assert!(!tx.is_empty());
        assert_eq!(tx.len(), 5);
    }

    // property: closed is sticky, close reports first-close only, sends
    // fail after close and receives drain before failing
    #[test]
    fn test_close_is_sticky_and_drains() {
        let (tx, rx) = channel::<u64>(5);

        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();

        assert!(!tx.is_closed());
        assert!(rx.close());
        assert!(!tx.close());
        assert!(tx.is_closed());
        assert!(rx.is_closed());

        match tx.try_send(3) {
            Err(TrySendError::Closed(3)) => {}
            other => panic!("expected Closed(3), got {:?}", other),
        }
        assert_eq!(tx.send(4), Err(crate::error::SendError(4)));

        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
        assert_eq!(rx.recv(), Err(RecvError));
        assert!(tx.is_closed());
    }

    // property: parked receivers are unblocked in registration order
    #[test]
    fn test_parked_receivers_wake_in_order() {
        let (tx, rx) = channel::<u64>(5);
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..10u64)
            .map(|i| {
                let rx = rx.clone();
                let order = Arc::clone(&order);
                let handle = thread::spawn(move || {
                    let value = rx.recv().unwrap();
                    order.lock().unwrap().push((i, value));
                });
                // let receiver i park before spawning i + 1 so registration
                // order matches spawn order
                thread::sleep(Duration::from_millis(50));
                handle
            })
            .collect();

        for value in 0..10u64 {
            tx.send(value).unwrap();
            // wait for the woken receiver to record itself before freeing
            // the next one
            while order.lock().unwrap().len() != value as usize + 1 {
                thread::yield_now();
            }
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let order = order.lock().unwrap();
        for (position, entry) in order.iter().enumerate() {
            assert_eq!(
                *entry,
                (position as u64, position as u64),
                "receiver woken out of registration order"
            );
        }
    }

    #[test]
    fn test_drop_last_sender_closes() {
        let (tx, rx) = channel::<u64>(8);

        tx.send(1).unwrap();
        let tx2 = tx.clone();
        drop(tx);
        assert!(!rx.is_closed(), "closed while a sender clone was alive");

        tx2.send(2).unwrap();
        drop(tx2);

        assert!(rx.is_closed());
        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 2);
        assert_eq!(rx.recv(), Err(RecvError));
    }

    #[test]
    fn test_drop_last_receiver_closes() {
        let (tx, rx) = channel::<u64>(8);

        drop(rx);

        assert!(tx.is_closed());
        assert_eq!(tx.send(1), Err(crate::error::SendError(1)));
    }

    #[test]
    fn test_unread_values_dropped_with_channel() {
        let tracker = Arc::new(());
        {
            let (tx, _rx) = channel::<Arc<()>>(4);
            tx.try_send(Arc::clone(&tracker)).unwrap();
            tx.try_send(Arc::clone(&tracker)).unwrap();
            assert_eq!(Arc::strong_count(&tracker), 3);
        }
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_debug() {
        let (tx, rx) = channel::<u64>(4);
        tx.try_send(9).unwrap();

        let debug = format!("{:?}", tx);
        assert!(debug.contains("Sender"));
        assert!(debug.contains("len: 1"));
        let debug = format!("{:?}", rx);
        assert!(debug.contains("Receiver"));
        assert!(debug.contains("capacity: 4"));
    }
}
