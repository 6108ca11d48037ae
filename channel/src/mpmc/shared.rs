//! shared state between MPMC senders and receivers.

use crate::park::WaiterQueue;
use crate::ringbuffer::RingBuffer;
use crate::stamp::{wrap_add, AtomicStamp, Stamp};
use std::sync::atomic::AtomicUsize;
use strand_cpu::CachePadded;

/// state shared by every handle of one channel.
pub(super) struct Shared<T> {
    /// the slot array holding in-flight values.
    pub(super) buffer: RingBuffer<T>,
    /// producer cursor; its closed bit is the channel-closed flag.
    pub(super) tail: AtomicStamp,
    /// consumer cursor, one lap ahead of the tail when the ring is empty.
    pub(super) head: AtomicStamp,
    /// senders parked on a full ring, woken by receives.
    pub(super) send_waiters: WaiterQueue,
    /// receivers parked on an empty ring, woken by sends.
    pub(super) recv_waiters: WaiterQueue,
    /// live sender handles.
    pub(super) senders: CachePadded<AtomicUsize>,
    /// live receiver handles.
    pub(super) receivers: CachePadded<AtomicUsize>,
}

impl<T> Shared<T> {
    /// build channel state with explicit starting laps.
    ///
    /// the regular constructor passes lap 0 / lap 1; tests pass laps near
    /// the 2^31 boundary to exercise wrap. the head must start exactly one
    /// lap ahead of the tail.
    pub(super) fn new(capacity: usize, tail_lap: u32, head_lap: u32) -> Self {
        debug_assert!(tail_lap & 1 == 0, "tail laps are even");
        debug_assert_eq!(head_lap, wrap_add(tail_lap, 1), "head starts one lap ahead");

        Self {
            buffer: RingBuffer::new(capacity, tail_lap),
            tail: AtomicStamp::new(Stamp::new(tail_lap, 0)),
            head: AtomicStamp::new(Stamp::new(head_lap, 0)),
            send_waiters: WaiterQueue::new(),
            recv_waiters: WaiterQueue::new(),
            senders: CachePadded::new(AtomicUsize::new(1)),
            receivers: CachePadded::new(AtomicUsize::new(1)),
        }
    }

    #[inline]
    pub(super) fn capacity(&self) -> usize {
        self.buffer.capacity() as usize
    }

    /// wait-free length snapshot.
    ///
    /// reads tail, head, tail again and retries until the two tail reads
    /// agree, so the head was observed inside one tail epoch. when the
    /// indices coincide the lap relation disambiguates empty from full:
    /// the head one lap ahead means empty, one lap behind means full.
    pub(super) fn len(&self) -> usize {
        loop {
            let tail = self.tail.load();
            let head = self.head.load();
            if self.tail.load() != tail {
                continue;
            }

            let head_index = head.index() as usize;
            let tail_index = tail.index() as usize;

            return if head_index < tail_index {
                tail_index - head_index
            } else if head_index > tail_index {
                self.capacity() - head_index + tail_index
            } else if head.lap() == wrap_add(tail.lap(), 1) {
                0
            } else {
                self.capacity()
            };
        }
    }

    /// advisory emptiness check.
    ///
    /// a true result is a correct historical observation but may be stale
    /// by the time the caller acts on it.
    #[inline]
    pub(super) fn is_empty(&self) -> bool {
        let tail = self.tail.load();
        let head = self.head.load();
        head.index() == tail.index() && head.lap() == wrap_add(tail.lap(), 1)
    }

    /// advisory fullness check; same staleness caveat as [`is_empty`].
    ///
    /// [`is_empty`]: Shared::is_empty
    #[inline]
    pub(super) fn is_full(&self) -> bool {
        let tail = self.tail.load();
        let head = self.head.load();
        head.index() == tail.index() && wrap_add(head.lap(), 1) == tail.lap()
    }

    #[inline]
    pub(super) fn is_closed(&self) -> bool {
        self.tail.load_relaxed().is_closed()
    }

    /// close the channel.
    ///
    /// sets the tail's closed bit and, on the first close only, shuts both
    /// parking sets (wake all, reject future registrations). slot state is
    /// untouched, which is what keeps buffered values drainable after
    /// close.
    pub(super) fn close(&self) -> bool {
        if self.tail.fetch_close().is_closed() {
            return false;
        }
        self.send_waiters.close();
        self.recv_waiters.close();
        true
    }
}
