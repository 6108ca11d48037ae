//! sender side of the MPMC channel.

use super::shared::Shared;
use crate::common::Backoff;
use crate::error::{SendError, TrySendError};
use crate::stamp::wrap_add;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// outcome of one pass over the producer acquire state machine.
enum WriteClaim {
    /// slot `index` is exclusively ours; stamp `publish_lap` after writing.
    Slot { index: u32, publish_lap: u32 },
    /// the previous lap's reader has not consumed this slot yet.
    Full,
    /// the channel is closed.
    Closed,
}

/// sending handle for an MPMC channel.
///
/// cloneable; any number of threads may send concurrently through their own
/// clones. all operations take `&self`.
///
/// dropping the last `Sender` closes the channel, waking blocked receivers
/// once the buffered values are drained. [`close`](Sender::close) does the
/// same eagerly.
///
/// # example
///
/// ```
/// use strand_channel::mpmc;
/// use std::thread;
///
/// let (tx, rx) = mpmc::channel::<u64>(64);
///
/// let tx2 = tx.clone();
/// let handle = thread::spawn(move || {
///     tx2.send(7).unwrap();
/// });
///
/// assert_eq!(rx.recv().unwrap(), 7);
/// handle.join().unwrap();
/// ```
pub struct Sender<T> {
    pub(super) shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// race for a writable slot at the current tail.
    ///
    /// resolves CAS losses (spin and retry with the stamp the CAS
    /// returned) and mid-publication slots (spin-or-yield until the other
    /// producer stamps the slot) internally; only `Full` and `Closed` are
    /// surfaced to the caller.
    fn claim(&self, backoff: &mut Backoff) -> WriteClaim {
        let shared = &self.shared;
        let mut tail = shared.tail.load();

        loop {
            if tail.is_closed() {
                return WriteClaim::Closed;
            }

            let slot_lap = shared.buffer.slot(tail.index()).lap();

            if tail.lap() == slot_lap {
                // the slot is writable at our lap; race the other producers
                // for it by advancing the tail past it
                let next = if tail.index() + 1 < shared.buffer.capacity() {
                    tail.with_next_index()
                } else {
                    tail.with_next_lap()
                };

                match shared.tail.compare_exchange_weak(tail, next) {
                    Ok(_) => {
                        return WriteClaim::Slot {
                            index: tail.index(),
                            publish_lap: wrap_add(tail.lap(), 1),
                        };
                    }
                    Err(actual) => {
                        tail = actual;
                        backoff.spin();
                    }
                }
            } else if tail.lap() == wrap_add(slot_lap, 1) {
                // our lap is one ahead of the slot: the previous lap's
                // value is still in it, so the ring is full
                return WriteClaim::Full;
            } else {
                // a producer claimed this slot but has not published yet;
                // wait for the stamp to move
                backoff.snooze();
                tail = shared.tail.load();
            }
        }
    }

    /// write into a claimed slot, stamp it readable, wake one receiver.
    fn commit(&self, index: u32, publish_lap: u32, value: T) {
        let slot = self.shared.buffer.slot(index);
        // safety: the tail CAS in claim() granted exclusive ownership of
        // this slot until the stamp below hands it to the matching reader
        unsafe { slot.write(value) };
        slot.publish(publish_lap);
        self.shared.recv_waiters.wake_one();
    }

    /// send without blocking.
    ///
    /// retries a full ring under backoff before giving up, so a
    /// briefly-contended full reads as success rather than a failure.
    ///
    /// # errors
    ///
    /// - [`TrySendError::Full`] if no slot freed up within the backoff
    ///   window; the value comes back for a later retry
    /// - [`TrySendError::Closed`] if the channel is closed
    ///
    /// # example
    ///
    /// ```
    /// use strand_channel::mpmc;
    ///
    /// let (tx, _rx) = mpmc::channel::<u64>(1);
    /// assert!(tx.try_send(1).is_ok());
    /// assert!(tx.try_send(2).unwrap_err().is_full());
    /// ```
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut backoff = Backoff::new();

        loop {
            match self.claim(&mut backoff) {
                WriteClaim::Slot { index, publish_lap } => {
                    self.commit(index, publish_lap, value);
                    return Ok(());
                }
                WriteClaim::Closed => return Err(TrySendError::Closed(value)),
                WriteClaim::Full => {
                    if backoff.is_completed() {
                        return Err(TrySendError::Full(value));
                    }
                    backoff.snooze();
                }
            }
        }
    }

    /// send, blocking while the channel is full.
    ///
    /// parks the calling thread once backoff is exhausted; a receive that
    /// makes room wakes parked senders in registration order.
    ///
    /// # errors
    ///
    /// returns `SendError` with the value if the channel is closed before
    /// delivery.
    pub fn send(&self, mut value: T) -> Result<(), SendError<T>> {
        loop {
            match self.try_send(value) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Closed(v)) => return Err(SendError(v)),
                Err(TrySendError::Full(v)) => value = v,
            }

            let Some(token) = self.shared.send_waiters.register() else {
                // registration is only refused after close
                return Err(SendError(value));
            };

            // re-check between registration and sleep: a receive that made
            // room (or a close) before we enqueued would otherwise be a
            // lost wakeup
            if self.shared.is_closed() {
                self.shared.send_waiters.cancel(&token);
                return Err(SendError(value));
            }
            if !self.shared.is_full() {
                self.shared.send_waiters.cancel(&token);
                continue;
            }

            token.wait();
        }
    }

    /// number of values currently buffered. lock-free snapshot.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// advisory: no values were buffered at the instant of the check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    /// advisory: every slot was occupied at the instant of the check.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.shared.is_full()
    }

    /// whether the channel has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// close the channel.
    ///
    /// returns `true` for the first close, `false` thereafter. all parked
    /// senders and receivers are woken; subsequent sends fail and receives
    /// drain whatever is still buffered before failing.
    pub fn close(&self) -> bool {
        self.shared.close()
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            // last sender gone: nothing new can arrive, so close and let
            // receivers drain what is left
            self.shared.close();
        }
    }
}

impl<T> core::fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("mpmc::Sender")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
