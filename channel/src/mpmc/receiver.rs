//! receiver side of the MPMC channel.

use super::shared::Shared;
use crate::common::Backoff;
use crate::error::{RecvError, TryRecvError};
use crate::stamp::wrap_add;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// outcome of one pass over the consumer acquire state machine.
enum ReadClaim {
    /// slot `index` holds a value for us; stamp `publish_lap` after taking it.
    Slot { index: u32, publish_lap: u32 },
    /// this lap's write has not happened yet.
    Empty,
}

/// receiving handle for an MPMC channel.
///
/// cloneable; any number of threads may receive concurrently through their
/// own clones. values are delivered in ring order: each one goes to exactly
/// one receiver.
///
/// dropping the last `Receiver` closes the channel, so blocked and future
/// sends fail fast instead of waiting on a reader that no longer exists.
///
/// # example
///
/// ```
/// use strand_channel::mpmc;
///
/// let (tx, rx) = mpmc::channel::<&str>(8);
/// tx.send("ping").unwrap();
///
/// assert_eq!(rx.recv().unwrap(), "ping");
/// assert!(rx.try_recv().unwrap_err().is_empty());
/// ```
pub struct Receiver<T> {
    pub(super) shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// race for a readable slot at the current head.
    ///
    /// mirror image of the producer's claim: CAS losses spin and retry,
    /// mid-publication slots snooze until stamped, and only `Empty` is
    /// surfaced. the head never carries the closed flag, so close is
    /// invisible here; callers combine `Empty` with the tail's flag.
    fn claim(&self, backoff: &mut Backoff) -> ReadClaim {
        let shared = &self.shared;
        let mut head = shared.head.load();

        loop {
            let slot_lap = shared.buffer.slot(head.index()).lap();

            if head.lap() == slot_lap {
                // the slot holds a value published for our lap; race the
                // other receivers for it
                let next = if head.index() + 1 < shared.buffer.capacity() {
                    head.with_next_index()
                } else {
                    head.with_next_lap()
                };

                match shared.head.compare_exchange_weak(head, next) {
                    Ok(_) => {
                        return ReadClaim::Slot {
                            index: head.index(),
                            publish_lap: wrap_add(head.lap(), 1),
                        };
                    }
                    Err(actual) => {
                        head = actual;
                        backoff.spin();
                    }
                }
            } else if head.lap() == wrap_add(slot_lap, 1) {
                // the slot still shows the write-eligible lap: nothing has
                // been produced here this lap
                return ReadClaim::Empty;
            } else {
                // a receiver claimed this slot but has not released it yet
                backoff.snooze();
                head = shared.head.load();
            }
        }
    }

    /// move the value out of a claimed slot, hand the slot to the next
    /// lap's writer, wake one sender.
    fn take(&self, index: u32, publish_lap: u32) -> T {
        let slot = self.shared.buffer.slot(index);
        // safety: the head CAS in claim() granted exclusive ownership, and
        // the matching producer's publication made the value visible.
        // moving it out empties the cell before the stamp below lets the
        // next writer in.
        let value = unsafe { slot.read() };
        slot.publish(publish_lap);
        self.shared.send_waiters.wake_one();
        value
    }

    /// receive without blocking.
    ///
    /// retries an empty ring under backoff before giving up. a closed
    /// channel keeps delivering until the buffer is drained; only then does
    /// it report `Closed`.
    ///
    /// # errors
    ///
    /// - [`TryRecvError::Empty`] if nothing arrived within the backoff
    ///   window
    /// - [`TryRecvError::Closed`] if the channel is closed and drained
    ///
    /// # example
    ///
    /// ```
    /// use strand_channel::mpmc;
    ///
    /// let (tx, rx) = mpmc::channel::<u64>(4);
    /// tx.send(5).unwrap();
    /// tx.close();
    ///
    /// // buffered values survive the close
    /// assert_eq!(rx.try_recv().unwrap(), 5);
    /// assert!(rx.try_recv().unwrap_err().is_closed());
    /// ```
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut backoff = Backoff::new();

        loop {
            match self.claim(&mut backoff) {
                ReadClaim::Slot { index, publish_lap } => {
                    return Ok(self.take(index, publish_lap));
                }
                ReadClaim::Empty => {
                    if self.shared.is_closed() {
                        // the cursors, not the slot stamp, decide the drain:
                        // a sender that won its tail CAS just before the
                        // close still owes the ring a value, and the
                        // advanced tail is the only trace of it until the
                        // publication lands
                        if self.shared.is_empty() {
                            return Err(TryRecvError::Closed);
                        }
                        backoff.snooze();
                        continue;
                    }
                    if backoff.is_completed() {
                        return Err(TryRecvError::Empty);
                    }
                    backoff.snooze();
                }
            }
        }
    }

    /// receive, blocking while the channel is empty.
    ///
    /// parks the calling thread once backoff is exhausted; a send wakes
    /// parked receivers in registration order.
    ///
    /// # errors
    ///
    /// returns `RecvError` once the channel is closed *and* every buffered
    /// value has been delivered.
    pub fn recv(&self) -> Result<T, RecvError> {
        loop {
            match self.try_recv() {
                Ok(value) => return Ok(value),
                Err(TryRecvError::Closed) => return Err(RecvError),
                Err(TryRecvError::Empty) => {}
            }

            let Some(token) = self.shared.recv_waiters.register() else {
                // the queue refuses registrations only after close; loop so
                // the drain check in try_recv settles closed-vs-value
                continue;
            };

            // re-check between registration and sleep: a send (or close)
            // that landed before we enqueued would otherwise be a lost
            // wakeup
            if !self.shared.is_empty() || self.shared.is_closed() {
                self.shared.recv_waiters.cancel(&token);
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

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.shared.receivers.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        if self.shared.receivers.fetch_sub(1, Ordering::AcqRel) == 1 {
            // last receiver gone: senders would block forever, fail them
            // fast instead
            self.shared.close();
        }
    }
}

impl<T> core::fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("mpmc::Receiver")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
