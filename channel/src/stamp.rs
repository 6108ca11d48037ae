//! packed ring positions for single-CAS cursor updates.
//!
//! a position on the ring is a (lap, index) pair plus the channel-closed
//! flag. all three are packed into one 64-bit word so a cursor can move in a
//! single atomic compare-and-swap:
//!
//! ```text
//! bits 63..32   index    which slot the cursor points at
//! bit  31       closed   terminal flag (meaningful on the tail only)
//! bits 30..0    lap      traversal counter, modulo 2^31
//! ```
//!
//! laps advance by 2 per full traversal, so tail laps stay even and head
//! laps stay odd. the head starts one lap ahead of the tail; that offset is
//! what distinguishes an empty ring from a full one when the indices
//! coincide.

use std::sync::atomic::{AtomicU64, Ordering};
use strand_cpu::CachePadded;

/// mask selecting the lap out of the 32-bit sequence half.
const LAP_MASK: u32 = (1 << 31) - 1;

/// largest representable lap; laps wrap to 0 past this.
pub(crate) const MAX_LAP: u32 = LAP_MASK;

/// closed flag, stored in the top bit of the sequence half.
const CLOSED_BIT: u32 = 1 << 31;

/// lap addition modulo 2^31.
#[inline(always)]
pub(crate) const fn wrap_add(lap: u32, n: u32) -> u32 {
    lap.wrapping_add(n) & MAX_LAP
}

/// a decoded ring position: lap, slot index, and the closed flag.
///
/// `Stamp` is a plain value; the shared cursors store its packed form in an
/// [`AtomicStamp`]. encode/decode is total: every 64-bit pattern decodes,
/// and round-trips bit-for-bit.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp {
    raw: u64,
}

impl Stamp {
    /// where the tail starts: lap 0 (even), index 0.
    pub(crate) const TAIL_START: Stamp = Stamp::new(0, 0);

    /// where the head starts: lap 1 (odd), index 0 - one lap ahead of the
    /// tail so that a fresh ring reads as empty, not full.
    pub(crate) const HEAD_START: Stamp = Stamp::new(1, 0);

    /// build a stamp from a lap and a slot index.
    #[inline]
    pub(crate) const fn new(lap: u32, index: u32) -> Self {
        Self {
            raw: ((index as u64) << 32) | (lap & LAP_MASK) as u64,
        }
    }

    /// decode a packed word.
    #[inline(always)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self { raw }
    }

    /// the packed word.
    #[inline(always)]
    pub(crate) const fn into_raw(self) -> u64 {
        self.raw
    }

    /// the lap, with the closed bit masked off.
    #[inline(always)]
    pub(crate) const fn lap(self) -> u32 {
        (self.raw as u32) & LAP_MASK
    }

    /// the slot index.
    #[inline(always)]
    pub(crate) const fn index(self) -> u32 {
        (self.raw >> 32) as u32
    }

    /// whether the closed flag is set.
    #[inline(always)]
    pub(crate) const fn is_closed(self) -> bool {
        (self.raw as u32) & CLOSED_BIT != 0
    }

    /// the next position within the same lap.
    ///
    /// only called on the `index + 1 < capacity` branch of the acquire
    /// loops, so the index can never actually wrap; the assertion pins that
    /// down instead of permitting a wrap that would break the
    /// `index < capacity` invariant.
    #[inline]
    pub(crate) fn with_next_index(self) -> Self {
        debug_assert!(self.index() != u32::MAX, "slot index must stay below capacity");
        Self {
            raw: self.raw.wrapping_add(1 << 32),
        }
    }

    /// the first position of the next traversal: index 0, lap advanced by 2
    /// modulo 2^31, closed flag carried over.
    ///
    /// advancing by 2 keeps tail laps even and head laps odd, so producers
    /// and consumers never stamp the same sequence number onto a slot.
    #[inline]
    pub(crate) fn with_next_lap(self) -> Self {
        let closed = (self.raw as u32) & CLOSED_BIT;
        Self::from_raw((wrap_add(self.lap(), 2) | closed) as u64)
    }

    /// the same position with the closed flag set.
    #[inline]
    pub(crate) const fn with_closed(self) -> Self {
        Self {
            raw: self.raw | CLOSED_BIT as u64,
        }
    }
}

impl std::fmt::Debug for Stamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stamp")
            .field("lap", &self.lap())
            .field("index", &self.index())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// a shared cursor holding a packed [`Stamp`].
///
/// cache-padded so the head and tail cursors never share a line.
///
/// memory ordering:
/// - `load()`: acquire - a claim decision based on this value sees every
///   slot publication that preceded the stamp it read
/// - `compare_exchange_weak()`: acqrel on success, acquire on failure
/// - `fetch_close()`: acqrel - the close edge both publishes and observes
pub(crate) struct AtomicStamp {
    raw: CachePadded<AtomicU64>,
}

impl AtomicStamp {
    #[inline]
    pub(crate) const fn new(stamp: Stamp) -> Self {
        Self {
            raw: CachePadded::new(AtomicU64::new(stamp.into_raw())),
        }
    }

    /// current stamp with acquire ordering.
    #[inline(always)]
    pub(crate) fn load(&self) -> Stamp {
        Stamp::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// current stamp with no ordering - for advisory snapshots only.
    #[inline(always)]
    pub(crate) fn load_relaxed(&self) -> Stamp {
        Stamp::from_raw(self.raw.load(Ordering::Relaxed))
    }

    /// try to move the cursor from `current` to `new`.
    ///
    /// weak semantics: may fail spuriously, so callers loop. on failure the
    /// freshly observed stamp is returned for the retry.
    #[inline(always)]
    pub(crate) fn compare_exchange_weak(&self, current: Stamp, new: Stamp) -> Result<Stamp, Stamp> {
        self.raw
            .compare_exchange_weak(
                current.into_raw(),
                new.into_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(Stamp::from_raw)
            .map_err(Stamp::from_raw)
    }

    /// set the closed flag, returning the stamp as it was just before.
    ///
    /// lap and index are untouched, so in-flight claims against the old
    /// stamp still resolve and buffered values stay readable.
    #[inline]
    pub(crate) fn fetch_close(&self) -> Stamp {
        const CLOSED_WORD: u64 = Stamp::new(0, 0).with_closed().into_raw();
        Stamp::from_raw(self.raw.fetch_or(CLOSED_WORD, Ordering::AcqRel))
    }
}

impl std::fmt::Debug for AtomicStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AtomicStamp")
            .field(&self.load_relaxed())
            .finish()
    }
}
