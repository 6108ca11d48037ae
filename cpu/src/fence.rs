// memory fence and spin-hint helpers
//
// notes:
// - a SeqCst fence joins the single total order of all SeqCst operations;
//   two threads that each store then fence then load cannot both miss the
//   other's store (the store-buffering pattern) - this is what acquire and
//   release alone do not rule out
// - on x86/x86_64 the SeqCst fence lowers to MFENCE; on ARM to DMB ISH

use core::sync::atomic::{fence, Ordering};

// sequentially consistent fence - pairs a flag publication on one thread
// with a flag inspection on another so at least one side observes the other
#[inline(always)]
pub fn fence_seq_cst() {
    fence(Ordering::SeqCst);
}

// cpu spin-loop hint - use inside tight spin-wait loops
// not a memory fence; reduces power and improves smt/ht friendliness
// maps to PAUSE on x86/x86_64
#[inline(always)]
pub fn cpu_pause() {
    core::hint::spin_loop();
}
