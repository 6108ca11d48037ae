//! bounded lock-free MPMC channel with blocking and non-blocking operations.
//!
//! this crate provides a fixed-capacity, first-in-first-out channel safe for
//! any number of concurrent producer and consumer threads.
//!
//! # features
//!
//! - pre-allocated slot-sequenced ring buffer (no allocation in the hot path)
//! - lock-free fast path for send and receive; single-CAS cursor updates
//! - blocking variants that park the OS thread behind an exponential backoff
//! - explicit close that unblocks every waiter; buffered values stay
//!   drainable after close
//! - lock-free length and emptiness/fullness snapshots
//! - cache-line padding to prevent false sharing between the cursors
//!
//! # example
//!
//! ```
//! use strand_channel::mpmc;
//! use std::thread;
//!
//! // create a channel with a 1024-slot buffer
//! let (tx, rx) = mpmc::channel::<u64>(1024);
//!
//! // producer thread
//! let producer = thread::spawn(move || {
//!     for i in 0..1000 {
//!         tx.send(i).unwrap();
//!     }
//! });
//!
//! // consumer
//! for i in 0..1000 {
//!     assert_eq!(rx.recv().unwrap(), i);
//! }
//! producer.join().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod mpmc;

mod park;
mod ringbuffer;
mod stamp;

pub(crate) mod common;

pub use error::{RecvError, SendError, TryRecvError, TrySendError};
pub use mpmc::{channel, Receiver, Sender};
