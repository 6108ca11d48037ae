//! error types for channel operations.
//!
//! the taxonomy is deliberately small. *closed* is the only failure a
//! blocking operation can report; *full* and *empty* are expected outcomes
//! of the non-blocking variants, not faults. failed sends hand the value
//! back to the caller so nothing is lost on the error path.
//!
//! # error types
//!
//! - [`SendError`]: blocking send on a closed channel
//! - [`TrySendError`]: non-blocking send on a full or closed channel
//! - [`RecvError`]: blocking receive on a closed and drained channel
//! - [`TryRecvError`]: non-blocking receive on an empty or closed channel
//!
//! all four implement [`std::error::Error`], so callers that prefer
//! aborting convert with the usual machinery (`?` into a wrapper error, or
//! `unwrap` at the edge).

use core::fmt;

/// error returned when a blocking send fails.
///
/// the channel was closed before the value could be delivered. the value
/// comes back inside the error.
///
/// # example
///
/// ```
/// use strand_channel::error::SendError;
///
/// let err: SendError<String> = SendError(String::from("hello"));
/// let recovered: String = err.into_inner();
/// assert_eq!(recovered, "hello");
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// consume the error and recover the undelivered value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError").field("value", &self.0).finish()
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sending on a closed channel")
    }
}

impl<T: fmt::Debug> std::error::Error for SendError<T> {}

/// error returned when a non-blocking send fails.
///
/// - [`Full`](TrySendError::Full): no slot freed up within the backoff
///   window; the send can be retried
/// - [`Closed`](TrySendError::Closed): the channel is closed; no send will
///   ever succeed again
///
/// both variants return the undelivered value.
///
/// # example
///
/// ```
/// use strand_channel::error::TrySendError;
///
/// let err: TrySendError<i32> = TrySendError::Full(42);
/// assert!(err.is_full());
/// assert!(!err.is_closed());
/// assert_eq!(err.into_inner(), 42);
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TrySendError<T> {
    /// every slot was occupied for the whole backoff window.
    Full(T),

    /// the channel is closed; the failure is permanent.
    Closed(T),
}

impl<T> TrySendError<T> {
    /// returns `true` if this error is the `Full` variant.
    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }

    /// returns `true` if this error is the `Closed` variant.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, TrySendError::Closed(_))
    }

    /// consume the error and recover the undelivered value.
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(value) | TrySendError::Closed(value) => value,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(value) => f.debug_tuple("Full").field(value).finish(),
            TrySendError::Closed(value) => f.debug_tuple("Closed").field(value).finish(),
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => write!(f, "sending on a full channel"),
            TrySendError::Closed(_) => write!(f, "sending on a closed channel"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TrySendError<T> {}

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(err: SendError<T>) -> Self {
        TrySendError::Closed(err.0)
    }
}

/// error returned when a blocking receive fails.
///
/// the channel is closed and every value it held has been drained.
///
/// # example
///
/// ```
/// use strand_channel::error::RecvError;
///
/// assert_eq!(format!("{}", RecvError), "receiving on a closed channel");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvError;

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiving on a closed channel")
    }
}

impl std::error::Error for RecvError {}

/// error returned when a non-blocking receive fails.
///
/// - [`Empty`](TryRecvError::Empty): nothing arrived within the backoff
///   window; more values may land later
/// - [`Closed`](TryRecvError::Closed): the channel is closed and drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// no value was available for the whole backoff window.
    Empty,

    /// the channel is closed and holds no more values.
    Closed,
}

impl TryRecvError {
    /// returns `true` if this error is the `Empty` variant.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, TryRecvError::Empty)
    }

    /// returns `true` if this error is the `Closed` variant.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, TryRecvError::Closed)
    }
}

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryRecvError::Empty => write!(f, "receiving on an empty channel"),
            TryRecvError::Closed => write!(f, "receiving on a closed channel"),
        }
    }
}

impl std::error::Error for TryRecvError {}

impl From<RecvError> for TryRecvError {
    fn from(_: RecvError) -> Self {
        TryRecvError::Closed
    }
}
