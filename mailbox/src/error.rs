// src/error.rs

use std::fmt;
use std::sync::Arc;

/// A shared, cheaply cloneable failure reason attached to a failed channel.
///
/// Readers that observe a failed channel receive a clone of the `Failure`
/// the writer closed it with.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Failure(Arc<str>);

impl Failure {
  pub fn new(reason: impl Into<String>) -> Self {
    Failure(reason.into().into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl fmt::Debug for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Failure({:?})", &*self.0)
  }
}

impl std::error::Error for Failure {}

// Helper macro for value-carrying errors: into_inner plus Display/Error impls.
macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the rejected value.
            #[inline]
            pub fn into_inner(self) -> $generic_param {
                match self {
                    $( $enum_name::$variant(v) => v, )+
                }
            }
        }

        impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => f.write_str($message), )+
                }
            }
        }

        impl<$generic_param: fmt::Debug> std::error::Error for $enum_name<$generic_param> {}
    };
}

/// Error returned by `try_post` when the value could not be enqueued
/// immediately. The rejected value is always handed back.
#[derive(PartialEq, Eq, Clone)]
pub enum TryPostError<T> {
  /// The channel uses a blocking-bounded policy and the buffer is full.
  Full(T),
  /// The channel has been completed, failed, or lost all readers.
  Closed(T),
}

impl<T> fmt::Debug for TryPostError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryPostError::Full(_) => write!(f, "TryPostError::Full(..)"),
      TryPostError::Closed(_) => write!(f, "TryPostError::Closed(..)"),
    }
  }
}

impl_error_for_enum_with_inner!(
  TryPostError<T>,
  Full("channel full"),
  Closed("channel closed"),
);

/// Valueless form of [`TryPostError`], returned by mailbox posts.
///
/// A mailbox may transform values on their way in, so by the time a
/// rejection surfaces the original value can no longer be handed back.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryPostRejection {
  /// The target uses a blocking-bounded policy and the buffer is full.
  Full,
  Closed,
}
impl std::error::Error for TryPostRejection {}
impl fmt::Display for TryPostRejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryPostRejection::Full => write!(f, "mailbox full"),
      TryPostRejection::Closed => write!(f, "mailbox closed"),
    }
  }
}

/// Error returned by blocking or async `post` operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PostError {
  Closed,
}
impl std::error::Error for PostError {}
impl fmt::Display for PostError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PostError::Closed => write!(f, "channel closed"),
    }
  }
}

/// Error returned by `try_read` when a value could not be dequeued
/// immediately.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TryReadError {
  Empty,
  /// The channel was completed and its buffer has been drained.
  Closed,
  /// The channel was failed; the buffer has been drained.
  Failed(Failure),
}
impl std::error::Error for TryReadError {}
impl fmt::Display for TryReadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryReadError::Empty => write!(f, "channel empty"),
      TryReadError::Closed => write!(f, "channel closed and drained"),
      TryReadError::Failed(failure) => write!(f, "channel failed: {}", failure),
    }
  }
}

/// Error returned by blocking or async `read` operations.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReadError {
  Closed,
  Failed(Failure),
}
impl std::error::Error for ReadError {}
impl fmt::Display for ReadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReadError::Closed => write!(f, "channel closed and drained"),
      ReadError::Failed(failure) => write!(f, "channel failed: {}", failure),
    }
  }
}

/// Error returned by `read_timeout_sync`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReadErrorTimeout {
  /// The timeout elapsed before a value arrived.
  Timeout,
  Closed,
  Failed(Failure),
}
impl std::error::Error for ReadErrorTimeout {}
impl fmt::Display for ReadErrorTimeout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReadErrorTimeout::Timeout => write!(f, "read operation timed out"),
      ReadErrorTimeout::Closed => write!(f, "channel closed and drained"),
      ReadErrorTimeout::Failed(failure) => write!(f, "channel failed: {}", failure),
    }
  }
}

/// Error returned when completing or failing a channel that is already
/// closed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CompleteError;
impl std::error::Error for CompleteError {}
impl fmt::Display for CompleteError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "channel is already closed")
  }
}

/// Error returned by `post` or a second completion on a source whose
/// completion has already been requested.
///
/// Shutdown races are surfaced as this explicit error rather than a silent
/// no-op so callers can detect them in tests.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SourceCompleted;
impl std::error::Error for SourceCompleted {}
impl fmt::Display for SourceCompleted {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "source has already completed")
  }
}

/// Error returned by `try_recv` on a subscription.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
  Empty,
  /// The subscription has drained and closed.
  Closed,
}
impl std::error::Error for TryRecvError {}
impl fmt::Display for TryRecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryRecvError::Empty => write!(f, "subscription empty"),
      TryRecvError::Closed => write!(f, "subscription closed"),
    }
  }
}

/// Error returned by blocking or async `recv` operations on a subscription.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvError {
  Closed,
}
impl std::error::Error for RecvError {}
impl fmt::Display for RecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecvError::Closed => write!(f, "subscription closed"),
    }
  }
}

/// Error returned by `recv_timeout_sync` on a subscription.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvErrorTimeout {
  /// The timeout elapsed before a value arrived.
  Timeout,
  Closed,
}
impl std::error::Error for RecvErrorTimeout {}
impl fmt::Display for RecvErrorTimeout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecvErrorTimeout::Timeout => write!(f, "receive operation timed out"),
      RecvErrorTimeout::Closed => write!(f, "subscription closed"),
    }
  }
}
