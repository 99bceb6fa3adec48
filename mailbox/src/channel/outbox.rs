// src/channel/outbox.rs

use super::shared::ChannelShared;
use crate::error::{ReadError, ReadErrorTimeout, TryReadError};

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// The reading half of a channel.
///
/// Cloning an `Outbox` adds a competing reader: each buffered value is
/// delivered to exactly one of them. When the last `Outbox` drops the
/// channel closes and discards whatever is still buffered.
pub struct Outbox<T: Send> {
  pub(crate) shared: Arc<ChannelShared<T>>,
}

impl<T: Send> Outbox<T> {
  /// Attempts to dequeue a value without blocking.
  pub fn try_read(&self) -> Result<T, TryReadError> {
    self.shared.try_read()
  }

  /// Dequeues a value, parking the calling thread while the buffer is
  /// empty and the channel is open.
  pub fn read_sync(&self) -> Result<T, ReadError> {
    self.shared.read_sync()
  }

  /// Like `read_sync`, but gives up with `Timeout` once `timeout` elapses.
  pub fn read_timeout_sync(&self, timeout: Duration) -> Result<T, ReadErrorTimeout> {
    self.shared.read_timeout_sync(timeout)
  }

  /// Dequeues a value asynchronously.
  pub fn read_async(&self) -> ReadFuture<'_, T> {
    ReadFuture { shared: &self.shared }
  }

  pub fn is_closed(&self) -> bool {
    self.shared.is_closed()
  }

  pub fn len(&self) -> usize {
    self.shared.len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.len() == 0
  }

  /// Buffer capacity, or `None` for unbounded channels.
  pub fn capacity(&self) -> Option<usize> {
    self.shared.capacity()
  }

  pub fn outbox_count(&self) -> usize {
    self.shared.outbox_count.load(Ordering::Relaxed)
  }
}

// --- Future ---

#[must_use = "futures do nothing unless you .await or poll them"]
pub struct ReadFuture<'a, T: Send> {
  shared: &'a ChannelShared<T>,
}

impl<'a, T: Send> Future for ReadFuture<'a, T> {
  type Output = Result<T, ReadError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.shared.poll_read(cx)
  }
}

// --- Stream ---

impl<T: Send> futures_core::Stream for Outbox<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    match self.shared.poll_read(cx) {
      Poll::Ready(Ok(value)) => Poll::Ready(Some(value)),
      // Completion and failure both end the stream.
      Poll::Ready(Err(_)) => Poll::Ready(None),
      Poll::Pending => Poll::Pending,
    }
  }
}

// --- Cloning and Dropping ---

impl<T: Send> Clone for Outbox<T> {
  fn clone(&self) -> Self {
    self.shared.outbox_count.fetch_add(1, Ordering::Relaxed);
    Outbox {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T: Send> Drop for Outbox<T> {
  fn drop(&mut self) {
    if self.shared.outbox_count.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.shared.close_after_last_outbox();
    }
  }
}
