// src/channel/inbox.rs

use super::shared::ChannelShared;
use crate::error::{CompleteError, Failure, PostError, TryPostError};

use core::marker::PhantomPinned;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};

/// The writing half of a channel.
///
/// Cloning an `Inbox` adds another writer to the same channel. The channel
/// completes automatically when the last `Inbox` drops; values buffered up
/// to that point remain readable.
pub struct Inbox<T: Send> {
  pub(crate) shared: Arc<ChannelShared<T>>,
}

impl<T: Send> Inbox<T> {
  /// Attempts to enqueue `value` without blocking.
  ///
  /// Fails with `Full` only under a blocking-bounded policy; sliding
  /// policies evict instead. The rejected value is handed back inside the
  /// error.
  pub fn try_post(&self, value: T) -> Result<(), TryPostError<T>> {
    self.shared.try_post(value)
  }

  /// Enqueues `value`, parking the calling thread while a blocking-bounded
  /// buffer is full.
  pub fn post_sync(&self, value: T) -> Result<(), PostError> {
    self.shared.post_sync(value)
  }

  /// Enqueues `value` asynchronously. The returned future is lazy: nothing
  /// is buffered until it is polled, and dropping it before completion
  /// cancels the post.
  pub fn post_async(&self, value: T) -> PostFuture<'_, T> {
    PostFuture {
      shared: &self.shared,
      value: Some(value),
      _phantom: PhantomPinned,
    }
  }

  /// Completes the channel. Subsequent posts fail; buffered values remain
  /// readable until drained.
  pub fn complete(&self) -> Result<(), CompleteError> {
    self.shared.complete()
  }

  /// Fails the channel. Readers drain the buffer, then observe `failure`.
  pub fn fail(&self, failure: Failure) -> Result<(), CompleteError> {
    self.shared.fail(failure)
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

  pub fn inbox_count(&self) -> usize {
    self.shared.inbox_count.load(Ordering::Relaxed)
  }
}

// --- Future ---

#[must_use = "futures do nothing unless you .await or poll them"]
pub struct PostFuture<'a, T: Send> {
  shared: &'a ChannelShared<T>,
  value: Option<T>,
  _phantom: PhantomPinned,
}

impl<'a, T: Send> Future for PostFuture<'a, T> {
  type Output = Result<(), PostError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = unsafe { self.as_mut().get_unchecked_mut() };
    this.shared.poll_post(cx, &mut this.value)
  }
}

// --- Cloning and Dropping ---

impl<T: Send> Clone for Inbox<T> {
  fn clone(&self) -> Self {
    self.shared.inbox_count.fetch_add(1, Ordering::Relaxed);
    Inbox {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T: Send> Drop for Inbox<T> {
  fn drop(&mut self) {
    if self.shared.inbox_count.fetch_sub(1, Ordering::AcqRel) == 1 {
      // Last writer gone: complete so readers stop after draining.
      let _ = self.shared.complete();
    }
  }
}
