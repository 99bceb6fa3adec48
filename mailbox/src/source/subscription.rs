// src/source/subscription.rs

use super::shared::SourceShared;
use crate::error::{RecvError, RecvErrorTimeout, TryRecvError};
use crate::internal::waiter::Waiter;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

/// Delivery states. A subscriber accepts fan-out until the source begins
/// draining, then consumes its private buffer down to empty and closes.
enum SubscriptionState {
  Accepting,
  Draining,
  Closed,
}

struct SubscriptionInternal<T> {
  buffer: VecDeque<T>,
  state: SubscriptionState,
  /// The single consumer's parked thread or task. Last registration wins.
  waiter: Option<Waiter>,
}

/// The per-subscriber half the worker delivers into.
pub(crate) struct SubscriptionShared<T> {
  internal: Mutex<SubscriptionInternal<T>>,
}

impl<T> SubscriptionShared<T> {
  pub(crate) fn new() -> Self {
    SubscriptionShared {
      internal: Mutex::new(SubscriptionInternal {
        buffer: VecDeque::new(),
        state: SubscriptionState::Accepting,
        waiter: None,
      }),
    }
  }

  /// Worker-only: appends a value if the subscriber still accepts.
  pub(crate) fn deliver(&self, value: T) {
    let waiter = {
      let mut internal = self.internal.lock();
      if !matches!(internal.state, SubscriptionState::Accepting) {
        return;
      }
      internal.buffer.push_back(value);
      internal.waiter.take()
    };
    if let Some(waiter) = waiter {
      waiter.wake();
    }
  }

  /// Worker-only: stops further deliveries. Returns `true` when the
  /// subscriber had nothing buffered and closed on the spot, in which case
  /// the caller retires it from the registry.
  pub(crate) fn begin_draining(&self) -> bool {
    let (closed_now, waiter) = {
      let mut internal = self.internal.lock();
      match internal.state {
        SubscriptionState::Accepting => {
          if internal.buffer.is_empty() {
            internal.state = SubscriptionState::Closed;
            (true, internal.waiter.take())
          } else {
            internal.state = SubscriptionState::Draining;
            (false, internal.waiter.take())
          }
        }
        _ => (false, None),
      }
    };
    if let Some(waiter) = waiter {
      waiter.wake();
    }
    closed_now
  }

  /// Closes a subscription that lost the race with completion, discarding
  /// anything delivered in the window.
  pub(crate) fn close_now(&self) {
    let mut internal = self.internal.lock();
    internal.state = SubscriptionState::Closed;
    internal.buffer.clear();
  }
}

/// One step of a receive attempt, taken under the subscription lock.
enum Step<T> {
  Value(T),
  /// The subscription just transitioned to closed; the caller retires it.
  ClosedNow,
  AlreadyClosed,
  /// Still accepting with an empty buffer; a waiter was registered if one
  /// was supplied.
  Waiting,
}

/// A private, ordered view of one source's broadcast.
///
/// Every subscription receives every value the source fans out after it
/// subscribed, in the order the source processed them. Values already
/// buffered remain readable after the source completes; once the buffer
/// drains the subscription closes and removes itself from the source.
///
/// Dropping a subscription unsubscribes it and discards anything still
/// buffered.
pub struct Subscription<T: Send> {
  pub(crate) shared: Arc<SubscriptionShared<T>>,
  pub(crate) source: Arc<SourceShared<T>>,
  pub(crate) id: u64,
}

impl<T: Send> Subscription<T> {
  fn step(&self, register: Option<Waiter>) -> Step<T> {
    let mut internal = self.shared.internal.lock();
    if let Some(value) = internal.buffer.pop_front() {
      return Step::Value(value);
    }
    match internal.state {
      SubscriptionState::Accepting => {
        if let Some(waiter) = register {
          internal.waiter = Some(waiter);
        }
        Step::Waiting
      }
      SubscriptionState::Draining => {
        internal.state = SubscriptionState::Closed;
        Step::ClosedNow
      }
      SubscriptionState::Closed => Step::AlreadyClosed,
    }
  }

  fn retire(&self) {
    self.source.retire_subscriber(self.id);
  }

  /// Takes the next value without blocking.
  pub fn try_recv(&self) -> Result<T, TryRecvError> {
    match self.step(None) {
      Step::Value(value) => Ok(value),
      Step::Waiting => Err(TryRecvError::Empty),
      Step::ClosedNow => {
        self.retire();
        Err(TryRecvError::Closed)
      }
      Step::AlreadyClosed => Err(TryRecvError::Closed),
    }
  }

  /// Takes the next value, parking the calling thread until one arrives or
  /// the source's broadcast ends.
  pub fn recv_sync(&self) -> Result<T, RecvError> {
    loop {
      match self.step(Some(Waiter::Sync(thread::current()))) {
        Step::Value(value) => return Ok(value),
        Step::ClosedNow => {
          self.retire();
          return Err(RecvError::Closed);
        }
        Step::AlreadyClosed => return Err(RecvError::Closed),
        Step::Waiting => thread::park(),
      }
    }
  }

  /// Like `recv_sync`, but gives up with `Timeout` once `timeout` elapses.
  pub fn recv_timeout_sync(&self, timeout: Duration) -> Result<T, RecvErrorTimeout> {
    let deadline = Instant::now() + timeout;
    loop {
      match self.step(Some(Waiter::Sync(thread::current()))) {
        Step::Value(value) => return Ok(value),
        Step::ClosedNow => {
          self.retire();
          return Err(RecvErrorTimeout::Closed);
        }
        Step::AlreadyClosed => return Err(RecvErrorTimeout::Closed),
        Step::Waiting => {
          let now = Instant::now();
          if now >= deadline {
            return Err(RecvErrorTimeout::Timeout);
          }
          thread::park_timeout(deadline - now);
        }
      }
    }
  }

  /// Takes the next value asynchronously.
  pub fn recv_async(&self) -> RecvFuture<'_, T> {
    RecvFuture { subscription: self }
  }

  pub(crate) fn poll_recv(&self, cx: &mut Context<'_>) -> Poll<Result<T, RecvError>> {
    match self.step(Some(Waiter::Async(cx.waker().clone()))) {
      Step::Value(value) => Poll::Ready(Ok(value)),
      Step::ClosedNow => {
        self.retire();
        Poll::Ready(Err(RecvError::Closed))
      }
      Step::AlreadyClosed => Poll::Ready(Err(RecvError::Closed)),
      Step::Waiting => Poll::Pending,
    }
  }

  /// Detaches from the source, discarding anything still buffered.
  pub fn unsubscribe(self) {
    // Drop performs the detach.
  }

  pub fn is_closed(&self) -> bool {
    matches!(
      self.shared.internal.lock().state,
      SubscriptionState::Closed
    )
  }

  pub fn len(&self) -> usize {
    self.shared.internal.lock().buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

// --- Future ---

#[must_use = "futures do nothing unless you .await or poll them"]
pub struct RecvFuture<'a, T: Send> {
  subscription: &'a Subscription<T>,
}

impl<'a, T: Send> Future for RecvFuture<'a, T> {
  type Output = Result<T, RecvError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.subscription.poll_recv(cx)
  }
}

// --- Stream ---

impl<T: Send> futures_core::Stream for Subscription<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    match self.poll_recv(cx) {
      Poll::Ready(Ok(value)) => Poll::Ready(Some(value)),
      Poll::Ready(Err(RecvError::Closed)) => Poll::Ready(None),
      Poll::Pending => Poll::Pending,
    }
  }
}

// --- Dropping ---

impl<T: Send> Drop for Subscription<T> {
  fn drop(&mut self) {
    let detached = {
      let mut internal = self.shared.internal.lock();
      match internal.state {
        SubscriptionState::Closed => false,
        _ => {
          internal.state = SubscriptionState::Closed;
          internal.buffer.clear();
          true
        }
      }
    };
    if detached {
      self.retire();
    }
  }
}
