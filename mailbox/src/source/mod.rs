// src/source/mod.rs

//! A broadcast source: one event journal fanned out to any number of
//! subscribers by a dedicated worker thread.
//!
//! A [`Source`] accepts posted values from any thread without blocking and
//! appends them to an unbounded journal. A single worker drains the
//! journal in order and hands each value to every live [`Subscription`],
//! so all subscribers observe the same values in the same total order.
//!
//! ## Behavior
//!
//! - **Subscription window**: A subscriber receives the values the worker
//!   processes after it subscribed; earlier values are gone. Subscribing
//!   after completion has been requested yields an already-closed
//!   subscription.
//! - **Graceful completion**: `complete_sync` / `complete_async` stop new
//!   posts immediately, then wait until every subscriber has drained its
//!   buffer (or unsubscribed) before resolving. A second completion
//!   request fails with [`SourceCompleted`](crate::error::SourceCompleted).
//! - **Handle-driven lifecycle**: `Source` is cloneable; dropping the last
//!   handle requests completion without waiting for the drain.
//! - **Hybrid consumers**: Subscriptions offer `try_`, `_sync`, timeout
//!   and `_async` receives plus a `Stream` implementation, so sync and
//!   async consumers can share one source.
//!
//! # Examples
//!
//! ```
//! use postbox::Source;
//!
//! let source = Source::start();
//! let ticks = source.subscribe();
//! let tocks = source.subscribe();
//!
//! source.post("tick").unwrap();
//! source.post("tock").unwrap();
//!
//! // Every subscriber sees every value, in post order.
//! assert_eq!(ticks.recv_sync().unwrap(), "tick");
//! assert_eq!(tocks.recv_sync().unwrap(), "tick");
//! assert_eq!(ticks.recv_sync().unwrap(), "tock");
//! assert_eq!(tocks.recv_sync().unwrap(), "tock");
//!
//! // Both subscribers are drained, so completion returns promptly.
//! source.complete_sync().unwrap();
//! assert!(ticks.recv_sync().is_err());
//! ```

mod queue;
mod shared;
mod subscription;
pub(crate) mod worker;

pub use subscription::{RecvFuture, Subscription};

pub(crate) use shared::SourceShared;

use self::queue::Segment;
use self::shared::{SourceEvent, STAGE_RUNNING};
use self::subscription::SubscriptionShared;
use crate::error::SourceCompleted;

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

/// A handle for posting into a broadcast source.
///
/// All clones feed the same journal and worker. See the [module
/// docs](self) for the delivery and completion contract.
pub struct Source<T: Send + Clone + 'static> {
  pub(crate) shared: Arc<SourceShared<T>>,
  /// Producer-side segment cache, private to this handle so warm posts
  /// skip the journal's head lock.
  cache: Mutex<Option<Arc<Segment<SourceEvent<T>>>>>,
}

impl<T: Send + Clone + 'static> Source<T> {
  /// Creates a source and spawns its worker thread.
  pub fn start() -> Self {
    let shared = Arc::new(SourceShared::new());
    let worker_shared = Arc::clone(&shared);
    let handle = thread::spawn(move || worker::run(worker_shared));
    *shared.worker_handle.lock() = Some(handle);
    Source {
      shared,
      cache: Mutex::new(None),
    }
  }

  /// Appends `value` to the journal. Never blocks; fails once completion
  /// has been requested.
  pub fn post(&self, value: T) -> Result<(), SourceCompleted> {
    if self.shared.stage.load(Ordering::Acquire) != STAGE_RUNNING {
      return Err(SourceCompleted);
    }
    let mut cache = self.cache.lock();
    self.shared.queue.push(SourceEvent::Value(value), &mut *cache);
    self.shared.queue_len.fetch_add(1, Ordering::Relaxed);
    self.shared.wake_worker();
    Ok(())
  }

  /// Registers a new subscriber and returns its receiving half.
  ///
  /// If completion has already been requested the subscription comes back
  /// closed.
  pub fn subscribe(&self) -> Subscription<T> {
    let id = self.shared.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
    let sub_shared = Arc::new(SubscriptionShared::new());
    let subscription = Subscription {
      shared: Arc::clone(&sub_shared),
      source: Arc::clone(&self.shared),
      id,
    };

    if self.shared.stage.load(Ordering::Acquire) != STAGE_RUNNING {
      subscription.shared.close_now();
      return subscription;
    }

    // Count before inserting: a retire that finds the entry in the
    // registry must observe a count that already includes it.
    self.shared.subscriber_count.fetch_add(1, Ordering::AcqRel);
    self.shared.subscribers.pin().insert(id, sub_shared);

    // Completion may have slipped in between the stage check and the
    // insert. The entry must not outlive the drain the worker is already
    // running, so take it straight back out.
    if self.shared.stage.load(Ordering::Acquire) != STAGE_RUNNING {
      self.shared.retire_subscriber(id);
      subscription.shared.close_now();
    }
    subscription
  }

  /// Requests completion and blocks until the worker has delivered
  /// everything already journaled and every subscriber has drained or
  /// unsubscribed.
  ///
  /// Do not call this while holding an undrained [`Subscription`] on the
  /// same thread: completion waits for that subscription to drain, which
  /// the blocked thread can no longer do.
  pub fn complete_sync(&self) -> Result<(), SourceCompleted> {
    self.shared.request_complete()?;
    self.shared.wait_completed_sync();
    if let Some(handle) = self.shared.worker_handle.lock().take() {
      let _ = handle.join();
    }
    Ok(())
  }

  /// Asynchronous form of [`complete_sync`](Source::complete_sync). The
  /// worker thread is detached rather than joined.
  pub fn complete_async(&self) -> CompleteFuture<'_, T> {
    CompleteFuture {
      shared: &self.shared,
      requested: false,
    }
  }

  /// True once completion has been requested, whether or not the drain
  /// has finished.
  pub fn is_completed(&self) -> bool {
    self.shared.stage.load(Ordering::Acquire) != STAGE_RUNNING
  }

  pub fn subscriber_count(&self) -> usize {
    self.shared.subscriber_count.load(Ordering::Acquire)
  }

  /// Approximate number of journal events the worker has not yet
  /// processed.
  pub fn len(&self) -> usize {
    self.shared.queue_len.load(Ordering::Relaxed)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

// --- Future ---

#[must_use = "futures do nothing unless you .await or poll them"]
pub struct CompleteFuture<'a, T: Send> {
  shared: &'a SourceShared<T>,
  requested: bool,
}

impl<'a, T: Send> Future for CompleteFuture<'a, T> {
  type Output = Result<(), SourceCompleted>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.as_mut().get_mut();
    if !this.requested {
      match this.shared.request_complete() {
        Ok(()) => this.requested = true,
        Err(err) => return Poll::Ready(Err(err)),
      }
    }
    match this.shared.poll_completed(cx) {
      Poll::Ready(()) => {
        // The worker has finalized; detach its thread.
        drop(this.shared.worker_handle.lock().take());
        Poll::Ready(Ok(()))
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

// --- Cloning and Dropping ---

impl<T: Send + Clone + 'static> Clone for Source<T> {
  fn clone(&self) -> Self {
    self.shared.handle_count.fetch_add(1, Ordering::Relaxed);
    Source {
      shared: Arc::clone(&self.shared),
      cache: Mutex::new(None),
    }
  }
}

impl<T: Send + Clone + 'static> Drop for Source<T> {
  fn drop(&mut self) {
    if self.shared.handle_count.fetch_sub(1, Ordering::AcqRel) == 1 {
      // Last handle: request completion without waiting for the drain.
      let _ = self.shared.request_complete();
    }
  }
}
