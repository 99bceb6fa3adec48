// src/source/shared.rs

use super::queue::EventQueue;
use super::subscription::SubscriptionShared;
use crate::error::SourceCompleted;
use crate::internal::waiter::{self, Waiter};
use crate::telemetry;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle, Thread};

const LOC_SOURCE: &str = "Source";
const EVT_FINALIZED: &str = "Finalized";

/// Completion stages. The stage only ever moves forward.
pub(crate) const STAGE_RUNNING: u8 = 0;
pub(crate) const STAGE_COMPLETING: u8 = 1;
pub(crate) const STAGE_DONE: u8 = 2;

/// One record in the event journal. The `Complete` sentinel is enqueued at
/// most once, by whichever caller wins the stage transition.
pub(crate) enum SourceEvent<T> {
  Value(T),
  Complete,
}

/// State shared by every `Source` handle, every `Subscription`, and the
/// worker thread.
pub(crate) struct SourceShared<T: Send> {
  pub(crate) queue: EventQueue<SourceEvent<T>>,
  /// Approximate number of undrained journal events.
  pub(crate) queue_len: AtomicUsize,

  pub(crate) subscribers: papaya::HashMap<u64, Arc<SubscriptionShared<T>>>,
  pub(crate) next_subscriber_id: AtomicU64,
  /// Kept alongside the map so the worker can check for emptiness without
  /// iterating.
  pub(crate) subscriber_count: AtomicUsize,

  pub(crate) stage: AtomicU8,
  pub(crate) handle_count: AtomicUsize,

  worker_parked: AtomicBool,
  worker_thread: Mutex<Option<Thread>>,
  pub(crate) worker_handle: Mutex<Option<JoinHandle<()>>>,

  /// Threads and tasks blocked in a completion call, woken at finalize.
  completion_waiters: Mutex<Vec<Waiter>>,

  /// Stop tokens for cancellation watchers, cancelled at finalize so the
  /// watcher tasks exit with the source.
  #[cfg(feature = "cancel")]
  pub(crate) watcher_stops: Mutex<Vec<tokio_util::sync::CancellationToken>>,
}

impl<T: Send> SourceShared<T> {
  pub(crate) fn new() -> Self {
    SourceShared {
      queue: EventQueue::new(),
      queue_len: AtomicUsize::new(0),
      subscribers: papaya::HashMap::new(),
      next_subscriber_id: AtomicU64::new(0),
      subscriber_count: AtomicUsize::new(0),
      stage: AtomicU8::new(STAGE_RUNNING),
      handle_count: AtomicUsize::new(1),
      worker_parked: AtomicBool::new(false),
      worker_thread: Mutex::new(None),
      worker_handle: Mutex::new(None),
      completion_waiters: Mutex::new(Vec::new()),
      #[cfg(feature = "cancel")]
      watcher_stops: Mutex::new(Vec::new()),
    }
  }

  // --- Worker parking ---

  /// Called once, first thing, on the worker thread.
  pub(crate) fn register_worker_thread(&self) {
    *self.worker_thread.lock() = Some(thread::current());
  }

  /// Unparks the worker if it is parked. Safe to call from any thread.
  pub(crate) fn wake_worker(&self) {
    if self
      .worker_parked
      .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      if let Some(worker) = self.worker_thread.lock().as_ref() {
        worker.unpark();
      }
    }
  }

  /// Parks the worker until new work arrives. Arms the parked flag first
  /// and re-checks for work afterwards, so a wake issued between the two
  /// is never lost.
  pub(crate) fn park_worker(&self, completing: bool) {
    self.worker_parked.store(true, Ordering::Release);
    if self.worker_has_work(completing) {
      let _ = self.worker_parked.compare_exchange(
        true,
        false,
        Ordering::AcqRel,
        Ordering::Relaxed,
      );
      return;
    }
    thread::park();
    let _ =
      self
        .worker_parked
        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed);
  }

  fn worker_has_work(&self, completing: bool) -> bool {
    !self.queue.is_empty()
      || (completing && self.subscriber_count.load(Ordering::Acquire) == 0)
  }

  // --- Completion ---

  /// Moves the stage to `COMPLETING` and enqueues the sentinel. Fails if
  /// completion was already requested.
  pub(crate) fn request_complete(&self) -> Result<(), SourceCompleted> {
    self
      .stage
      .compare_exchange(
        STAGE_RUNNING,
        STAGE_COMPLETING,
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .map_err(|_| SourceCompleted)?;

    self.queue.push(SourceEvent::Complete, &mut None);
    self.queue_len.fetch_add(1, Ordering::Relaxed);
    self.wake_worker();
    Ok(())
  }

  /// Blocks the calling thread until the worker finalizes.
  pub(crate) fn wait_completed_sync(&self) {
    loop {
      if self.stage.load(Ordering::Acquire) == STAGE_DONE {
        return;
      }
      self
        .completion_waiters
        .lock()
        .push(Waiter::Sync(thread::current()));
      // The waiter list and the stage store are ordered through the same
      // mutex, so this re-check cannot miss the finalize.
      if self.stage.load(Ordering::Acquire) == STAGE_DONE {
        return;
      }
      thread::park();
    }
  }

  pub(crate) fn poll_completed(&self, cx: &mut Context<'_>) -> Poll<()> {
    if self.stage.load(Ordering::Acquire) == STAGE_DONE {
      return Poll::Ready(());
    }
    self
      .completion_waiters
      .lock()
      .push(Waiter::Async(cx.waker().clone()));
    if self.stage.load(Ordering::Acquire) == STAGE_DONE {
      return Poll::Ready(());
    }
    Poll::Pending
  }

  /// Worker-only: marks the source done and releases everything that waits
  /// on or feeds it.
  pub(crate) fn finalize(&self) {
    self.stage.store(STAGE_DONE, Ordering::Release);

    let waiters = std::mem::take(&mut *self.completion_waiters.lock());
    waiter::wake_all(waiters);

    #[cfg(feature = "cancel")]
    {
      let stops = std::mem::take(&mut *self.watcher_stops.lock());
      for stop in stops {
        stop.cancel();
      }
    }

    telemetry::log_event(None, LOC_SOURCE, EVT_FINALIZED, None);
  }

  // --- Subscriber registry ---

  /// Removes a subscriber from the registry. Idempotent; the count only
  /// moves on an actual removal.
  pub(crate) fn retire_subscriber(&self, id: u64) {
    if self.subscribers.pin().remove(&id).is_some() {
      self.subscriber_count.fetch_sub(1, Ordering::AcqRel);
      // A completing worker parks until the registry empties.
      self.wake_worker();
    }
  }

  /// Worker-only: flips every accepting subscriber to draining. Those with
  /// nothing left to drain close immediately.
  pub(crate) fn begin_draining(&self) {
    let mut emptied = Vec::new();
    {
      let map = self.subscribers.pin();
      for (id, subscriber) in map.iter() {
        if subscriber.begin_draining() {
          emptied.push(*id);
        }
      }
    }
    for id in emptied {
      self.retire_subscriber(id);
    }
  }
}

impl<T: Send + Clone> SourceShared<T> {
  /// Worker-only: hands one value to every live subscriber, in a single
  /// pinned pass. All subscribers therefore observe the same total order.
  pub(crate) fn fan_out(&self, value: T) {
    let map = self.subscribers.pin();
    for subscriber in map.values() {
      subscriber.deliver(value.clone());
    }
  }
}
