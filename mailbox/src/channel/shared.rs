// src/channel/shared.rs

use crate::error::{
  CompleteError, Failure, PostError, ReadError, ReadErrorTimeout, TryPostError, TryReadError,
};
use crate::internal::waiter::{self, Waiter};
use crate::policy::{BufferPolicy, PolicyKind};
use crate::telemetry;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::AtomicUsize;
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

const LOC_CORE: &str = "ChannelShared";
const CTR_EVICTIONS: &str = "SlidingEvictions";

/// Close status of a channel. `Completed` and `Failed` only differ in what
/// readers observe once the buffer has drained.
#[derive(Debug)]
pub(crate) enum ChannelState {
  Open,
  Completed,
  Failed(Failure),
}

impl ChannelState {
  fn is_open(&self) -> bool {
    matches!(self, ChannelState::Open)
  }

  /// The read error reported once the buffer is empty.
  fn drained_error(&self) -> ReadError {
    match self {
      ChannelState::Open => unreachable!("open channel has no drained error"),
      ChannelState::Completed => ReadError::Closed,
      ChannelState::Failed(failure) => ReadError::Failed(failure.clone()),
    }
  }
}

pub(crate) struct ChannelInternal<T> {
  buffer: VecDeque<T>,
  state: ChannelState,
  /// Writers parked on a full blocking-bounded buffer. Woken as a batch on
  /// every dequeue; losers re-register, so no registration identity is
  /// needed across polls.
  waiting_posters: Vec<Waiter>,
  /// Readers parked on an empty buffer. Same batch-wake discipline.
  waiting_readers: Vec<Waiter>,
}

/// State shared by every `Inbox`/`Outbox` handle of one channel.
pub(crate) struct ChannelShared<T> {
  pub(crate) internal: Mutex<ChannelInternal<T>>,
  kind: PolicyKind,
  capacity: Option<usize>,
  pub(crate) inbox_count: AtomicUsize,
  pub(crate) outbox_count: AtomicUsize,
}

impl<T: Send> ChannelShared<T> {
  pub(crate) fn new(policy: BufferPolicy<T>) -> Self {
    let (kind, capacity, seed) = policy.into_parts();
    let mut buffer = VecDeque::new();
    if let Some(initial) = seed {
      buffer.push_back(initial);
    }
    ChannelShared {
      internal: Mutex::new(ChannelInternal {
        buffer,
        state: ChannelState::Open,
        waiting_posters: Vec::new(),
        waiting_readers: Vec::new(),
      }),
      kind,
      capacity,
      inbox_count: AtomicUsize::new(1),
      outbox_count: AtomicUsize::new(1),
    }
  }

  /// Buffers `value` under the lock, evicting for sliding policies.
  ///
  /// Callers must have verified the channel is open and (for blocking
  /// policies) that space exists. Returns the readers to wake.
  fn commit_post(&self, internal: &mut ChannelInternal<T>, value: T) -> Vec<Waiter> {
    if self.kind == PolicyKind::Sliding && Some(internal.buffer.len()) == self.capacity {
      internal.buffer.pop_front();
      telemetry::increment_counter(LOC_CORE, CTR_EVICTIONS);
    }
    internal.buffer.push_back(value);
    mem::take(&mut internal.waiting_readers)
  }

  fn has_space(&self, internal: &ChannelInternal<T>) -> bool {
    match self.kind {
      PolicyKind::Unbounded | PolicyKind::Sliding => true,
      PolicyKind::Blocking => Some(internal.buffer.len()) != self.capacity,
    }
  }

  pub(crate) fn try_post(&self, value: T) -> Result<(), TryPostError<T>> {
    let mut internal = self.internal.lock();
    if !internal.state.is_open() {
      return Err(TryPostError::Closed(value));
    }
    if !self.has_space(&internal) {
      return Err(TryPostError::Full(value));
    }
    let wakes = self.commit_post(&mut internal, value);
    drop(internal);
    waiter::wake_all(wakes);
    Ok(())
  }

  pub(crate) fn post_sync(&self, value: T) -> Result<(), PostError> {
    loop {
      {
        let mut internal = self.internal.lock();
        if !internal.state.is_open() {
          return Err(PostError::Closed);
        }
        if self.has_space(&internal) {
          let wakes = self.commit_post(&mut internal, value);
          drop(internal);
          waiter::wake_all(wakes);
          return Ok(());
        }
        internal
          .waiting_posters
          .push(Waiter::Sync(thread::current()));
      }
      // An unpark issued between unlock and park leaves the token set, so
      // park returns immediately and the loop re-checks.
      thread::park();
    }
  }

  pub(crate) fn poll_post(
    &self,
    cx: &mut Context<'_>,
    slot: &mut Option<T>,
  ) -> Poll<Result<(), PostError>> {
    let mut internal = self.internal.lock();
    if !internal.state.is_open() {
      return Poll::Ready(Err(PostError::Closed));
    }
    if self.has_space(&internal) {
      let value = slot.take().expect("post future polled after completion");
      let wakes = self.commit_post(&mut internal, value);
      drop(internal);
      waiter::wake_all(wakes);
      return Poll::Ready(Ok(()));
    }
    internal
      .waiting_posters
      .push(Waiter::Async(cx.waker().clone()));
    Poll::Pending
  }

  pub(crate) fn try_read(&self) -> Result<T, TryReadError> {
    let mut internal = self.internal.lock();
    if let Some(value) = internal.buffer.pop_front() {
      let wakes = mem::take(&mut internal.waiting_posters);
      drop(internal);
      waiter::wake_all(wakes);
      return Ok(value);
    }
    match &internal.state {
      ChannelState::Open => Err(TryReadError::Empty),
      ChannelState::Completed => Err(TryReadError::Closed),
      ChannelState::Failed(failure) => Err(TryReadError::Failed(failure.clone())),
    }
  }

  pub(crate) fn read_sync(&self) -> Result<T, ReadError> {
    loop {
      {
        let mut internal = self.internal.lock();
        if let Some(value) = internal.buffer.pop_front() {
          let wakes = mem::take(&mut internal.waiting_posters);
          drop(internal);
          waiter::wake_all(wakes);
          return Ok(value);
        }
        if !internal.state.is_open() {
          return Err(internal.state.drained_error());
        }
        internal
          .waiting_readers
          .push(Waiter::Sync(thread::current()));
      }
      thread::park();
    }
  }

  pub(crate) fn read_timeout_sync(&self, timeout: Duration) -> Result<T, ReadErrorTimeout> {
    let deadline = Instant::now() + timeout;
    loop {
      {
        let mut internal = self.internal.lock();
        if let Some(value) = internal.buffer.pop_front() {
          let wakes = mem::take(&mut internal.waiting_posters);
          drop(internal);
          waiter::wake_all(wakes);
          return Ok(value);
        }
        match &internal.state {
          ChannelState::Open => {}
          ChannelState::Completed => return Err(ReadErrorTimeout::Closed),
          ChannelState::Failed(failure) => {
            return Err(ReadErrorTimeout::Failed(failure.clone()))
          }
        }
        let now = Instant::now();
        if now >= deadline {
          return Err(ReadErrorTimeout::Timeout);
        }
        internal
          .waiting_readers
          .push(Waiter::Sync(thread::current()));
      }
      let remaining = deadline.saturating_duration_since(Instant::now());
      thread::park_timeout(remaining);
    }
  }

  pub(crate) fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<T, ReadError>> {
    let mut internal = self.internal.lock();
    if let Some(value) = internal.buffer.pop_front() {
      let wakes = mem::take(&mut internal.waiting_posters);
      drop(internal);
      waiter::wake_all(wakes);
      return Poll::Ready(Ok(value));
    }
    if !internal.state.is_open() {
      return Poll::Ready(Err(internal.state.drained_error()));
    }
    internal
      .waiting_readers
      .push(Waiter::Async(cx.waker().clone()));
    Poll::Pending
  }

  /// Closes the channel. Buffered values stay readable until drained.
  pub(crate) fn complete(&self) -> Result<(), CompleteError> {
    self.close_with(ChannelState::Completed)
  }

  /// Closes the channel with a failure readers observe after draining.
  pub(crate) fn fail(&self, failure: Failure) -> Result<(), CompleteError> {
    self.close_with(ChannelState::Failed(failure))
  }

  fn close_with(&self, next: ChannelState) -> Result<(), CompleteError> {
    let mut internal = self.internal.lock();
    if !internal.state.is_open() {
      return Err(CompleteError);
    }
    internal.state = next;
    let mut wakes = mem::take(&mut internal.waiting_posters);
    wakes.append(&mut internal.waiting_readers);
    drop(internal);
    waiter::wake_all(wakes);
    Ok(())
  }

  /// Teardown when the last `Outbox` drops: no reader will ever come, so the
  /// buffer is discarded and blocked writers are released with `Closed`.
  pub(crate) fn close_after_last_outbox(&self) {
    let mut internal = self.internal.lock();
    if internal.state.is_open() {
      internal.state = ChannelState::Completed;
    }
    internal.buffer.clear();
    let mut wakes = mem::take(&mut internal.waiting_posters);
    wakes.append(&mut internal.waiting_readers);
    drop(internal);
    waiter::wake_all(wakes);
  }

  pub(crate) fn is_closed(&self) -> bool {
    !self.internal.lock().state.is_open()
  }

  pub(crate) fn len(&self) -> usize {
    self.internal.lock().buffer.len()
  }

  pub(crate) fn capacity(&self) -> Option<usize> {
    self.capacity
  }
}
