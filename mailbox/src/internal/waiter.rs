// src/internal/waiter.rs

use std::task::Waker;
use std::thread::Thread;

/// A parked party waiting on a channel, subscription, or completion gate.
///
/// Sync waiters are parked threads; async waiters are registered task wakers.
/// Both sides share the same waiter queues so a channel can be driven from
/// threads and tasks at the same time.
#[derive(Debug)]
pub(crate) enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  /// Wakes the waiting party, consuming the registration.
  pub(crate) fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

/// Drains a waiter list and wakes every entry.
///
/// Callers take the list out of the protected state first so no lock is held
/// while wakes run.
pub(crate) fn wake_all(waiters: impl IntoIterator<Item = Waiter>) {
  for waiter in waiters {
    waiter.wake();
  }
}
