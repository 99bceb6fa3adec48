// src/source/queue.rs

//! The unbounded event journal feeding a source's worker thread.
//!
//! Implemented as a linked list of fixed-size segments. Any number of
//! handles may push concurrently; only the worker pops. Segment rotation is
//! serialized through the `head` mutex while in-segment writes stay
//! lock-free via a claimed-index protocol.

use crate::internal::cache_padded::CachePadded;

use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Events per segment. Large enough to amortize allocation, small enough
/// that a mostly-idle source wastes little memory.
pub(crate) const SEGMENT_CAPACITY: usize = 32;

/// Spins before yielding while a producer finishes a claimed slot.
const SPIN_LIMIT: usize = 100;

const SLOT_VACANT: u8 = 0;
const SLOT_CLAIMED: u8 = 1;
const SLOT_FILLED: u8 = 2;

struct Slot<T> {
  state: AtomicU8,
  value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for Slot<T> {
  fn default() -> Self {
    Slot {
      state: AtomicU8::new(SLOT_VACANT),
      value: UnsafeCell::new(MaybeUninit::uninit()),
    }
  }
}

impl<T> Slot<T> {
  /// Blocks (spinning, then yielding) until the producer that claimed this
  /// slot has finished writing, then takes the value.
  ///
  /// # Safety
  ///
  /// Only the single consumer may call this, exactly once per slot, and
  /// only after observing `SLOT_CLAIMED` or `SLOT_FILLED`.
  unsafe fn take_filled(&self) -> T {
    let mut spins = 0;
    while self.state.load(Ordering::Acquire) != SLOT_FILLED {
      if spins > SPIN_LIMIT {
        thread::yield_now();
      } else {
        std::hint::spin_loop();
      }
      spins += 1;
    }
    (*self.value.get()).assume_init_read()
  }
}

pub(crate) struct Segment<T> {
  /// Next segment in the list. Holds one leaked `Arc` strong count,
  /// transferred via `Arc::into_raw` when the segment is linked and
  /// reclaimed via `Arc::from_raw` when the consumer advances.
  next: AtomicPtr<Segment<T>>,
  write_index: CachePadded<AtomicUsize>,
  slots: [Slot<T>; SEGMENT_CAPACITY],
}

// Slot access is gated by the per-slot state flags; everything else is
// atomic.
unsafe impl<T: Send> Send for Segment<T> {}
unsafe impl<T: Send> Sync for Segment<T> {}

impl<T> fmt::Debug for Segment<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Segment")
      .field("write_index", &self.write_index.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl<T> Segment<T> {
  fn new() -> Self {
    Segment {
      next: AtomicPtr::new(ptr::null_mut()),
      write_index: CachePadded::new(AtomicUsize::new(0)),
      slots: std::array::from_fn(|_| Slot::default()),
    }
  }

  /// Claims the next write position, or `None` when the segment is full.
  fn claim(&self) -> Option<usize> {
    let index = self.write_index.fetch_add(1, Ordering::Relaxed);
    (index < SEGMENT_CAPACITY).then_some(index)
  }

  fn fill(&self, index: usize, value: T) {
    let slot = &self.slots[index];
    slot.state.store(SLOT_CLAIMED, Ordering::Release);
    unsafe {
      (*slot.value.get()).write(value);
    }
    slot.state.store(SLOT_FILLED, Ordering::Release);
  }
}

/// Multi-producer, single-consumer unbounded segment queue.
///
/// Producers keep a per-handle segment cache so the common push is a
/// fetch-add plus two state stores. The consumer side is single-threaded
/// by contract and uses `UnsafeCell` instead of locks.
pub(crate) struct EventQueue<T> {
  /// Segment currently accepting writes. Producers fall back here when
  /// their cached segment fills; holding the lock keeps the `Arc` alive
  /// while a reference is taken.
  head: CachePadded<Mutex<Arc<Segment<T>>>>,

  /// Segment currently being read. Consumer-only.
  tail: CachePadded<UnsafeCell<Arc<Segment<T>>>>,

  /// Next slot to read within the tail segment. Consumer-only.
  cursor: CachePadded<UnsafeCell<usize>>,
}

unsafe impl<T: Send> Send for EventQueue<T> {}
unsafe impl<T: Send> Sync for EventQueue<T> {}

impl<T> EventQueue<T> {
  pub(crate) fn new() -> Self {
    let segment = Arc::new(Segment::new());
    EventQueue {
      head: CachePadded::new(Mutex::new(Arc::clone(&segment))),
      tail: CachePadded::new(UnsafeCell::new(segment)),
      cursor: CachePadded::new(UnsafeCell::new(0)),
    }
  }

  /// Appends `value`. `segment_cache` is the producer's private cache of
  /// the segment it last wrote to; pushes through a warm cache take no
  /// lock.
  pub(crate) fn push(&self, value: T, segment_cache: &mut Option<Arc<Segment<T>>>) {
    loop {
      if let Some(segment) = segment_cache {
        match segment.claim() {
          Some(index) => {
            segment.fill(index, value);
            return;
          }
          None => {
            *segment_cache = None;
          }
        }
      }

      let mut head = self.head.lock();
      if head.write_index.load(Ordering::Relaxed) < SEGMENT_CAPACITY {
        // Another producer already rotated; adopt the current head.
        *segment_cache = Some(Arc::clone(&head));
        continue;
      }

      let fresh = Arc::new(Segment::new());
      // Transfer one strong count into the link itself.
      let fresh_ptr = Arc::into_raw(Arc::clone(&fresh)) as *mut Segment<T>;
      head.next.store(fresh_ptr, Ordering::Release);
      *head = Arc::clone(&fresh);
      *segment_cache = Some(fresh);
    }
  }

  /// Removes the oldest value, or `None` when no filled slot is visible.
  ///
  /// Must only be called from the consumer thread.
  pub(crate) fn pop(&self) -> Option<T> {
    unsafe {
      let tail_ptr = self.tail.get();
      let cursor_ptr = self.cursor.get();

      loop {
        let cursor = *cursor_ptr;
        if cursor < SEGMENT_CAPACITY {
          let slot = &(**tail_ptr).slots[cursor];
          match slot.state.load(Ordering::Acquire) {
            SLOT_VACANT => return None,
            _ => {
              let value = slot.take_filled();
              *cursor_ptr = cursor + 1;
              return Some(value);
            }
          }
        }

        // Tail segment exhausted; advance if a successor is linked. The
        // borrow of the old tail must end before it is replaced.
        let next_ptr = {
          let tail: &Segment<T> = &**tail_ptr;
          tail.next.load(Ordering::Acquire)
        };
        if next_ptr.is_null() {
          return None;
        }
        // Reclaims the strong count leaked when the link was stored; the
        // replaced Arc drops the retired segment.
        let next = Arc::from_raw(next_ptr);
        ptr::replace(tail_ptr, next);
        *cursor_ptr = 0;
      }
    }
  }

  /// Consumer-side emptiness check, used before parking the worker.
  pub(crate) fn is_empty(&self) -> bool {
    unsafe {
      let tail: &Segment<T> = &**self.tail.get();
      let cursor = *self.cursor.get();

      if cursor == SEGMENT_CAPACITY {
        return tail.next.load(Ordering::Acquire).is_null();
      }
      tail.slots[cursor].state.load(Ordering::Acquire) == SLOT_VACANT
    }
  }
}

impl<T> Drop for EventQueue<T> {
  fn drop(&mut self) {
    unsafe {
      let tail_ptr = self.tail.get();

      // `ptr::read` creates a second owner of the tail Arc alongside the
      // field itself, which still drops normally. Balance the count first.
      Arc::increment_strong_count(Arc::as_ptr(&*tail_ptr));
      let mut segment = ptr::read(tail_ptr);
      let mut cursor = *self.cursor.get();

      loop {
        for index in cursor..SEGMENT_CAPACITY {
          let slot = &segment.slots[index];
          if slot.state.load(Ordering::Acquire) == SLOT_FILLED {
            (*slot.value.get()).assume_init_drop();
          } else {
            break;
          }
        }

        let next_ptr = segment.next.load(Ordering::Acquire);
        if next_ptr.is_null() {
          break;
        }
        segment = Arc::from_raw(next_ptr);
        cursor = 0;
      }
    }
  }
}
