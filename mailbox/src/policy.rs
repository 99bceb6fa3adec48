// src/policy.rs

//! Buffer policies controlling channel capacity and overflow behavior.

/// Configuration for a channel's buffer: how much it holds and what a write
/// does when the buffer is full.
///
/// `Single` and `New` both cap the buffer at one value but differ on a full
/// write: `Single` applies backpressure (the writer waits), `New` coalesces
/// (the old value is evicted). `Latest` behaves like `New` but starts
/// pre-seeded, so a late reader always finds the most recent value instead of
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferPolicy<T> {
  /// No capacity limit; writes never wait and never evict.
  Unbounded,
  /// At most `n` values; a write into a full buffer waits for a read.
  Bounded(usize),
  /// At most one value; a write while occupied waits for a read.
  Single,
  /// At most one value, pre-seeded with `initial`; a write while occupied
  /// evicts the old value.
  Latest(T),
  /// At most `n` values; a write into a full buffer evicts the oldest value,
  /// so the reader always sees the `n` most recent.
  Newest(usize),
  /// At most one value; a write while occupied evicts the old value.
  New,
}

/// The behavior a policy lowers to inside the channel core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PolicyKind {
  Unbounded,
  /// Fixed capacity, writers wait while full.
  Blocking,
  /// Fixed capacity, a full write evicts the oldest buffered value.
  Sliding,
}

impl<T> BufferPolicy<T> {
  /// Lowers the policy to `(kind, capacity, seed)`.
  ///
  /// # Panics
  ///
  /// Panics if a bounded variant was constructed with capacity 0. A channel
  /// that can never hold a value is a programming error and fails fast here
  /// rather than defaulting.
  pub(crate) fn into_parts(self) -> (PolicyKind, Option<usize>, Option<T>) {
    match self {
      BufferPolicy::Unbounded => (PolicyKind::Unbounded, None, None),
      BufferPolicy::Bounded(n) => {
        assert!(n >= 1, "buffer capacity must be at least 1");
        (PolicyKind::Blocking, Some(n), None)
      }
      BufferPolicy::Single => (PolicyKind::Blocking, Some(1), None),
      BufferPolicy::Latest(initial) => (PolicyKind::Sliding, Some(1), Some(initial)),
      BufferPolicy::Newest(n) => {
        assert!(n >= 1, "buffer capacity must be at least 1");
        (PolicyKind::Sliding, Some(n), None)
      }
      BufferPolicy::New => (PolicyKind::Sliding, Some(1), None),
    }
  }
}
