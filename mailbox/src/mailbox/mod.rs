// src/mailbox/mod.rs

//! A bidirectional mailbox with composable views.
//!
//! A [`Mailbox<A, B>`] accepts values of type `A` and yields values of
//! type `B`. A fresh mailbox is symmetric (`A == B`); the combinators
//! build asymmetric views on top of it without allocating new buffers.
//!
//! ## Behavior
//!
//! - **Structural views**: [`map`](Mailbox::map), [`contra_map`](Mailbox::contra_map),
//!   [`flat_map`](Mailbox::flat_map), [`apply`](Mailbox::apply),
//!   [`combine`](Mailbox::combine) and [`choose`](Mailbox::choose) return new
//!   mailboxes that share the originals' buffers. A value read through any
//!   view is consumed from the underlying channel; closing a view closes
//!   the mailbox it wraps.
//! - **Hybrid operations**: every mailbox offers `try_`, `_sync` and
//!   `_async` variants of post and read, usable from plain threads and
//!   async tasks alike.
//! - **Graceful close**: [`complete`](Mailbox::complete) lets buffered
//!   values drain before readers see `Closed`; [`fail`](Mailbox::fail)
//!   attaches a [`Failure`] that readers observe once the buffer is empty.
//!
//! ## Examples
//!
//! Transforming both ends of a mailbox:
//!
//! ```rust
//! use postbox::{BufferPolicy, Mailbox};
//!
//! let celsius: Mailbox<f64, f64> = Mailbox::new(BufferPolicy::Unbounded);
//! let fahrenheit = celsius
//!   .map(|c| c * 9.0 / 5.0 + 32.0)
//!   .contra_map(|f: f64| (f - 32.0) * 5.0 / 9.0);
//!
//! fahrenheit.post_sync(212.0).unwrap();
//! assert_eq!(celsius.try_read(), Ok(100.0));
//!
//! celsius.post_sync(0.0).unwrap();
//! assert_eq!(fahrenheit.read_sync(), Ok(32.0));
//! ```
//!
//! Fanning in from two producers:
//!
//! ```rust
//! use postbox::{BufferPolicy, Mailbox};
//!
//! let left = Mailbox::new(BufferPolicy::Unbounded);
//! let right = Mailbox::new(BufferPolicy::Unbounded);
//! let both = left.combine(&right);
//!
//! both.post_sync("hello").unwrap();
//! assert_eq!(left.try_read(), Ok("hello"));
//! assert_eq!(right.try_read(), Ok("hello"));
//! ```

mod adapters;

use crate::channel::{channel, Inbox, Outbox};
use crate::error::{
  CompleteError, Failure, PostError, ReadError, TryPostError, TryPostRejection, TryReadError,
};
use crate::internal::block_on::block_on;
use crate::policy::BufferPolicy;

use adapters::{ApplyRead, ChooseRead, ContraMapPost, FanInPost, FlatMapRead, MapRead, MergeRead};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

// --- Traits ---

/// Object-safe posting half of a mailbox. Implemented by [`Inbox`] and by
/// the combinator adapters that wrap one.
pub(crate) trait PostSink<A: Send>: Send + Sync {
  fn try_post(&self, value: A) -> Result<(), TryPostRejection>;
  fn post(&self, value: A) -> BoxFuture<'_, Result<(), PostError>>;
  fn complete(&self) -> Result<(), CompleteError>;
  fn fail(&self, failure: Failure) -> Result<(), CompleteError>;
  fn is_closed(&self) -> bool;
}

/// Object-safe reading half of a mailbox.
pub(crate) trait ReadSource<B: Send>: Send + Sync {
  fn try_read(&self) -> Result<B, TryReadError>;
  fn read(&self) -> BoxFuture<'_, Result<B, ReadError>>;
  fn is_closed(&self) -> bool;
}

impl<T: Send + 'static> PostSink<T> for Inbox<T> {
  fn try_post(&self, value: T) -> Result<(), TryPostRejection> {
    Inbox::try_post(self, value).map_err(|err| match err {
      TryPostError::Full(_) => TryPostRejection::Full,
      TryPostError::Closed(_) => TryPostRejection::Closed,
    })
  }

  fn post(&self, value: T) -> BoxFuture<'_, Result<(), PostError>> {
    Box::pin(Inbox::post_async(self, value))
  }

  fn complete(&self) -> Result<(), CompleteError> {
    Inbox::complete(self)
  }

  fn fail(&self, failure: Failure) -> Result<(), CompleteError> {
    Inbox::fail(self, failure)
  }

  fn is_closed(&self) -> bool {
    Inbox::is_closed(self)
  }
}

impl<T: Send + 'static> ReadSource<T> for Outbox<T> {
  fn try_read(&self) -> Result<T, TryReadError> {
    Outbox::try_read(self)
  }

  fn read(&self) -> BoxFuture<'_, Result<T, ReadError>> {
    Box::pin(Outbox::read_async(self))
  }

  fn is_closed(&self) -> bool {
    Outbox::is_closed(self)
  }
}

// --- Mailbox ---

/// A post/read pair over a policy-governed buffer.
///
/// Values of type `A` go in, values of type `B` come out. Cloning a
/// mailbox is cheap and yields a handle onto the same buffer.
pub struct Mailbox<A: Send, B: Send> {
  post: Arc<dyn PostSink<A>>,
  read: Arc<dyn ReadSource<B>>,
}

impl<T: Send + 'static> Mailbox<T, T> {
  /// Creates a symmetric mailbox whose buffer obeys `policy`.
  ///
  /// # Panics
  ///
  /// Panics if the policy carries a zero capacity, as
  /// [`BufferPolicy`] requires at least one slot.
  pub fn new(policy: BufferPolicy<T>) -> Self {
    let (inbox, outbox) = channel(policy);
    Mailbox::from_halves(inbox, outbox)
  }
}

impl<A: Send + 'static, B: Send + 'static> Mailbox<A, B> {
  /// Builds a mailbox from independently created channel halves.
  pub fn from_halves(inbox: Inbox<A>, outbox: Outbox<B>) -> Self {
    Mailbox {
      post: Arc::new(inbox),
      read: Arc::new(outbox),
    }
  }

  /// Attempts to post without blocking.
  pub fn try_post(&self, value: A) -> Result<(), TryPostRejection> {
    self.post.try_post(value)
  }

  /// Posts a value, blocking the calling thread while the buffer is full.
  pub fn post_sync(&self, value: A) -> Result<(), PostError> {
    block_on(self.post.post(value))
  }

  /// Posts a value asynchronously. The returned future is lazy: nothing
  /// is enqueued until it is polled, and dropping it before completion
  /// abandons the post.
  pub fn post_async(&self, value: A) -> MailboxPostFuture<'_> {
    MailboxPostFuture {
      inner: self.post.post(value),
    }
  }

  /// Attempts to read without blocking.
  pub fn try_read(&self) -> Result<B, TryReadError> {
    self.read.try_read()
  }

  /// Reads the next value, blocking the calling thread while the mailbox
  /// is empty.
  pub fn read_sync(&self) -> Result<B, ReadError> {
    block_on(self.read.read())
  }

  /// Reads the next value asynchronously.
  pub fn read_async(&self) -> MailboxReadFuture<'_, B> {
    MailboxReadFuture {
      inner: self.read.read(),
    }
  }

  /// Closes the mailbox gracefully. Values already buffered remain
  /// readable; posting stops immediately.
  pub fn complete(&self) -> Result<(), CompleteError> {
    self.post.complete()
  }

  /// Closes the mailbox with a failure that readers observe once the
  /// buffer has drained.
  pub fn fail(&self, failure: Failure) -> Result<(), CompleteError> {
    self.post.fail(failure)
  }

  /// Returns `true` once the posting half no longer accepts values.
  pub fn is_post_closed(&self) -> bool {
    self.post.is_closed()
  }

  /// Returns `true` once the reading half can no longer yield a value.
  ///
  /// For combined views this accounts for every underlying source; see
  /// the individual combinators for when that happens.
  pub fn is_read_closed(&self) -> bool {
    self.read.is_closed()
  }

  /// Returns `true` once both halves are closed.
  pub fn is_closed(&self) -> bool {
    self.post.is_closed() && self.read.is_closed()
  }

  // --- Combinators ---

  /// Returns a view that transforms every value read from this mailbox.
  ///
  /// The view shares this mailbox's buffer: a value read through either
  /// handle is gone from both.
  pub fn map<C>(&self, transform: impl Fn(B) -> C + Send + Sync + 'static) -> Mailbox<A, C>
  where
    C: Send + 'static,
  {
    Mailbox {
      post: Arc::clone(&self.post),
      read: Arc::new(MapRead::new(Arc::clone(&self.read), transform)),
    }
  }

  /// Returns a view that transforms every value before it is posted.
  pub fn contra_map<Z>(&self, transform: impl Fn(Z) -> A + Send + Sync + 'static) -> Mailbox<Z, B>
  where
    Z: Send + 'static,
  {
    Mailbox {
      post: Arc::new(ContraMapPost::new(Arc::clone(&self.post), transform)),
      read: Arc::clone(&self.read),
    }
  }

  /// Returns a view that expands each value read from this mailbox into
  /// a whole mailbox, draining each inner mailbox to exhaustion before
  /// moving to the next.
  pub fn flat_map<D, C>(
    &self,
    expand: impl Fn(B) -> Mailbox<D, C> + Send + Sync + 'static,
  ) -> Mailbox<A, C>
  where
    D: Send + 'static,
    C: Send + 'static,
  {
    let expand = move |value| expand(value).read;
    Mailbox {
      post: Arc::clone(&self.post),
      read: Arc::new(FlatMapRead::new(Arc::clone(&self.read), Box::new(expand))),
    }
  }

  /// Returns a view that pairs each value from this mailbox with a
  /// function drawn from `functions`, yielding the application.
  ///
  /// Functions and values are consumed strictly in order; a function
  /// read ahead of its value is held until the value arrives.
  pub fn apply<D, C, G>(&self, functions: &Mailbox<D, G>) -> Mailbox<A, C>
  where
    D: Send + 'static,
    C: Send + 'static,
    G: Fn(B) -> C + Send + 'static,
  {
    Mailbox {
      post: Arc::clone(&self.post),
      read: Arc::new(ApplyRead::new(Arc::clone(&self.read), Arc::clone(&functions.read))),
    }
  }

  /// Returns a mailbox that posts into both `self` and `other` and reads
  /// from whichever has a value, alternating sides under contention.
  ///
  /// Posting is sequential: a value is offered to `other` only after
  /// `self` has accepted it, so a rejection can leave the sides uneven.
  /// Reading ends once both sides are closed.
  pub fn combine(&self, other: &Mailbox<A, B>) -> Mailbox<A, B>
  where
    A: Clone,
  {
    Mailbox {
      post: Arc::new(FanInPost::new(Arc::clone(&self.post), Arc::clone(&other.post))),
      read: Arc::new(MergeRead::new(Arc::clone(&self.read), Arc::clone(&other.read))),
    }
  }

  /// Returns a mailbox that reads from `self` until it closes, then
  /// switches to `other`. Posts go to `self` only.
  pub fn choose(&self, other: &Mailbox<A, B>) -> Mailbox<A, B> {
    Mailbox {
      post: Arc::clone(&self.post),
      read: Arc::new(ChooseRead::new(Arc::clone(&self.read), Arc::clone(&other.read))),
    }
  }
}

impl<A: Send, B: Send> Clone for Mailbox<A, B> {
  fn clone(&self) -> Self {
    Mailbox {
      post: Arc::clone(&self.post),
      read: Arc::clone(&self.read),
    }
  }
}

impl<A: Send, B: Send> core::fmt::Debug for Mailbox<A, B> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Mailbox")
      .field("closed", &(self.post.is_closed() && self.read.is_closed()))
      .finish()
  }
}

// --- Futures ---

/// Future returned by [`Mailbox::post_async`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct MailboxPostFuture<'a> {
  inner: BoxFuture<'a, Result<(), PostError>>,
}

impl Future for MailboxPostFuture<'_> {
  type Output = Result<(), PostError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.get_mut().inner.as_mut().poll(cx)
  }
}

/// Future returned by [`Mailbox::read_async`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct MailboxReadFuture<'a, B> {
  inner: BoxFuture<'a, Result<B, ReadError>>,
}

impl<B> Future for MailboxReadFuture<'_, B> {
  type Output = Result<B, ReadError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.get_mut().inner.as_mut().poll(cx)
  }
}

// --- Tests ---

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn round_trips_values_in_order() {
    let mailbox = Mailbox::new(BufferPolicy::Bounded(8));
    for i in 0..8 {
      mailbox.post_sync(i).unwrap();
    }
    for i in 0..8 {
      assert_eq!(mailbox.read_sync(), Ok(i));
    }
  }

  #[test]
  fn map_transforms_reads() {
    let numbers = Mailbox::new(BufferPolicy::Unbounded);
    let doubled = numbers.map(|v: i32| v * 2);

    numbers.post_sync(1).unwrap();
    numbers.post_sync(2).unwrap();

    assert_eq!(doubled.read_sync(), Ok(2));
    assert_eq!(doubled.read_sync(), Ok(4));
  }

  #[test]
  fn contra_map_transforms_posts() {
    let lengths: Mailbox<usize, usize> = Mailbox::new(BufferPolicy::Unbounded);
    let words = lengths.contra_map(|word: &str| word.len());

    words.post_sync("postbox").unwrap();
    assert_eq!(lengths.read_sync(), Ok(7));
  }

  #[test]
  fn views_share_the_underlying_buffer() {
    let numbers = Mailbox::new(BufferPolicy::Unbounded);
    let stringed = numbers.map(|v: i32| v.to_string());

    numbers.post_sync(1).unwrap();
    numbers.post_sync(2).unwrap();
    numbers.post_sync(3).unwrap();

    // A value read through one handle is consumed for all of them.
    assert_eq!(numbers.read_sync(), Ok(1));
    assert_eq!(stringed.read_sync(), Ok("2".to_string()));
    assert_eq!(numbers.read_sync(), Ok(3));
  }

  #[test]
  fn completing_a_view_closes_the_original() {
    let numbers: Mailbox<i32, i32> = Mailbox::new(BufferPolicy::Unbounded);
    let view = numbers.map(|v| v + 1);

    view.complete().unwrap();
    assert!(numbers.is_post_closed());
    assert!(numbers.is_read_closed());
    assert!(numbers.try_post(1).is_err());
    assert_eq!(numbers.try_read(), Err(TryReadError::Closed));
  }

  #[test]
  fn flat_map_drains_each_inner_mailbox_to_exhaustion() {
    let outer: Mailbox<i32, i32> = Mailbox::new(BufferPolicy::Unbounded);
    let flattened = outer.flat_map(|n| {
      let inner = Mailbox::new(BufferPolicy::Unbounded);
      inner.try_post(n * 10).unwrap();
      inner.try_post(n * 10 + 1).unwrap();
      inner.complete().unwrap();
      inner
    });

    outer.post_sync(1).unwrap();
    outer.post_sync(2).unwrap();
    outer.complete().unwrap();

    assert_eq!(flattened.read_sync(), Ok(10));
    assert_eq!(flattened.read_sync(), Ok(11));
    assert_eq!(flattened.read_sync(), Ok(20));
    assert_eq!(flattened.read_sync(), Ok(21));
    assert_eq!(flattened.read_sync(), Err(ReadError::Closed));
  }

  #[test]
  fn apply_pairs_functions_with_values_in_order() {
    fn times_ten(v: i32) -> i32 {
      v * 10
    }
    fn times_hundred(v: i32) -> i32 {
      v * 100
    }

    let values: Mailbox<i32, i32> = Mailbox::new(BufferPolicy::Unbounded);
    let functions: Mailbox<fn(i32) -> i32, fn(i32) -> i32> =
      Mailbox::new(BufferPolicy::Unbounded);
    let applied = values.apply(&functions);

    values.post_sync(1).unwrap();
    values.post_sync(2).unwrap();
    values.post_sync(3).unwrap();
    functions.post_sync(times_ten).unwrap();
    functions.post_sync(times_hundred).unwrap();
    functions.complete().unwrap();

    assert_eq!(applied.read_sync(), Ok(10));
    assert_eq!(applied.read_sync(), Ok(200));
    // No functions remain, so the third value is never paired.
    assert_eq!(applied.read_sync(), Err(ReadError::Closed));
  }

  #[test]
  fn apply_holds_a_function_until_its_value_arrives() {
    fn negate(v: i32) -> i32 {
      -v
    }

    let values: Mailbox<i32, i32> = Mailbox::new(BufferPolicy::Unbounded);
    let functions: Mailbox<fn(i32) -> i32, fn(i32) -> i32> =
      Mailbox::new(BufferPolicy::Unbounded);
    let applied = values.apply(&functions);

    functions.post_sync(negate).unwrap();
    assert_eq!(applied.try_read(), Err(TryReadError::Empty));

    // The function read above must not be lost.
    values.post_sync(5).unwrap();
    assert_eq!(applied.try_read(), Ok(-5));
  }

  #[test]
  fn combine_posts_to_both_sides() {
    let left = Mailbox::new(BufferPolicy::Unbounded);
    let right = Mailbox::new(BufferPolicy::Unbounded);
    let both = left.combine(&right);

    both.post_sync(7).unwrap();

    assert_eq!(left.read_sync(), Ok(7));
    assert_eq!(right.read_sync(), Ok(7));
  }

  #[test]
  fn combine_reads_from_either_side() {
    let left = Mailbox::new(BufferPolicy::Unbounded);
    let right = Mailbox::new(BufferPolicy::Unbounded);
    let both = left.combine(&right);

    left.post_sync(1).unwrap();
    right.post_sync(2).unwrap();

    let mut seen = vec![both.read_sync().unwrap(), both.read_sync().unwrap()];
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(both.try_read(), Err(TryReadError::Empty));
  }

  #[test]
  fn combined_read_ends_when_both_sides_close() {
    let left: Mailbox<i32, i32> = Mailbox::new(BufferPolicy::Unbounded);
    let right: Mailbox<i32, i32> = Mailbox::new(BufferPolicy::Unbounded);
    let both = left.combine(&right);

    left.complete().unwrap();
    right.post_sync(9).unwrap();
    right.complete().unwrap();

    assert_eq!(both.read_sync(), Ok(9));
    assert_eq!(both.read_sync(), Err(ReadError::Closed));
  }

  #[test]
  fn choose_prefers_the_first_side_until_it_closes() {
    let primary = Mailbox::new(BufferPolicy::Unbounded);
    let fallback = Mailbox::new(BufferPolicy::Unbounded);
    let chosen = primary.choose(&fallback);

    primary.post_sync(1).unwrap();
    fallback.post_sync(9).unwrap();

    assert_eq!(chosen.read_sync(), Ok(1));
    assert_eq!(chosen.try_read(), Err(TryReadError::Empty));

    primary.complete().unwrap();
    assert_eq!(chosen.read_sync(), Ok(9));

    fallback.complete().unwrap();
    assert_eq!(chosen.read_sync(), Err(ReadError::Closed));
  }

  #[test]
  fn try_post_reports_full_on_a_bounded_mailbox() {
    let mailbox = Mailbox::new(BufferPolicy::Single);
    mailbox.try_post(1).unwrap();
    assert_eq!(mailbox.try_post(2), Err(TryPostRejection::Full));
  }

  #[test]
  fn failure_propagates_through_a_mapped_view() {
    let numbers: Mailbox<i32, i32> = Mailbox::new(BufferPolicy::Unbounded);
    let doubled = numbers.map(|v| v * 2);

    numbers.post_sync(4).unwrap();
    numbers.fail(Failure::new("sensor offline")).unwrap();

    assert_eq!(doubled.read_sync(), Ok(8));
    assert_eq!(
      doubled.read_sync(),
      Err(ReadError::Failed(Failure::new("sensor offline")))
    );
  }

  #[test]
  fn post_sync_parks_until_a_reader_drains() {
    let mailbox = Mailbox::new(BufferPolicy::Single);
    mailbox.post_sync(1).unwrap();

    let writer = {
      let mailbox = mailbox.clone();
      thread::spawn(move || mailbox.post_sync(2))
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(mailbox.read_sync(), Ok(1));
    writer.join().unwrap().unwrap();
    assert_eq!(mailbox.read_sync(), Ok(2));
  }
}
