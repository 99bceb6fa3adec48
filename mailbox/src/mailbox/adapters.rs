// src/mailbox/adapters.rs

//! The adapter types behind the mailbox combinators. Each one wraps the
//! posting or reading half of existing mailboxes; none owns a buffer of
//! its own, so combinators never copy or re-order values in flight.

use super::{PostSink, ReadSource};
use crate::error::{
  CompleteError, Failure, PostError, ReadError, TryPostRejection, TryReadError,
};

use futures_util::future::{self, BoxFuture, Either};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// --- Map ---

pub(crate) struct MapRead<B, C, F> {
  inner: Arc<dyn ReadSource<B>>,
  transform: F,
  _types: PhantomData<fn(B) -> C>,
}

impl<B, C, F> MapRead<B, C, F> {
  pub(crate) fn new(inner: Arc<dyn ReadSource<B>>, transform: F) -> Self {
    MapRead {
      inner,
      transform,
      _types: PhantomData,
    }
  }
}

impl<B, C, F> ReadSource<C> for MapRead<B, C, F>
where
  B: Send + 'static,
  C: Send,
  F: Fn(B) -> C + Send + Sync,
{
  fn try_read(&self) -> Result<C, TryReadError> {
    self.inner.try_read().map(&self.transform)
  }

  fn read(&self) -> BoxFuture<'_, Result<C, ReadError>> {
    Box::pin(async move { self.inner.read().await.map(&self.transform) })
  }

  fn is_closed(&self) -> bool {
    self.inner.is_closed()
  }
}

// --- ContraMap ---

pub(crate) struct ContraMapPost<Z, A, F> {
  inner: Arc<dyn PostSink<A>>,
  transform: F,
  _types: PhantomData<fn(Z) -> A>,
}

impl<Z, A, F> ContraMapPost<Z, A, F> {
  pub(crate) fn new(inner: Arc<dyn PostSink<A>>, transform: F) -> Self {
    ContraMapPost {
      inner,
      transform,
      _types: PhantomData,
    }
  }
}

impl<Z, A, F> PostSink<Z> for ContraMapPost<Z, A, F>
where
  Z: Send,
  A: Send + 'static,
  F: Fn(Z) -> A + Send + Sync,
{
  fn try_post(&self, value: Z) -> Result<(), TryPostRejection> {
    self.inner.try_post((self.transform)(value))
  }

  fn post(&self, value: Z) -> BoxFuture<'_, Result<(), PostError>> {
    self.inner.post((self.transform)(value))
  }

  fn complete(&self) -> Result<(), CompleteError> {
    self.inner.complete()
  }

  fn fail(&self, failure: Failure) -> Result<(), CompleteError> {
    self.inner.fail(failure)
  }

  fn is_closed(&self) -> bool {
    self.inner.is_closed()
  }
}

// --- FlatMap ---

pub(crate) struct FlatMapRead<B, C> {
  outer: Arc<dyn ReadSource<B>>,
  expand: Box<dyn Fn(B) -> Arc<dyn ReadSource<C>> + Send + Sync>,
  /// Inner sequence currently being drained; reads return to the outer
  /// source once it closes.
  current: Mutex<Option<Arc<dyn ReadSource<C>>>>,
}

impl<B, C> FlatMapRead<B, C> {
  pub(crate) fn new(
    outer: Arc<dyn ReadSource<B>>,
    expand: Box<dyn Fn(B) -> Arc<dyn ReadSource<C>> + Send + Sync>,
  ) -> Self {
    FlatMapRead {
      outer,
      expand,
      current: Mutex::new(None),
    }
  }

  fn clear_exhausted(&self, exhausted: &Arc<dyn ReadSource<C>>) {
    let mut current = self.current.lock();
    if current.as_ref().map_or(false, |c| Arc::ptr_eq(c, exhausted)) {
      *current = None;
    }
  }
}

impl<B: Send + 'static, C: Send + 'static> ReadSource<C> for FlatMapRead<B, C> {
  fn try_read(&self) -> Result<C, TryReadError> {
    loop {
      let current = self.current.lock().clone();
      match current {
        Some(source) => match source.try_read() {
          Ok(value) => return Ok(value),
          Err(TryReadError::Closed) => self.clear_exhausted(&source),
          Err(other) => return Err(other),
        },
        None => match self.outer.try_read() {
          Ok(value) => *self.current.lock() = Some((self.expand)(value)),
          Err(err) => return Err(err),
        },
      }
    }
  }

  fn read(&self) -> BoxFuture<'_, Result<C, ReadError>> {
    Box::pin(async move {
      loop {
        let current = self.current.lock().clone();
        match current {
          Some(source) => match source.read().await {
            Ok(value) => return Ok(value),
            Err(ReadError::Closed) => self.clear_exhausted(&source),
            Err(failed) => return Err(failed),
          },
          None => {
            let value = self.outer.read().await?;
            *self.current.lock() = Some((self.expand)(value));
          }
        }
      }
    })
  }

  fn is_closed(&self) -> bool {
    self.outer.is_closed()
      && self.current.lock().as_ref().map_or(true, |c| c.is_closed())
  }
}

// --- Apply ---

pub(crate) struct ApplyRead<B, C, G> {
  values: Arc<dyn ReadSource<B>>,
  functions: Arc<dyn ReadSource<G>>,
  /// Functions read ahead of their value, held in take order for the
  /// next pairings.
  pending: Mutex<VecDeque<G>>,
  _out: PhantomData<fn() -> C>,
}

impl<B, C, G> ApplyRead<B, C, G> {
  pub(crate) fn new(values: Arc<dyn ReadSource<B>>, functions: Arc<dyn ReadSource<G>>) -> Self {
    ApplyRead {
      values,
      functions,
      pending: Mutex::new(VecDeque::new()),
      _out: PhantomData,
    }
  }
}

/// A function taken for a pairing that has not happened yet. Dropping the
/// holder puts the function back at the head of the stash, so a read
/// abandoned between its two awaits never loses one.
struct HeldFunction<'a, G> {
  pending: &'a Mutex<VecDeque<G>>,
  function: Option<G>,
}

impl<'a, G> HeldFunction<'a, G> {
  fn pair(mut self) -> G {
    self.function.take().expect("held function already paired")
  }
}

impl<G> Drop for HeldFunction<'_, G> {
  fn drop(&mut self) {
    if let Some(function) = self.function.take() {
      self.pending.lock().push_front(function);
    }
  }
}

impl<B, C, G> ReadSource<C> for ApplyRead<B, C, G>
where
  B: Send + 'static,
  C: Send,
  G: Fn(B) -> C + Send + 'static,
{
  fn try_read(&self) -> Result<C, TryReadError> {
    let stashed = self.pending.lock().pop_front();
    let function = match stashed {
      Some(function) => function,
      None => self.functions.try_read()?,
    };
    match self.values.try_read() {
      Ok(value) => Ok(function(value)),
      Err(err) => {
        self.pending.lock().push_front(function);
        Err(err)
      }
    }
  }

  fn read(&self) -> BoxFuture<'_, Result<C, ReadError>> {
    Box::pin(async move {
      // The stash lock must not ride across an await.
      let stashed = self.pending.lock().pop_front();
      let function = match stashed {
        Some(function) => function,
        None => self.functions.read().await?,
      };
      let held = HeldFunction {
        pending: &self.pending,
        function: Some(function),
      };
      let value = self.values.read().await?;
      Ok((held.pair())(value))
    })
  }

  fn is_closed(&self) -> bool {
    self.values.is_closed()
      || (self.functions.is_closed() && self.pending.lock().is_empty())
  }
}

// --- Combine: posting half ---

pub(crate) struct FanInPost<A> {
  first: Arc<dyn PostSink<A>>,
  second: Arc<dyn PostSink<A>>,
}

impl<A> FanInPost<A> {
  pub(crate) fn new(first: Arc<dyn PostSink<A>>, second: Arc<dyn PostSink<A>>) -> Self {
    FanInPost { first, second }
  }
}

impl<A: Send + Clone + 'static> PostSink<A> for FanInPost<A> {
  /// Sequential, not transactional: the second sink is attempted only
  /// once the first has accepted.
  fn try_post(&self, value: A) -> Result<(), TryPostRejection> {
    self.first.try_post(value.clone())?;
    self.second.try_post(value)
  }

  fn post(&self, value: A) -> BoxFuture<'_, Result<(), PostError>> {
    Box::pin(async move {
      self.first.post(value.clone()).await?;
      self.second.post(value).await
    })
  }

  fn complete(&self) -> Result<(), CompleteError> {
    let first = self.first.complete();
    let second = self.second.complete();
    first.or(second)
  }

  fn fail(&self, failure: Failure) -> Result<(), CompleteError> {
    let first = self.first.fail(failure.clone());
    let second = self.second.fail(failure);
    first.or(second)
  }

  fn is_closed(&self) -> bool {
    self.first.is_closed() || self.second.is_closed()
  }
}

// --- Combine: reading half ---

pub(crate) struct MergeRead<B> {
  first: Arc<dyn ReadSource<B>>,
  second: Arc<dyn ReadSource<B>>,
  /// Alternates which side is tried first, so a busy side cannot starve
  /// the other.
  flip: AtomicBool,
}

impl<B> MergeRead<B> {
  pub(crate) fn new(first: Arc<dyn ReadSource<B>>, second: Arc<dyn ReadSource<B>>) -> Self {
    MergeRead {
      first,
      second,
      flip: AtomicBool::new(false),
    }
  }
}

impl<B: Send + 'static> ReadSource<B> for MergeRead<B> {
  fn try_read(&self) -> Result<B, TryReadError> {
    let first_turn = !self.flip.fetch_xor(true, Ordering::Relaxed);
    let (lead, trail) = if first_turn {
      (&self.first, &self.second)
    } else {
      (&self.second, &self.first)
    };

    let lead_err = match lead.try_read() {
      Ok(value) => return Ok(value),
      Err(TryReadError::Failed(failure)) => return Err(TryReadError::Failed(failure)),
      Err(err) => err,
    };
    match trail.try_read() {
      Ok(value) => Ok(value),
      Err(TryReadError::Failed(failure)) => Err(TryReadError::Failed(failure)),
      Err(trail_err) => {
        // The merge only ends once both sides have closed.
        if lead_err == TryReadError::Closed && trail_err == TryReadError::Closed {
          Err(TryReadError::Closed)
        } else {
          Err(TryReadError::Empty)
        }
      }
    }
  }

  fn read(&self) -> BoxFuture<'_, Result<B, ReadError>> {
    Box::pin(async move {
      let first_turn = !self.flip.fetch_xor(true, Ordering::Relaxed);
      let (lead, trail) = if first_turn {
        (&self.first, &self.second)
      } else {
        (&self.second, &self.first)
      };

      match future::select(lead.read(), trail.read()).await {
        Either::Left((result, other)) | Either::Right((result, other)) => match result {
          Ok(value) => Ok(value),
          // One side closing hands the read over to the other.
          Err(ReadError::Closed) => other.await,
          Err(failed) => Err(failed),
        },
      }
    })
  }

  fn is_closed(&self) -> bool {
    self.first.is_closed() && self.second.is_closed()
  }
}

// --- Choose ---

pub(crate) struct ChooseRead<B> {
  first: Arc<dyn ReadSource<B>>,
  second: Arc<dyn ReadSource<B>>,
  /// Set once the first side closes; reads then come from the second
  /// side only.
  moved_on: AtomicBool,
}

impl<B> ChooseRead<B> {
  pub(crate) fn new(first: Arc<dyn ReadSource<B>>, second: Arc<dyn ReadSource<B>>) -> Self {
    ChooseRead {
      first,
      second,
      moved_on: AtomicBool::new(false),
    }
  }
}

impl<B: Send + 'static> ReadSource<B> for ChooseRead<B> {
  fn try_read(&self) -> Result<B, TryReadError> {
    if !self.moved_on.load(Ordering::Acquire) {
      match self.first.try_read() {
        Err(TryReadError::Closed) => self.moved_on.store(true, Ordering::Release),
        other => return other,
      }
    }
    self.second.try_read()
  }

  fn read(&self) -> BoxFuture<'_, Result<B, ReadError>> {
    Box::pin(async move {
      if !self.moved_on.load(Ordering::Acquire) {
        match self.first.read().await {
          Err(ReadError::Closed) => self.moved_on.store(true, Ordering::Release),
          other => return other,
        }
      }
      self.second.read().await
    })
  }

  fn is_closed(&self) -> bool {
    self.first.is_closed() && self.second.is_closed()
  }
}
