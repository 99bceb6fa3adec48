// tests/channel_async.rs

mod common;
use common::*;

use futures_util::StreamExt;
use postbox::error::{PostError, ReadError, TryReadError};
use postbox::{channel, BufferPolicy, Failure};
use tokio::time::timeout;

#[tokio::test]
async fn async_round_trip() {
  let (inbox, outbox) = channel(BufferPolicy::Bounded(4));

  inbox.post_async("hello").await.unwrap();
  let received = timeout(SHORT_TIMEOUT, outbox.read_async()).await.unwrap();
  assert_eq!(received, Ok("hello"));
}

#[tokio::test]
async fn async_read_pends_until_a_value_arrives() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);

  // Nothing posted yet, so the read must pend.
  let pending = timeout(SHORT_TIMEOUT / 10, outbox.read_async()).await;
  assert!(pending.is_err(), "read should have timed out");

  let writer = tokio::spawn(async move {
    tokio::time::sleep(SHORT_TIMEOUT / 10).await;
    inbox.post_async(7).await.unwrap();
  });

  assert_eq!(timeout(LONG_TIMEOUT, outbox.read_async()).await.unwrap(), Ok(7));
  writer.await.unwrap();
}

#[tokio::test]
async fn async_post_pends_until_a_reader_drains() {
  let (inbox, outbox) = channel(BufferPolicy::Single);
  inbox.post_async(1).await.unwrap();

  // Buffer full, the second post must pend.
  let pending = timeout(SHORT_TIMEOUT / 10, inbox.post_async(2)).await;
  assert!(pending.is_err(), "post should have timed out");

  let reader = tokio::spawn(async move {
    tokio::time::sleep(SHORT_TIMEOUT / 10).await;
    assert_eq!(outbox.read_async().await, Ok(1));
    assert_eq!(outbox.read_async().await, Ok(2));
  });

  timeout(LONG_TIMEOUT, inbox.post_async(2))
    .await
    .unwrap()
    .unwrap();
  reader.await.unwrap();
}

#[tokio::test]
async fn dropping_an_unpolled_post_abandons_the_value() {
  let (inbox, outbox) = channel::<i32>(BufferPolicy::Unbounded);

  // Post futures are lazy; dropping one without polling posts nothing.
  drop(inbox.post_async(99));
  assert_eq!(outbox.try_read(), Err(TryReadError::Empty));

  inbox.post_async(1).await.unwrap();
  assert_eq!(outbox.try_read(), Ok(1));
}

#[tokio::test]
async fn async_post_fails_once_closed() {
  let (inbox, outbox) = channel::<i32>(BufferPolicy::Unbounded);
  drop(outbox);

  assert_eq!(inbox.post_async(1).await, Err(PostError::Closed));
}

#[tokio::test]
async fn stream_yields_values_then_ends() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);

  let writer = tokio::spawn(async move {
    for i in 0..ITEMS_LOW {
      inbox.post_async(i).await.unwrap();
    }
    inbox.complete().unwrap();
  });

  let collected: Vec<usize> = outbox.collect().await;
  let expected: Vec<usize> = (0..ITEMS_LOW).collect();
  assert_eq!(collected, expected);
  writer.await.unwrap();
}

#[tokio::test]
async fn stream_ends_on_failure_too() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);
  inbox.post_async(1).await.unwrap();
  inbox.fail(Failure::new("boom")).unwrap();

  let mut outbox = outbox;
  assert_eq!(outbox.next().await, Some(1));
  // A failed channel ends the stream; the reason stays available on the
  // error-returning reads.
  assert_eq!(outbox.next().await, None);
  assert_eq!(
    outbox.try_read(),
    Err(TryReadError::Failed(Failure::new("boom")))
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_many_posters_one_reader() {
  const POSTERS: usize = 4;

  let (inbox, outbox) = channel(BufferPolicy::Bounded(8));
  let mut writers = Vec::new();

  for p in 0..POSTERS {
    let inbox = inbox.clone();
    writers.push(tokio::spawn(async move {
      for i in 0..ITEMS_MEDIUM {
        inbox.post_async(p * ITEMS_MEDIUM + i).await.unwrap();
      }
    }));
  }
  drop(inbox);

  let reader = tokio::spawn(async move {
    let mut seen = Vec::with_capacity(POSTERS * ITEMS_MEDIUM);
    while let Ok(value) = outbox.read_async().await {
      seen.push(value);
    }
    seen
  });

  for writer in writers {
    writer.await.unwrap();
  }
  let mut seen = timeout(STRESS_TIMEOUT, reader).await.unwrap().unwrap();
  seen.sort_unstable();
  let expected: Vec<usize> = (0..POSTERS * ITEMS_MEDIUM).collect();
  assert_eq!(seen, expected);
}

#[tokio::test]
async fn mixed_sync_poster_async_reader() {
  let (inbox, outbox) = channel(BufferPolicy::Bounded(4));

  let writer = tokio::task::spawn_blocking(move || {
    for i in 0..ITEMS_LOW {
      inbox.post_sync(i).unwrap();
    }
    inbox.complete().unwrap();
  });

  let mut seen = Vec::new();
  while let Ok(value) = outbox.read_async().await {
    seen.push(value);
  }
  let expected: Vec<usize> = (0..ITEMS_LOW).collect();
  assert_eq!(seen, expected);
  writer.await.unwrap();
}

#[tokio::test]
async fn mixed_async_poster_sync_reader() {
  let (inbox, outbox) = channel(BufferPolicy::Bounded(4));

  let writer = tokio::spawn(async move {
    for i in 0..ITEMS_LOW {
      inbox.post_async(i).await.unwrap();
    }
    inbox.complete().unwrap();
  });

  let reader = tokio::task::spawn_blocking(move || {
    let mut seen = Vec::new();
    while let Ok(value) = outbox.read_sync() {
      seen.push(value);
    }
    seen
  });

  let seen = reader.await.unwrap();
  let expected: Vec<usize> = (0..ITEMS_LOW).collect();
  assert_eq!(seen, expected);
  writer.await.unwrap();
}

#[tokio::test]
async fn failure_reaches_async_reader_after_drain() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);

  inbox.post_async(1).await.unwrap();
  inbox.fail(Failure::new("async boom")).unwrap();

  assert_eq!(outbox.read_async().await, Ok(1));
  assert_eq!(
    outbox.read_async().await,
    Err(ReadError::Failed(Failure::new("async boom")))
  );
}
