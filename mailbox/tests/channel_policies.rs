// tests/channel_policies.rs

mod common;
use common::*;

use postbox::error::{ReadError, ReadErrorTimeout, TryPostError, TryReadError};
use postbox::{channel, BufferPolicy, Failure};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn unbounded_accepts_bursts_without_blocking() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);

  for i in 0..ITEMS_HIGH {
    inbox.try_post(i).unwrap();
  }
  for i in 0..ITEMS_HIGH {
    assert_eq!(outbox.try_read(), Ok(i));
  }
  assert_eq!(outbox.try_read(), Err(TryReadError::Empty));
}

#[test]
fn bounded_rejects_try_post_at_capacity() {
  let (inbox, _outbox) = channel(BufferPolicy::Bounded(4));

  for i in 0..4 {
    inbox.try_post(i).unwrap();
  }
  assert_eq!(inbox.try_post(99), Err(TryPostError::Full(99)));
}

#[test]
fn bounded_post_resumes_when_a_reader_drains() {
  let (inbox, outbox) = channel(BufferPolicy::Bounded(2));
  inbox.try_post(0).unwrap();
  inbox.try_post(1).unwrap();

  let writer = thread::spawn(move || {
    // Full buffer, so this parks until the reader makes room.
    inbox.post_sync(2).unwrap();
  });

  thread::sleep(SHORT_TIMEOUT / 10);
  assert_eq!(outbox.read_sync(), Ok(0));

  writer.join().unwrap();
  assert_eq!(outbox.read_sync(), Ok(1));
  assert_eq!(outbox.read_sync(), Ok(2));
}

#[test]
fn single_holds_exactly_one_value() {
  let (inbox, outbox) = channel(BufferPolicy::Single);

  inbox.try_post("only").unwrap();
  assert_eq!(inbox.try_post("too many"), Err(TryPostError::Full("too many")));
  assert_eq!(inbox.capacity(), Some(1));

  assert_eq!(outbox.try_read(), Ok("only"));
  inbox.try_post("next").unwrap();
  assert_eq!(outbox.try_read(), Ok("next"));
}

#[test]
fn latest_starts_seeded_and_overwrites() {
  let (inbox, outbox) = channel(BufferPolicy::Latest(0));

  // The seed is readable before anything is posted.
  assert_eq!(outbox.try_read(), Ok(0));
  assert_eq!(outbox.try_read(), Err(TryReadError::Empty));

  // Posts never block; only the most recent value survives.
  for i in 1..=5 {
    inbox.try_post(i).unwrap();
  }
  assert_eq!(outbox.try_read(), Ok(5));
}

#[test]
fn newest_keeps_the_most_recent_values() {
  let (inbox, outbox) = channel(BufferPolicy::Newest(3));

  for i in 0..6 {
    inbox.try_post(i).unwrap();
  }

  assert_eq!(outbox.try_read(), Ok(3));
  assert_eq!(outbox.try_read(), Ok(4));
  assert_eq!(outbox.try_read(), Ok(5));
  assert_eq!(outbox.try_read(), Err(TryReadError::Empty));
}

#[test]
fn new_keeps_only_the_newest_value() {
  let (inbox, outbox) = channel(BufferPolicy::New);

  inbox.try_post(1).unwrap();
  inbox.try_post(2).unwrap();
  inbox.try_post(3).unwrap();

  assert_eq!(outbox.try_read(), Ok(3));
  assert_eq!(outbox.try_read(), Err(TryReadError::Empty));
}

#[test]
#[should_panic]
fn bounded_zero_capacity_panics() {
  let (_inbox, _outbox) = channel::<i32>(BufferPolicy::Bounded(0));
}

#[test]
#[should_panic]
fn newest_zero_capacity_panics() {
  let (_inbox, _outbox) = channel::<i32>(BufferPolicy::Newest(0));
}

#[test]
fn complete_lets_buffered_values_drain() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);

  inbox.try_post(1).unwrap();
  inbox.try_post(2).unwrap();
  inbox.complete().unwrap();

  assert_eq!(inbox.try_post(3), Err(TryPostError::Closed(3)));
  assert_eq!(outbox.read_sync(), Ok(1));
  assert_eq!(outbox.read_sync(), Ok(2));
  assert_eq!(outbox.read_sync(), Err(ReadError::Closed));
}

#[test]
fn fail_surfaces_the_reason_after_the_drain() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);

  inbox.try_post(1).unwrap();
  inbox.fail(Failure::new("upstream died")).unwrap();

  assert_eq!(outbox.read_sync(), Ok(1));
  assert_eq!(
    outbox.read_sync(),
    Err(ReadError::Failed(Failure::new("upstream died")))
  );
  // The failure is sticky.
  assert_eq!(
    outbox.try_read(),
    Err(TryReadError::Failed(Failure::new("upstream died")))
  );
}

#[test]
fn read_timeout_expires_then_sees_a_late_value() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);

  assert_eq!(
    outbox.read_timeout_sync(SHORT_TIMEOUT / 10),
    Err(ReadErrorTimeout::Timeout)
  );

  let writer = thread::spawn(move || {
    thread::sleep(SHORT_TIMEOUT / 10);
    inbox.post_sync(42).unwrap();
  });

  assert_eq!(outbox.read_timeout_sync(LONG_TIMEOUT), Ok(42));
  writer.join().unwrap();
}

#[test]
fn many_posters_one_reader_loses_nothing() {
  const POSTERS: usize = 4;

  let (inbox, outbox) = channel(BufferPolicy::Bounded(8));
  let barrier = Arc::new(Barrier::new(POSTERS));
  let mut writers = Vec::new();

  for p in 0..POSTERS {
    let inbox = inbox.clone();
    let barrier = barrier.clone();
    writers.push(thread::spawn(move || {
      barrier.wait();
      for i in 0..ITEMS_MEDIUM {
        inbox.post_sync(p * ITEMS_MEDIUM + i).unwrap();
      }
    }));
  }
  // The clones above keep the channel open; this handle is done posting.
  drop(inbox);

  let reader = thread::spawn(move || {
    let mut seen = Vec::with_capacity(POSTERS * ITEMS_MEDIUM);
    while let Ok(value) = outbox.read_sync() {
      seen.push(value);
    }
    seen
  });

  for writer in writers {
    writer.join().unwrap();
  }
  let mut seen = reader.join().unwrap();
  seen.sort_unstable();
  let expected: Vec<usize> = (0..POSTERS * ITEMS_MEDIUM).collect();
  assert_eq!(seen, expected);
}

#[test]
fn per_poster_order_is_preserved() {
  let (inbox, outbox) = channel(BufferPolicy::Bounded(4));

  let writer = {
    let inbox = inbox.clone();
    thread::spawn(move || {
      for i in 0..ITEMS_LOW {
        inbox.post_sync(i).unwrap();
      }
    })
  };
  drop(inbox);

  let mut previous = None;
  while let Ok(value) = outbox.read_sync() {
    if let Some(previous) = previous {
      assert!(value > previous, "{value} arrived after {previous}");
    }
    previous = Some(value);
  }
  writer.join().unwrap();
}

#[test]
fn dropping_every_outbox_stops_posters() {
  let (inbox, outbox) = channel(BufferPolicy::Unbounded);
  inbox.try_post(1).unwrap();
  drop(outbox);

  // No reader can ever drain the buffer now.
  assert_eq!(inbox.try_post(2), Err(TryPostError::Closed(2)));
  assert!(inbox.is_closed());
}

#[test]
fn handle_counts_track_clones() {
  let (inbox, outbox) = channel::<i32>(BufferPolicy::Unbounded);
  assert_eq!(inbox.inbox_count(), 1);
  assert_eq!(outbox.outbox_count(), 1);

  let inbox2 = inbox.clone();
  let outbox2 = outbox.clone();
  assert_eq!(inbox.inbox_count(), 2);
  assert_eq!(outbox.outbox_count(), 2);

  drop(inbox2);
  drop(outbox2);
  assert_eq!(inbox.inbox_count(), 1);
  assert_eq!(outbox.outbox_count(), 1);
  assert!(!inbox.is_closed());
}
