// src/channel/mod.rs

//! A policy-driven channel connecting an [`Inbox`] (writer) to an
//! [`Outbox`] (reader).
//!
//! A channel is created from a [`BufferPolicy`](crate::BufferPolicy) that
//! fixes its buffering behavior for life: unbounded growth, bounded with
//! writer backpressure, or bounded with oldest-value eviction. See the
//! policy type for the full list.
//!
//! ## Behavior
//!
//! - **Hybrid operations**: Every operation comes in a non-blocking `try_`
//!   form, a thread-parking `_sync` form, and a lazy `_async` future form,
//!   so synchronous and asynchronous code can share one channel freely.
//! - **Graceful close**: `complete` and `fail` stop new posts immediately
//!   but leave buffered values readable. Readers observe the close reason
//!   only once the buffer has drained.
//! - **Handle-driven lifecycle**: Dropping the last `Inbox` completes the
//!   channel; dropping the last `Outbox` closes it and discards the buffer,
//!   since no reader will ever come.
//! - **Order**: Values are always read in post order. Eviction under a
//!   sliding policy discards the oldest value, never reorders.
//!
//! # Examples
//!
//! ```
//! use postbox::{channel, BufferPolicy};
//! use std::thread;
//!
//! let (inbox, outbox) = channel::<String>(BufferPolicy::Bounded(4));
//!
//! let writer = thread::spawn(move || {
//!     inbox.post_sync("hello".to_string()).unwrap();
//!     inbox.post_sync("world".to_string()).unwrap();
//!     // Dropping the last inbox completes the channel.
//! });
//!
//! assert_eq!(outbox.read_sync().unwrap(), "hello");
//! assert_eq!(outbox.read_sync().unwrap(), "world");
//! assert!(outbox.read_sync().is_err());
//! writer.join().unwrap();
//! ```
//!
//! ```
//! use postbox::{channel, BufferPolicy};
//!
//! // Sliding policy: the newest two values win.
//! let (inbox, outbox) = channel::<i32>(BufferPolicy::Newest(2));
//! inbox.try_post(1).unwrap();
//! inbox.try_post(2).unwrap();
//! inbox.try_post(3).unwrap();
//! assert_eq!(outbox.try_read().unwrap(), 2);
//! assert_eq!(outbox.try_read().unwrap(), 3);
//! ```

mod inbox;
mod outbox;
mod shared;

pub use inbox::{Inbox, PostFuture};
pub use outbox::{Outbox, ReadFuture};

pub(crate) use shared::ChannelShared;

use crate::policy::BufferPolicy;
use std::sync::Arc;

/// Creates a channel governed by `policy`, returning its writer and reader
/// halves.
pub fn channel<T: Send>(policy: BufferPolicy<T>) -> (Inbox<T>, Outbox<T>) {
  let shared = Arc::new(ChannelShared::new(policy));
  (
    Inbox {
      shared: Arc::clone(&shared),
    },
    Outbox { shared },
  )
}
