//! Policy-driven mailboxes and broadcast sources for Rust.
//!
//! Postbox provides in-process messaging primitives built around explicit
//! buffer policies: point-to-point channels and composable mailboxes for
//! pipelines, and broadcast sources that fan one ordered journal out to
//! every subscriber. All blocking operations come in `try_`, `_sync` and
//! `_async` flavors, usable from plain threads and async tasks alike.

pub mod channel;
pub mod error;
pub mod mailbox;
pub mod policy;
pub mod source;
pub mod telemetry;

// Internal utilities - not part of public API but exposed for crate use
mod internal;

#[cfg(feature = "cancel")]
mod cancel;

// Public re-exports for convenience
pub use channel::{channel, Inbox, Outbox, PostFuture, ReadFuture};
pub use error::{
  CompleteError, Failure, PostError, ReadError, ReadErrorTimeout, RecvError, RecvErrorTimeout,
  SourceCompleted, TryPostError, TryPostRejection, TryReadError, TryRecvError,
};
pub use mailbox::{Mailbox, MailboxPostFuture, MailboxReadFuture};
pub use policy::BufferPolicy;
pub use source::{CompleteFuture, RecvFuture, Source, Subscription};
