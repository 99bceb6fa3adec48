// src/cancel.rs

//! Bridges external cancellation into source completion.
//!
//! Binding a [`CancellationToken`] to a [`Source`] completes the source
//! when the token fires, exactly as if a handle had requested completion.
//! Each binding spawns one watcher task; the source releases all of its
//! watchers when it finalizes, so bindings never outlive the broadcast.

use crate::source::Source;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

impl<T: Send + Clone + 'static> Source<T> {
  /// Requests completion of this source when `token` is cancelled.
  ///
  /// Spawns a watcher on the current Tokio runtime and must therefore be
  /// called from within one. The watcher exits when the token fires or
  /// when the source finalizes, whichever happens first. Cancelling the
  /// token after the source has completed is a no-op.
  pub fn bind_cancellation(&self, token: CancellationToken) {
    if self.is_completed() {
      return;
    }

    let stop = CancellationToken::new();
    self.shared.watcher_stops.lock().push(stop.clone());

    // The worker may have finalized and drained the stop list between the
    // check above and the push. Fire the stop here so the watcher cannot
    // outlive the source.
    if self.is_completed() {
      stop.cancel();
    }

    // Weak reference: an unfired binding must not keep the source alive.
    let shared = Arc::downgrade(&self.shared);
    tokio::spawn(async move {
      tokio::select! {
        _ = token.cancelled() => {
          if let Some(shared) = shared.upgrade() {
            let _ = shared.request_complete();
          }
        }
        _ = stop.cancelled() => {}
      }
    });
  }
}
