// src/internal/block_on.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
  fn wake(self: Arc<Self>) {
    self.0.unpark();
  }

  fn wake_by_ref(self: &Arc<Self>) {
    self.0.unpark();
  }
}

/// Drives `future` to completion on the calling thread, parking between
/// polls. Spurious unparks only cost a re-poll.
pub(crate) fn block_on<F: Future + Unpin>(mut future: F) -> F::Output {
  let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
  let mut cx = Context::from_waker(&waker);
  loop {
    match Pin::new(&mut future).poll(&mut cx) {
      Poll::Ready(output) => return output,
      Poll::Pending => thread::park(),
    }
  }
}
