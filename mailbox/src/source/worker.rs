// src/source/worker.rs

use super::shared::{SourceEvent, SourceShared};
use crate::telemetry;

use std::sync::atomic::Ordering;
use std::sync::Arc;

const LOC_WORKER: &str = "SourceWorker";
const CTR_DELIVERED: &str = "DeliveredValues";
const CTR_DROPPED: &str = "DroppedAfterCompletion";

/// The source's only consumer. Drains the journal in order, fans values
/// out to the current subscriber set, and after the completion sentinel
/// stays alive just long enough for every subscriber to finish draining.
pub(crate) fn run<T: Send + Clone + 'static>(shared: Arc<SourceShared<T>>) {
  shared.register_worker_thread();
  let mut completing = false;

  loop {
    while let Some(event) = shared.queue.pop() {
      shared.queue_len.fetch_sub(1, Ordering::Relaxed);
      match event {
        SourceEvent::Value(value) => {
          if completing {
            // A post raced past the stage check after the sentinel was
            // enqueued. Those values are not delivered.
            telemetry::increment_counter(LOC_WORKER, CTR_DROPPED);
            drop(value);
          } else {
            shared.fan_out(value);
            telemetry::increment_counter(LOC_WORKER, CTR_DELIVERED);
          }
        }
        SourceEvent::Complete => completing = true,
      }
    }

    if completing {
      shared.begin_draining();
      if shared.subscriber_count.load(Ordering::Acquire) == 0 {
        shared.finalize();
        return;
      }
    }

    shared.park_worker(completing);
  }
}
