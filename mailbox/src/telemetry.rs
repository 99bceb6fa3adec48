// src/telemetry.rs

//! Debug-only event/counter collection, compiled in behind the `telemetry`
//! feature. When the feature is off every instrumentation call is an
//! `#[inline(always)]` no-op.

#[cfg(feature = "telemetry")]
pub mod enabled {
  use std::collections::HashMap;
  use std::fmt;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::thread::{self, ThreadId};
  use std::time::Instant;

  static NEXT_EVENT_SEQUENCE_ID: AtomicUsize = AtomicUsize::new(0);

  #[derive(Clone)]
  pub struct TelemetryEvent {
    /// Global sequence number, for ordering events with close timestamps.
    pub seq_id: usize,
    pub timestamp: Instant,
    pub os_thread_id: ThreadId,
    /// Optional id of the data item involved (subscriber id, value index).
    pub item_id: Option<usize>,
    /// Code location, e.g. `module::function`.
    pub location: String,
    pub event_type: String,
    pub message: Option<String>,
  }

  impl fmt::Debug for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TelemetryEvent")
        .field("seq", &self.seq_id)
        .field("os_tid", &self.os_thread_id)
        .field("item_id", &self.item_id)
        .field("loc", &self.location)
        .field("evt", &self.event_type)
        .field("msg", &self.message.as_deref().unwrap_or(""))
        .finish()
    }
  }

  type CounterKey = (String, String); // (location, counter_name)

  struct CollectorData {
    events: Vec<TelemetryEvent>,
    counters: HashMap<CounterKey, usize>,
    start_time: Instant,
  }

  impl CollectorData {
    fn new() -> Self {
      CollectorData {
        events: Vec::new(),
        counters: HashMap::new(),
        start_time: Instant::now(),
      }
    }
  }

  lazy_static::lazy_static! {
      static ref GLOBAL_COLLECTOR: Mutex<CollectorData> = Mutex::new(CollectorData::new());
  }

  pub fn log_event_fn(
    item_id: Option<usize>,
    location: &str,
    event_type: &str,
    message: Option<String>,
  ) {
    let event = TelemetryEvent {
      seq_id: NEXT_EVENT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed),
      timestamp: Instant::now(),
      os_thread_id: thread::current().id(),
      item_id,
      location: location.to_string(),
      event_type: event_type.to_string(),
      message,
    };

    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      collector.events.push(event);
    } else {
      eprintln!("[TELEMETRY ERROR] Global collector mutex poisoned while recording event.");
    }
  }

  pub fn increment_counter_fn(location: &'static str, counter_name: &str) {
    let key = (location.to_string(), counter_name.to_string());
    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      *collector.counters.entry(key).or_insert(0) += 1;
    } else {
      eprintln!("[TELEMETRY ERROR] Global collector mutex poisoned while incrementing counter.");
    }
  }

  /// Snapshot of a single counter, for assertions in diagnostics tests.
  pub fn counter_value_fn(location: &str, counter_name: &str) -> usize {
    GLOBAL_COLLECTOR
      .lock()
      .ok()
      .and_then(|collector| {
        collector
          .counters
          .get(&(location.to_string(), counter_name.to_string()))
          .copied()
      })
      .unwrap_or(0)
  }

  pub fn print_telemetry_report_fn() {
    if let Ok(collector) = GLOBAL_COLLECTOR.lock() {
      println!("\n--- Postbox Telemetry Report (feature: telemetry) ---");
      println!("Collection started at: {:?}", collector.start_time);

      if collector.events.is_empty() {
        println!("\n[Events] No detailed events recorded.");
      } else {
        println!("\n[Events] Recorded Events ({}):", collector.events.len());
        let mut sorted_events = collector.events.clone();
        sorted_events.sort_by_key(|e| e.seq_id);

        for event in sorted_events.iter() {
          let since_start = event.timestamp.duration_since(collector.start_time);
          println!(
            "  +{:<10.6}s [Seq:{:<5}] OS_TID:{:<14?} Item:{:<6} Loc:{:<28} Evt:{:<24} Msg: {}",
            since_start.as_secs_f64(),
            event.seq_id,
            event.os_thread_id,
            event.item_id.map_or_else(|| "N/A".to_string(), |id| id.to_string()),
            event.location,
            event.event_type,
            event.message.as_deref().unwrap_or("")
          );
        }
      }

      if collector.counters.is_empty() {
        println!("\n[Counters] No counters recorded.");
      } else {
        println!("\n[Counters] Recorded Counters ({}):", collector.counters.len());
        let mut sorted_counters: Vec<_> = collector.counters.iter().collect();
        sorted_counters.sort_by_key(|(k, _v)| *k);
        for ((loc, name), count) in sorted_counters {
          println!("  Loc:{:<28} Counter:{:<24} Value: {}", loc, name, count);
        }
      }
      println!("\n--- End of Telemetry Report ---");
    } else {
      eprintln!("[TELEMETRY ERROR] Global collector mutex poisoned, cannot print report.");
    }
  }

  pub fn clear_telemetry_fn() {
    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      collector.events.clear();
      collector.counters.clear();
      collector.start_time = Instant::now();
    } else {
      eprintln!("[TELEMETRY ERROR] Global collector mutex poisoned, cannot clear data.");
    }
    NEXT_EVENT_SEQUENCE_ID.store(0, Ordering::Relaxed);
  }
}

#[cfg(not(feature = "telemetry"))]
pub mod disabled {
  #[inline(always)]
  pub fn log_event_fn(
    _item_id: Option<usize>,
    _location: &'static str,
    _event_type: &'static str,
    _message: Option<String>,
  ) {
  }
  #[inline(always)]
  pub fn increment_counter_fn(_location: &'static str, _counter_name: &'static str) {}
  #[inline(always)]
  pub fn counter_value_fn(_location: &'static str, _counter_name: &'static str) -> usize {
    0
  }
  #[inline(always)]
  pub fn print_telemetry_report_fn() {}
  #[inline(always)]
  pub fn clear_telemetry_fn() {}
}

#[cfg(feature = "telemetry")]
pub use enabled::{
  clear_telemetry_fn as clear_telemetry, counter_value_fn as counter_value,
  increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};

#[cfg(not(feature = "telemetry"))]
pub use disabled::{
  clear_telemetry_fn as clear_telemetry, counter_value_fn as counter_value,
  increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};
