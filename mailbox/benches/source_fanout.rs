// benches/source_fanout.rs

use bench_matrix::{
  criterion_runner::sync_suite::SyncBenchmarkSuite, AbstractCombination, MatrixCellValue,
};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use postbox::Source;
use std::{
  sync::{Arc, Barrier},
  thread::{self, available_parallelism},
  time::{Duration, Instant},
};

const ITEM_VALUE: u64 = 42;

// --- Config, State, Context ---
#[derive(Debug, Clone)]
struct FanoutBenchConfig {
  num_subscribers: usize,
  total_items: usize,
}

#[derive(Default, Debug)]
struct BenchContext;

#[derive(Clone)]
struct FanoutBenchState;

// --- Extractor Function ---
fn extract_config(combo: &AbstractCombination) -> Result<FanoutBenchConfig, String> {
  let num_subscribers = combo.get_u64(0)? as usize;
  let total_items = combo.get_u64(1)? as usize;

  if num_subscribers == 0 {
    return Err("Number of subscribers must be at least 1.".to_string());
  }

  Ok(FanoutBenchConfig {
    num_subscribers,
    total_items,
  })
}

// --- Setup Function ---
fn setup_fn(_cfg: &FanoutBenchConfig) -> Result<(BenchContext, FanoutBenchState), String> {
  Ok((BenchContext::default(), FanoutBenchState))
}

// --- Benchmark Logic ---
fn benchmark_logic(
  _ctx: BenchContext,
  state: FanoutBenchState,
  cfg: &FanoutBenchConfig,
) -> (BenchContext, FanoutBenchState, Duration) {
  let source = Source::start();
  let subscriptions: Vec<_> = (0..cfg.num_subscribers).map(|_| source.subscribe()).collect();

  let barrier = Arc::new(Barrier::new(cfg.num_subscribers + 1));

  let duration = thread::scope(|s| {
    for subscription in subscriptions {
      let barrier_clone = Arc::clone(&barrier);
      s.spawn(move || {
        barrier_clone.wait(); // Wait for the publisher to be ready

        // Drain until the source completes.
        while subscription.recv_sync().is_ok() {}
      });
    }

    barrier.wait(); // Wait for every subscriber to be ready
    let start_time = Instant::now();

    for i in 0..cfg.total_items {
      source.post(ITEM_VALUE + i as u64).unwrap();
    }
    // Completion waits until every subscriber has drained the journal.
    source.complete_sync().unwrap();

    start_time.elapsed()
  });

  (BenchContext::default(), state, duration)
}

// --- Teardown Function ---
fn teardown(_ctx: BenchContext, _state: FanoutBenchState, _cfg: &FanoutBenchConfig) {}

// --- Main Benchmark Suite ---
fn source_fanout_benches(c: &mut Criterion) {
  let core_count = usize::from(available_parallelism().unwrap()) as u64;
  let parameter_axes = vec![
    vec![
      // Axis 0: Num Subscribers
      MatrixCellValue::Unsigned(1),
      MatrixCellValue::Unsigned(4),
      MatrixCellValue::Unsigned(core_count),
    ],
    vec![
      // Axis 1: Total Items
      MatrixCellValue::Unsigned(10_000),
      MatrixCellValue::Unsigned(100_000),
    ],
  ];
  let parameter_names = vec!["Subs", "Items"]
    .into_iter()
    .map(String::from)
    .collect();

  SyncBenchmarkSuite::new(
    c,
    "SourceFanoutSync".to_string(),
    Some(parameter_names),
    parameter_axes,
    Box::new(extract_config),
    setup_fn,
    benchmark_logic,
    teardown,
  )
  .throughput(|cfg: &FanoutBenchConfig| {
    // Total work is every value being delivered to every subscriber
    Throughput::Elements((cfg.total_items * cfg.num_subscribers) as u64)
  })
  .run();
}

criterion_group!(benches, source_fanout_benches);
criterion_main!(benches);
