// tests/common/mod.rs

use std::time::Duration;

/// Upper bound for steps expected to finish almost immediately.
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(500);
/// Upper bound for multi-step scenarios under real contention.
pub const LONG_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for the stress suites.
pub const STRESS_TIMEOUT: Duration = Duration::from_secs(20);

pub const ITEMS_LOW: usize = 64;
pub const ITEMS_MEDIUM: usize = 256;
pub const ITEMS_HIGH: usize = 1024;
