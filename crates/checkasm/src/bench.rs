//! Cycle accounting.
//!
//! Timings are kept in decicycles (tenths of a cycle). A benchmark run times
//! [`BENCH_RUNS`] batches of [`CALLS_PER_RUN`] calls and keeps a batch only if
//! it is no slower than four times the running average, which drops
//! interrupts and page faults without biasing the mean much. The overhead of
//! reading the counter itself is calibrated once with [`measure_nop_time`] and
//! subtracted when reporting.

use core::fmt;

/// Batches timed per benchmark.
pub const BENCH_RUNS: u32 = 1 << 12;

/// Calls per timed batch.
pub const CALLS_PER_RUN: u64 = 4;

const NOP_SAMPLES: usize = 10_000;

/// Overhead of one counter read, in decicycles.
///
/// Takes the mean of the middle half of [`NOP_SAMPLES`] back-to-back read
/// deltas (truncated to 16 bits) and scales it by ten.
#[must_use]
pub fn measure_nop_time(read: fn() -> u64) -> u32 {
  let mut samples = [0u16; NOP_SAMPLES];
  for sample in &mut samples {
    let start = read();
    *sample = read().wrapping_sub(start) as u16;
  }
  samples.sort_unstable();

  let sum: u32 = samples[NOP_SAMPLES / 4..NOP_SAMPLES * 3 / 4].iter().map(|&s| u32::from(s)).sum();
  sum / (NOP_SAMPLES as u32 / 20)
}

/// Time `call` and return `(kept batches, cycles over those batches)`.
pub fn run_batches(read: fn() -> u64, mut call: impl FnMut()) -> (u64, u64) {
  let mut count = 0u64;
  let mut sum = 0u64;

  for run in 0..BENCH_RUNS {
    let start = read();
    call();
    call();
    call();
    call();
    let elapsed = read().wrapping_sub(start);

    if run > 0 && elapsed.saturating_mul(count) <= sum.saturating_mul(4) {
      sum += elapsed;
      count += 1;
    }
  }

  (count, sum)
}

/// Decicycles per call after removing the counter overhead `nop`.
///
/// `batches` and `cycles` are the totals accumulated by [`run_batches`].
#[must_use]
pub fn per_call(cycles: u64, batches: u64, nop: u32) -> Decicycles {
  if batches == 0 {
    return Decicycles(0);
  }
  let per_batch = i128::from(10 * cycles / batches);
  let value = (per_batch - i128::from(nop)) / i128::from(CALLS_PER_RUN);
  Decicycles(i64::try_from(value).unwrap_or(i64::MAX))
}

/// A cycle count in tenths, printed as `<whole>.<tenth>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Decicycles(pub i64);

impl fmt::Display for Decicycles {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{sign}{}.{}", abs / 10, abs % 10)
  }
}

#[cfg(test)]
mod tests {
  use core::sync::atomic::{AtomicU64, Ordering};

  use super::*;

  fn stepping_counter() -> u64 {
    static NOW: AtomicU64 = AtomicU64::new(0);
    NOW.fetch_add(3, Ordering::Relaxed)
  }

  #[test]
  fn test_nop_time_of_constant_counter() {
    assert_eq!(measure_nop_time(stepping_counter), 30);
  }

  #[test]
  fn test_nop_time_ignores_outliers() {
    fn spiky() -> u64 {
      static READS: AtomicU64 = AtomicU64::new(0);
      let n = READS.fetch_add(1, Ordering::Relaxed);
      // Every 8th pair has a huge delta.
      if n % 16 == 15 { n * 1000 } else { n }
    }
    let nop = measure_nop_time(spiky);
    assert!(nop <= 10, "nop = {nop}");
  }

  #[test]
  fn test_batches_discard_first_run() {
    fn counter() -> u64 {
      static NOW: AtomicU64 = AtomicU64::new(0);
      NOW.fetch_add(3, Ordering::Relaxed)
    }

    let mut calls = 0u64;
    let (count, sum) = run_batches(counter, || calls += 1);
    assert_eq!(calls, u64::from(BENCH_RUNS) * CALLS_PER_RUN);
    assert_eq!(count, u64::from(BENCH_RUNS) - 1);
    assert_eq!(sum, 3 * count);
  }

  #[test]
  fn test_per_call() {
    // 100 batches of 4 calls at 40 cycles each, counter overhead 2.0 cycles.
    assert_eq!(per_call(4000, 100, 20), Decicycles(95));
    assert_eq!(per_call(0, 0, 20), Decicycles(0));
  }

  #[test]
  fn test_display() {
    assert_eq!(Decicycles(95).to_string(), "9.5");
    assert_eq!(Decicycles(3).to_string(), "0.3");
    assert_eq!(Decicycles(120).to_string(), "12.0");
    assert_eq!(Decicycles(-15).to_string(), "-1.5");
  }
}
