//! Cycle counters and SIMD warm-up.
//!
//! [`CYCLE_COUNTER`] is `None` on targets without a user-readable counter; the
//! harness refuses `--bench` there. Where a counter exists it may still trap,
//! so callers are expected to probe it under a fault guard before relying on
//! it:
//!
//! - aarch64 reads `PMCCNTR_EL0`, which raises SIGILL unless the kernel has
//!   enabled EL0 access to the PMU.
//! - RISC-V kernels can disable `rdcycle` for user space.
//!
//! Every counter here counts core clock cycles, so `nop:` and the per-call
//! figures are in the same unit on every target.

#![allow(unsafe_code)]

use crate::caps::Caps;

/// Cycle counter read primitive for the compilation target.
#[cfg(any(
  target_arch = "x86_64",
  target_arch = "x86",
  target_arch = "aarch64",
  target_arch = "riscv64"
))]
pub const CYCLE_COUNTER: Option<fn() -> u64> = Some(read_cycles);

/// Cycle counter read primitive for the compilation target.
#[cfg(not(any(
  target_arch = "x86_64",
  target_arch = "x86",
  target_arch = "aarch64",
  target_arch = "riscv64"
)))]
pub const CYCLE_COUNTER: Option<fn() -> u64> = None;

/// Read the time-stamp counter.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn read_cycles() -> u64 {
  // SAFETY: RDTSC is available on every x86_64 CPU.
  unsafe { core::arch::x86_64::_rdtsc() }
}

/// Read the time-stamp counter.
#[cfg(target_arch = "x86")]
#[inline(always)]
pub fn read_cycles() -> u64 {
  // SAFETY: every x86 CPU that can run the SSE2 baseline has RDTSC.
  unsafe { core::arch::x86::_rdtsc() }
}

/// Read the PMU cycle counter (`PMCCNTR_EL0`).
///
/// `CNTVCT_EL0` is always readable but ticks at the generic timer frequency,
/// often tens of MHz, which rounds most kernels down to zero.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn read_cycles() -> u64 {
  let value: u64;
  // SAFETY: reading the register has no side effects; it raises SIGILL when
  // the kernel denies EL0 access, which the harness probes for.
  unsafe {
    core::arch::asm!("isb", "mrs {}, pmccntr_el0", out(reg) value, options(nomem, nostack, preserves_flags));
  }
  value
}

/// Read the cycle CSR.
#[cfg(target_arch = "riscv64")]
#[inline(always)]
pub fn read_cycles() -> u64 {
  let value: u64;
  // SAFETY: reading `cycle` has no side effects; it raises SIGILL when the
  // kernel denies user access, which the harness probes for.
  unsafe {
    core::arch::asm!("rdcycle {}", out(reg) value, options(nomem, nostack, preserves_flags));
  }
  value
}

/// Pick the SIMD warm-up routine for a host with `caps`.
///
/// Wide vector units on x86 are powered down when idle; the first wide
/// instructions after that run at reduced throughput and would skew the
/// first timings of a benchmark.
#[must_use]
pub fn simd_warmup(caps: Caps) -> Option<fn()> {
  #[cfg(target_arch = "x86_64")]
  {
    if caps.has(crate::caps::x86::AVX2) {
      return Some(warmup_avx2);
    }
  }
  let _ = caps;
  None
}

#[cfg(target_arch = "x86_64")]
fn warmup_avx2() {
  // SAFETY: only handed out by `simd_warmup` when AVX2 was detected.
  unsafe { warmup_avx2_impl() }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn warmup_avx2_impl() {
  use core::arch::x86_64::{_mm256_add_epi32, _mm256_set1_epi32, _mm256_storeu_si256};

  let mut acc = _mm256_set1_epi32(core::hint::black_box(1));
  for _ in 0..8 {
    acc = _mm256_add_epi32(acc, acc);
  }
  let mut out = [0i32; 8];
  // SAFETY: `out` is 32 bytes, the width of one unaligned 256-bit store.
  unsafe { _mm256_storeu_si256(out.as_mut_ptr().cast(), acc) };
  core::hint::black_box(out);
}
