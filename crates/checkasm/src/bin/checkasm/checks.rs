//! Demonstration kernels and their checks.

#![allow(unsafe_code)]

use core::hint::black_box;

use checkasm::{Caps, Checkasm, TestModule};

pub const TESTS: &[TestModule] = &[TestModule::new("dot", check_dot), TestModule::new("sum", check_sum)];

// ─────────────────────────────────────────────────────────────────────────────
// Byte sum
// ─────────────────────────────────────────────────────────────────────────────

type SumFn = fn(&[u8]) -> u32;

fn sum_c(data: &[u8]) -> u32 {
  data.iter().map(|&b| u32::from(b)).sum()
}

fn select_sum(caps: Caps) -> SumFn {
  #[cfg(target_arch = "x86_64")]
  if caps.has(platform::caps::x86::SSE2) {
    return x86::sum_sse2;
  }
  #[cfg(target_arch = "aarch64")]
  if caps.has(platform::caps::aarch64::NEON) {
    return arm::sum_neon;
  }
  let _ = caps;
  sum_c
}

fn check_sum(c: &mut Checkasm, caps: Caps) {
  const LENGTHS: [usize; 4] = [15, 64, 333, 4096];

  let func = select_sum(caps);
  for len in LENGTHS {
    let Some(reference) = c.check_func(func, format_args!("sum_{len}")) else {
      continue;
    };

    let mut buf = vec![0u8; len];
    c.rng().fill(&mut buf);

    let expected = reference(&buf);
    let got = c.call_new(|| func(&buf));
    if let Some(got) = got
      && got != expected
      && c.fail(format_args!("{got} != {expected}"))
    {
      eprintln!("len {len}: expected {expected}, got {got}");
    }

    if c.bench_func() {
      c.bench_new(|| {
        black_box(func(black_box(&buf)));
      });
    }
  }
  c.report("sum");
}

// ─────────────────────────────────────────────────────────────────────────────
// Dot product
// ─────────────────────────────────────────────────────────────────────────────

type DotFn = fn(&[f32], &[f32]) -> f32;

fn dot_c(a: &[f32], b: &[f32]) -> f32 {
  a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn select_dot(caps: Caps) -> DotFn {
  #[cfg(target_arch = "x86_64")]
  if caps.has(platform::caps::x86::AVX2) {
    return x86::dot_avx2;
  }
  #[cfg(target_arch = "aarch64")]
  if caps.has(platform::caps::aarch64::NEON) {
    return arm::dot_neon;
  }
  let _ = caps;
  dot_c
}

fn check_dot(c: &mut Checkasm, caps: Caps) {
  const LEN: usize = 515;

  let func = select_dot(caps);
  if let Some(reference) = c.check_func(func, "dot_f32") {
    let a: Vec<f32> = (0..LEN).map(|_| c.rng().next_f32() * 2.0 - 1.0).collect();
    let b: Vec<f32> = (0..LEN).map(|_| c.rng().next_f32() * 2.0 - 1.0).collect();

    let expected = reference(&a, &b);
    if let Some(got) = c.call_new(|| func(&a, &b))
      && !checkasm::near_abs_eps_ulp(got, expected, 1e-3, 64)
      && c.fail(format_args!("{got} != {expected}"))
    {
      eprintln!("difference {}", (got - expected).abs());
    }

    if c.bench_func() {
      c.bench_new(|| {
        black_box(func(black_box(&a), black_box(&b)));
      });
    }
  }
  c.report("dot");
}

// ─────────────────────────────────────────────────────────────────────────────
// x86_64 kernels
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "x86_64")]
mod x86 {
  use core::arch::x86_64::*;

  pub fn sum_sse2(data: &[u8]) -> u32 {
    // SAFETY: selected only when the host has SSE2.
    unsafe { sum_sse2_impl(data) }
  }

  #[target_feature(enable = "sse2")]
  unsafe fn sum_sse2_impl(data: &[u8]) -> u32 {
    let zero = _mm_setzero_si128();
    let mut acc = _mm_setzero_si128();

    let chunks = data.chunks_exact(16);
    let tail = chunks.remainder();
    for chunk in chunks {
      // SAFETY: `chunk` is exactly 16 readable bytes.
      let v = unsafe { _mm_loadu_si128(chunk.as_ptr().cast()) };
      acc = _mm_add_epi64(acc, _mm_sad_epu8(v, zero));
    }

    let lo = _mm_cvtsi128_si64(acc) as u64;
    let hi = _mm_cvtsi128_si64(_mm_unpackhi_epi64(acc, acc)) as u64;
    let tail: u32 = tail.iter().map(|&b| u32::from(b)).sum();
    (lo + hi) as u32 + tail
  }

  pub fn dot_avx2(a: &[f32], b: &[f32]) -> f32 {
    // SAFETY: selected only when the host has AVX2.
    unsafe { dot_avx2_impl(a, b) }
  }

  #[target_feature(enable = "avx2")]
  unsafe fn dot_avx2_impl(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);

    let mut acc = _mm256_setzero_ps();
    let (xs, ys) = (a.chunks_exact(8), b.chunks_exact(8));
    let (x_tail, y_tail) = (xs.remainder(), ys.remainder());
    for (x, y) in xs.zip(ys) {
      // SAFETY: both chunks are exactly 8 readable floats.
      let (x, y) = unsafe { (_mm256_loadu_ps(x.as_ptr()), _mm256_loadu_ps(y.as_ptr())) };
      acc = _mm256_add_ps(acc, _mm256_mul_ps(x, y));
    }

    let mut lanes = [0f32; 8];
    // SAFETY: `lanes` holds 8 floats.
    unsafe { _mm256_storeu_ps(lanes.as_mut_ptr(), acc) };
    let mut sum: f32 = lanes.iter().sum();
    for (x, y) in x_tail.iter().zip(y_tail) {
      sum += x * y;
    }
    sum
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// aarch64 kernels
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "aarch64")]
mod arm {
  use core::arch::aarch64::*;

  pub fn sum_neon(data: &[u8]) -> u32 {
    // SAFETY: selected only when the host has NEON.
    unsafe { sum_neon_impl(data) }
  }

  #[target_feature(enable = "neon")]
  unsafe fn sum_neon_impl(data: &[u8]) -> u32 {
    let mut acc = vdupq_n_u32(0);

    let chunks = data.chunks_exact(16);
    let tail = chunks.remainder();
    for chunk in chunks {
      // SAFETY: `chunk` is exactly 16 readable bytes.
      let v = unsafe { vld1q_u8(chunk.as_ptr()) };
      acc = vpadalq_u16(acc, vpaddlq_u8(v));
    }

    let tail: u32 = tail.iter().map(|&b| u32::from(b)).sum();
    vaddvq_u32(acc) + tail
  }

  pub fn dot_neon(a: &[f32], b: &[f32]) -> f32 {
    // SAFETY: selected only when the host has NEON.
    unsafe { dot_neon_impl(a, b) }
  }

  #[target_feature(enable = "neon")]
  unsafe fn dot_neon_impl(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);

    let mut acc = vdupq_n_f32(0.0);
    let (xs, ys) = (a.chunks_exact(4), b.chunks_exact(4));
    let (x_tail, y_tail) = (xs.remainder(), ys.remainder());
    for (x, y) in xs.zip(ys) {
      // SAFETY: both chunks are exactly 4 readable floats.
      let (x, y) = unsafe { (vld1q_f32(x.as_ptr()), vld1q_f32(y.as_ptr())) };
      acc = vfmaq_f32(acc, x, y);
    }

    let mut sum = vaddvq_f32(acc);
    for (x, y) in x_tail.iter().zip(y_tail) {
      sum += x * y;
    }
    sum
  }
}
