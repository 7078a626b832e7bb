//! Host CPU detection.
//!
//! Combines compile-time features (`cfg!(target_feature = "...")`) with runtime
//! probes. With `std` the result is cached in a `OnceLock`; without it only the
//! compile-time set is reported.
//!
//! The harness never asks "what does the host have" directly. It asks
//! [`supported`] with the flags a tier *wants*, and gets back the subset that
//! can actually run here.

use crate::caps::Caps;

/// Detected host capabilities (cached).
#[inline]
#[must_use]
pub fn caps() -> Caps {
  #[cfg(miri)]
  {
    Caps::NONE
  }

  #[cfg(all(not(miri), feature = "std"))]
  {
    use std::sync::OnceLock;
    static CACHED: OnceLock<Caps> = OnceLock::new();
    *CACHED.get_or_init(detect_uncached)
  }

  #[cfg(all(not(miri), not(feature = "std")))]
  {
    caps_static()
  }
}

/// Restrict `requested` to the flags the host supports.
#[inline]
#[must_use]
pub fn supported(requested: Caps) -> Caps {
  requested & caps()
}

/// Run detection without touching the cache.
#[must_use]
pub fn detect_uncached() -> Caps {
  #[cfg(feature = "std")]
  {
    caps_static() | caps_runtime()
  }
  #[cfg(not(feature = "std"))]
  {
    caps_static()
  }
}

/// Features guaranteed by the compilation target.
#[must_use]
pub const fn caps_static() -> Caps {
  #[allow(unused_mut)]
  let mut caps = Caps::NONE;

  #[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), target_feature = "sse2"))]
  {
    caps = caps.union(crate::caps::x86::SSE2);
  }
  #[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), target_feature = "ssse3"))]
  {
    caps = caps.union(crate::caps::x86::SSSE3);
  }
  #[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), target_feature = "avx2"))]
  {
    caps = caps.union(crate::caps::x86::AVX2);
  }
  #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
  {
    caps = caps.union(crate::caps::aarch64::NEON);
  }
  // `is_riscv_feature_detected!` does not accept "v" on the toolchains we
  // target, so the vector extension is compile-time only.
  #[cfg(all(target_arch = "riscv64", target_feature = "v"))]
  {
    caps = caps.union(crate::caps::riscv::V);
  }

  caps
}

#[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "std"))]
fn caps_runtime() -> Caps {
  use crate::caps::x86;

  let mut caps = Caps::NONE;

  if std::arch::is_x86_feature_detected!("sse2") {
    caps |= x86::SSE2;
  }
  if std::arch::is_x86_feature_detected!("ssse3") {
    caps |= x86::SSSE3;
  }
  if std::arch::is_x86_feature_detected!("avx2") {
    caps |= x86::AVX2;
  }

  caps
}

#[cfg(all(target_arch = "aarch64", feature = "std"))]
fn caps_runtime() -> Caps {
  use crate::caps::aarch64;

  let mut caps = Caps::NONE;

  if std::arch::is_aarch64_feature_detected!("neon") {
    caps |= aarch64::NEON;
  }

  caps
}

#[cfg(all(
  not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")),
  feature = "std"
))]
fn caps_runtime() -> Caps {
  Caps::NONE
}
