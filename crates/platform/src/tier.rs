//! Instruction-set tiers.
//!
//! A tier is one step on the capability ladder the harness climbs: it names a
//! set of flags, a human-readable label for section headers, and the suffix
//! appended to function names in failure and benchmark output
//! (`blur_horz_avx2`). Tiers are listed weakest to strongest; the implicit
//! tier before the first entry is the portable reference, suffix `c`.
//!
//! | Arch | Tiers |
//! |------|-------|
//! | x86/x86_64 | SSE2, SSSE3, AVX2 |
//! | aarch64 | NEON |
//! | riscv64 | RVV |

use crate::caps::Caps;

/// Suffix used for the reference tier.
pub const REFERENCE_SUFFIX: &str = "c";

/// One instruction-set tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tier {
  /// Section header label (e.g., "AVX2").
  pub name: &'static str,

  /// Function name suffix (e.g., "avx2").
  pub suffix: &'static str,

  /// Flags this tier adds on top of the previous tiers.
  pub flags: Caps,
}

impl Tier {
  /// Create a new tier.
  #[inline]
  #[must_use]
  pub const fn new(name: &'static str, suffix: &'static str, flags: Caps) -> Self {
    Self { name, suffix, flags }
  }
}

/// Tiers for the compilation target, weakest first.
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub const TIERS: &[Tier] = &[
  Tier::new("SSE2", "sse2", crate::caps::x86::SSE2),
  Tier::new("SSSE3", "ssse3", crate::caps::x86::SSSE3),
  Tier::new("AVX2", "avx2", crate::caps::x86::AVX2),
];

/// Tiers for the compilation target, weakest first.
#[cfg(target_arch = "aarch64")]
pub const TIERS: &[Tier] = &[Tier::new("NEON", "neon", crate::caps::aarch64::NEON)];

/// Tiers for the compilation target, weakest first.
#[cfg(target_arch = "riscv64")]
pub const TIERS: &[Tier] = &[Tier::new("RVV", "rvv", crate::caps::riscv::V)];

/// Tiers for the compilation target, weakest first.
#[cfg(not(any(
  target_arch = "x86_64",
  target_arch = "x86",
  target_arch = "aarch64",
  target_arch = "riscv64"
)))]
pub const TIERS: &[Tier] = &[];

/// Suffix of the strongest tier whose flags intersect `caps`.
///
/// Falls back to [`REFERENCE_SUFFIX`] when none do.
#[must_use]
pub fn suffix(tiers: &[Tier], caps: Caps) -> &'static str {
  tiers
    .iter()
    .rev()
    .find(|tier| caps.intersects(tier.flags))
    .map_or(REFERENCE_SUFFIX, |tier| tier.suffix)
}
