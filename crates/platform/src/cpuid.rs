//! x86 CPU identification for the startup banner.
//!
//! Provides the processor brand string (CPUID leaves `0x8000_0002..=0x8000_0004`)
//! and the raw family/model/stepping signature (leaf 1, EAX).

#![allow(unsafe_code)] // Required for CPUID intrinsics

#[cfg(target_arch = "x86")]
use core::arch::x86::__cpuid;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::__cpuid;

/// Highest extended leaf that carries the brand string.
const BRAND_LEAF_LAST: u32 = 0x8000_0004;

/// Processor identification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuId {
  brand: [u8; 48],

  /// CPUID leaf 1 EAX: stepping, model, family and their extensions.
  pub signature: u32,
}

impl CpuId {
  /// Query CPUID.
  #[must_use]
  pub fn query() -> Self {
    // SAFETY: CPUID is always available on x86_64 and on every x86 CPU this
    // crate supports.
    let signature = unsafe { __cpuid(1) }.eax;
    // SAFETY: as above.
    let max_ext = unsafe { __cpuid(0x8000_0000) }.eax;

    let mut brand = [0u8; 48];
    if max_ext >= BRAND_LEAF_LAST {
      for (i, leaf) in (0x8000_0002..=BRAND_LEAF_LAST).enumerate() {
        // SAFETY: leaf is within the range reported by leaf 0x8000_0000.
        let r = unsafe { __cpuid(leaf) };
        for (j, reg) in [r.eax, r.ebx, r.ecx, r.edx].into_iter().enumerate() {
          let at = i * 16 + j * 4;
          brand[at..at + 4].copy_from_slice(&reg.to_le_bytes());
        }
      }
    }

    Self { brand, signature }
  }

  /// Brand string with NUL padding and surrounding whitespace removed.
  #[must_use]
  pub fn brand(&self) -> &str {
    let len = self.brand.iter().position(|&b| b == 0).unwrap_or(self.brand.len());
    core::str::from_utf8(&self.brand[..len]).map_or("", str::trim)
  }
}
