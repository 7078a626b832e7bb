//! CPU capabilities, tiers, and timing primitives for checkasm.
//!
//! This crate is the host-facing side of the harness: it answers "which
//! instruction-set tiers can run here", "how do I read the cycle counter",
//! and "what CPU is this" so the harness itself stays architecture-neutral.
//!
//! # Core Types
//!
//! - [`Caps`]: a 256-bit feature bitset
//! - [`Tier`]: one rung of the capability ladder, with its name and suffix
//!
//! # Main Entry Points
//!
//! ```ignore
//! use platform::{Caps, TIERS};
//!
//! let mut previous = Caps::NONE;
//! for tier in TIERS {
//!     let effective = platform::supported(tier.flags | previous);
//!     if effective != previous {
//!         // run every test under `effective`
//!     }
//!     previous = effective;
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

// ─────────────────────────────────────────────────────────────────────────────
// Core modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod caps;
mod detect;
pub mod tier;
pub mod timer;

// ─────────────────────────────────────────────────────────────────────────────
// Architecture-specific modules
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub mod cpuid;

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

pub use caps::Caps;
pub use tier::{TIERS, Tier};
pub use timer::CYCLE_COUNTER;

/// Get the detected host capabilities.
///
/// With `std`, detection runs once and is cached.
#[inline]
#[must_use]
pub fn caps() -> Caps {
  detect::caps()
}

/// Restrict `requested` to what the host supports.
///
/// This is the query the dispatch loop makes for every tier.
#[inline]
#[must_use]
pub fn supported(requested: Caps) -> Caps {
  detect::supported(requested)
}
