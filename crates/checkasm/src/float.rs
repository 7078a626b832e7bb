//! Floating point comparators for test modules.
//!
//! Optimized kernels rarely reproduce the reference bit-for-bit once they
//! reorder arithmetic, so test modules compare with a tolerance: a distance in
//! units in the last place, an absolute epsilon, or either.
//!
//! Slice forms return `false` when the lengths differ.

/// `true` if `a` and `b` are at most `max_ulp` representable steps apart.
///
/// Values of opposite sign only compare equal when they are both zero.
#[inline]
#[must_use]
pub fn near_ulp(a: f32, b: f32, max_ulp: u32) -> bool {
  if a.is_sign_negative() != b.is_sign_negative() {
    // +0.0 == -0.0
    return a == b;
  }

  let distance = (i64::from(a.to_bits()) - i64::from(b.to_bits())).unsigned_abs();
  distance <= u64::from(max_ulp)
}

/// Element-wise [`near_ulp`].
#[must_use]
pub fn near_ulp_slice(a: &[f32], b: &[f32], max_ulp: u32) -> bool {
  a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| near_ulp(x, y, max_ulp))
}

/// `true` if `|a - b| < eps`.
#[inline]
#[must_use]
pub fn near_abs_eps(a: f32, b: f32, eps: f32) -> bool {
  (a - b).abs() < eps
}

/// Element-wise [`near_abs_eps`].
#[must_use]
pub fn near_abs_eps_slice(a: &[f32], b: &[f32], eps: f32) -> bool {
  a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| near_abs_eps(x, y, eps))
}

/// `true` if either [`near_ulp`] or [`near_abs_eps`] holds.
#[inline]
#[must_use]
pub fn near_abs_eps_ulp(a: f32, b: f32, eps: f32, max_ulp: u32) -> bool {
  near_ulp(a, b, max_ulp) || near_abs_eps(a, b, eps)
}

/// Element-wise [`near_abs_eps_ulp`].
#[must_use]
pub fn near_abs_eps_ulp_slice(a: &[f32], b: &[f32], eps: f32, max_ulp: u32) -> bool {
  a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| near_abs_eps_ulp(x, y, eps, max_ulp))
}
