//! Deterministic input generator.
//!
//! xor128 from Marsaglia, "Xorshift RNGs", Journal of Statistical Software
//! 8 (14), 2003. The harness reseeds it with the run seed before every test
//! module and every implementation it selects, so the reference and the
//! implementation under test always see the same inputs.

/// xor128 state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rng {
  state: [u32; 4],
}

impl Rng {
  /// Create a generator seeded with `seed`.
  #[must_use]
  pub const fn new(seed: u32) -> Self {
    Self {
      state: [
        seed,
        (seed & 0xffff_0000) | (!seed & 0x0000_ffff),
        (!seed & 0xffff_0000) | (seed & 0x0000_ffff),
        !seed,
      ],
    }
  }

  /// Restart the sequence from `seed`.
  #[inline]
  pub fn reseed(&mut self, seed: u32) {
    *self = Self::new(seed);
  }

  /// Next value in `0..=i32::MAX`.
  #[inline]
  pub fn next_u32(&mut self) -> u32 {
    let x = self.state[0];
    let t = x ^ (x << 11);

    self.state[0] = self.state[1];
    self.state[1] = self.state[2];
    self.state[2] = self.state[3];

    let mut w = self.state[3];
    w = (w ^ (w >> 19)) ^ (t ^ (t >> 8));
    self.state[3] = w;

    w >> 1
  }

  /// Next byte (low 8 bits of [`next_u32`](Self::next_u32)).
  #[inline]
  pub fn next_u8(&mut self) -> u8 {
    (self.next_u32() & 0xff) as u8
  }

  /// Fill `buf` with bytes.
  pub fn fill(&mut self, buf: &mut [u8]) {
    for b in buf {
      *b = self.next_u8();
    }
  }

  /// Next float in `[0, 1)`.
  #[inline]
  pub fn next_f32(&mut self) -> f32 {
    // 24 bits is the full f32 mantissa
    (self.next_u32() >> 7) as f32 / (1u32 << 24) as f32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_same_seed_same_sequence() {
    let mut a = Rng::new(0x1234_5678);
    let mut b = Rng::new(0x1234_5678);
    for _ in 0..1000 {
      assert_eq!(a.next_u32(), b.next_u32());
    }
  }

  #[test]
  fn test_reseed_restarts() {
    let mut rng = Rng::new(7);
    let first: Vec<u32> = (0..16).map(|_| rng.next_u32()).collect();
    rng.reseed(7);
    let again: Vec<u32> = (0..16).map(|_| rng.next_u32()).collect();
    assert_eq!(first, again);
  }

  #[test]
  fn test_seed_layout() {
    let rng = Rng::new(0x0000_ffff);
    assert_eq!(rng.state, [0x0000_ffff, 0x0000_0000, 0xffff_ffff, 0xffff_0000]);
  }

  #[test]
  fn test_known_first_values() {
    // seed 0: state = [0, 0xffff, 0xffff0000, 0xffffffff]
    // t = 0, w = 0xffffffff ^ (0xffffffff >> 19) = 0xffffe000
    let mut rng = Rng::new(0);
    assert_eq!(rng.next_u32(), 0xffff_e000 >> 1);
  }

  #[test]
  fn test_values_fit_31_bits() {
    let mut rng = Rng::new(42);
    for _ in 0..10_000 {
      assert!(rng.next_u32() <= i32::MAX as u32);
    }
  }

  #[test]
  fn test_f32_range() {
    let mut rng = Rng::new(3);
    for _ in 0..10_000 {
      let v = rng.next_f32();
      assert!((0.0..1.0).contains(&v), "{v}");
    }
  }

  #[test]
  fn test_different_seeds_diverge() {
    let mut a = Rng::new(1);
    let mut b = Rng::new(2);
    let same = (0..64).filter(|_| a.next_u32() == b.next_u32()).count();
    assert!(same < 4);
  }
}
