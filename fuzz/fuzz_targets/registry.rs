//! Fuzz target for the function registry.
//!
//! Tests that:
//! - Arbitrary insertion sequences keep one node per distinct name
//! - In-order traversal is sorted by the natural order

#![no_main]

use checkasm::{Caps, Registry, names::natural_cmp, registry::Registration};
use libfuzzer_sys::fuzz_target;

type Kernel = fn(u8) -> u8;

fn kernel(x: u8) -> u8 {
  x.wrapping_add(1)
}

fuzz_target!(|names: Vec<String>| {
  let mut reg = Registry::new();
  for name in &names {
    let node = reg.find_or_create(name).unwrap();
    let _ = reg.register_version::<Kernel>(node, kernel, Caps::NONE).unwrap();
    assert_eq!(reg.name(node), name);
    assert_eq!(reg.register_version::<Kernel>(node, kernel, Caps::NONE).unwrap(), Registration::AlreadyTested);
  }

  let mut seen: Vec<&str> = Vec::new();
  reg.in_order(|name, versions| {
    assert_eq!(versions.len(), 1);
    seen.push(name);
  });
  assert!(seen.windows(2).all(|w| natural_cmp(w[0], w[1]).is_lt()));

  let mut distinct: Vec<&str> = names.iter().map(String::as_str).collect();
  distinct.sort_unstable();
  distinct.dedup();
  assert_eq!(seen.len(), distinct.len());
});
