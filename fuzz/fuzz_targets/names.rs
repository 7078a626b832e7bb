//! Fuzz target for name ordering and filter patterns.
//!
//! Tests that:
//! - No panics on arbitrary names and patterns
//! - The natural order is antisymmetric and only equal for identical names
//! - A pattern matches itself, and `*` matches everything

#![no_main]

use arbitrary::Arbitrary;
use checkasm::names::{natural_cmp, wildcard_match};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
  a: String,
  b: String,
  pattern: String,
}

fuzz_target!(|input: Input| {
  let (a, b) = (input.a.as_str(), input.b.as_str());

  let ab = natural_cmp(a, b);
  assert_eq!(ab, natural_cmp(b, a).reverse(), "order not antisymmetric");
  assert_eq!(ab.is_eq(), a == b, "equal order for distinct names");

  // Matching is exponential in the number of stars.
  if input.pattern.matches('*').count() <= 4 {
    let _ = wildcard_match(a, &input.pattern);
  }
  assert!(wildcard_match(a, "*"));

  if !a.contains('*') {
    assert!(wildcard_match(a, a), "name does not match itself");
  }
  let prefixed = format!("{a}*");
  assert!(wildcard_match(&format!("{a}{b}"), &prefixed));
});
