//! Name ordering and filter patterns.
//!
//! Function names sort ASCIIbetically except that runs of digits compare by
//! numeric value, so `blur2_horz` comes before `blur10_horz`. Filters given on
//! the command line are globs where `*` matches any run of characters.

use core::cmp::Ordering;

#[inline]
fn is_digit_at(s: &[u8], i: usize) -> bool {
  s.get(i).is_some_and(u8::is_ascii_digit)
}

/// Compare two function names in natural order.
///
/// Byte-wise comparison decides, unless the first difference falls inside a
/// run of digits: then the name whose digit run is longer is the larger one.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
  let (a, b) = (a.as_bytes(), b.as_bytes());

  let mut i = 0;
  while i < a.len() && i < b.len() && a[i] == b[i] {
    i += 1;
  }
  // The end of a name sorts before any byte.
  let ascii = a.get(i).cmp(&b.get(i));

  while is_digit_at(a, i) && is_digit_at(b, i) {
    i += 1;
  }

  if i > 0 && is_digit_at(a, i - 1) {
    let digits = is_digit_at(a, i).cmp(&is_digit_at(b, i));
    if digits != Ordering::Equal {
      return digits;
    }
  }

  ascii
}

/// Match `name` against a glob `pattern`.
#[must_use]
pub fn wildcard_match(name: &str, pattern: &str) -> bool {
  let Some(star) = pattern.find('*') else {
    return name == pattern;
  };

  if !name.starts_with(&pattern[..star]) {
    return false;
  }

  let rest = pattern[star..].trim_start_matches('*');
  if rest.is_empty() {
    return true;
  }

  let tail = &name[star..];
  tail
    .char_indices()
    .any(|(at, _)| wildcard_match(&tail[at..], rest))
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  #[test]
  fn test_numeric_runs() {
    assert_eq!(natural_cmp("name2", "name10"), Ordering::Less);
    assert_eq!(natural_cmp("item10", "item2"), Ordering::Greater);
    assert_eq!(natural_cmp("blur16_h", "blur4_h"), Ordering::Greater);
    assert_eq!(natural_cmp("x12a", "x12b"), Ordering::Less);
  }

  #[test]
  fn test_plain_ascii() {
    assert_eq!(natural_cmp("abc", "abd"), Ordering::Less);
    assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
    assert_eq!(natural_cmp("ab", "abc"), Ordering::Less);
    assert_eq!(natural_cmp("B", "a"), Ordering::Less);
  }

  #[test]
  fn test_prefix_digit() {
    assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
    assert_eq!(natural_cmp("a1", "a"), Ordering::Greater);
    assert_eq!(natural_cmp("a1", "a1x"), Ordering::Less);
  }

  #[test]
  fn test_embedded_nul() {
    assert_eq!(natural_cmp("a", "a\0"), Ordering::Less);
    assert_eq!(natural_cmp("a\0", "a"), Ordering::Greater);
  }

  #[test]
  fn test_wildcard() {
    assert!(wildcard_match("blur_horz", "blur_horz"));
    assert!(!wildcard_match("blur_horz", "blur"));
    assert!(wildcard_match("blur_horz", "blur*"));
    assert!(wildcard_match("blur_horz", "*horz"));
    assert!(wildcard_match("blur_horz", "b*r*z"));
    assert!(wildcard_match("blur_horz", "**"));
    assert!(!wildcard_match("blur_horz", "*vert"));
    assert!(!wildcard_match("blur", "blur_*"));
    assert!(!wildcard_match("", "*a"));
    assert!(wildcard_match("", "*"));
  }

  proptest! {
    #[test]
    fn natural_cmp_antisymmetric(a in "[a-c0-9_]{0,8}", b in "[a-c0-9_]{0,8}") {
      prop_assert_eq!(natural_cmp(&a, &b), natural_cmp(&b, &a).reverse());
    }

    #[test]
    fn natural_cmp_equal_only_when_identical(a in "[a-c0-9]{0,8}", b in "[a-c0-9]{0,8}") {
      prop_assert_eq!(natural_cmp(&a, &b) == Ordering::Equal, a == b);
    }

    #[test]
    fn numeric_suffixes_sort_by_value(stem in "[a-z_]{1,6}", x in 0u32..100_000, y in 0u32..100_000) {
      let a = format!("{stem}{x}");
      let b = format!("{stem}{y}");
      prop_assert_eq!(natural_cmp(&a, &b), x.cmp(&y));
    }

    #[test]
    fn star_matches_any_prefix(name in "[a-z0-9_]{0,12}", cut in 0usize..12) {
      let cut = cut.min(name.len());
      let pattern = format!("{}*", &name[..cut]);
      prop_assert!(wildcard_match(&name, &pattern));
    }
  }
}
