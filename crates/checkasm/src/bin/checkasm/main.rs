//! Self-test suite for the harness.
//!
//! Runs a couple of small kernels with hand-written SIMD versions so the
//! harness can be exercised on any supported host:
//!
//! ```text
//! cargo run --release -p checkasm -- --bench
//! ```

mod checks;

use std::process::ExitCode;

fn main() -> ExitCode {
  checkasm::main(checks::TESTS)
}
