//! Correctness and performance harness for optimized kernels.
//!
//! A kernel usually ships in several interchangeable builds: a portable
//! reference and one or more SIMD versions selected by CPU capability. This
//! crate runs every build the host supports against the reference, one
//! instruction-set tier at a time, and optionally measures the cycle cost of
//! each.
//!
//! # Core Types
//!
//! - [`Checkasm`]: the run context handed to every test module
//! - [`TestModule`]: a named check function run once per tier
//! - [`Host`]: the tiers, capabilities and timing primitives of the machine
//! - [`Registry`]: name-ordered store of every registered implementation
//!
//! # Running
//!
//! A test binary lists its modules and hands them to [`main`]:
//!
//! ```ignore
//! use checkasm::{Checkasm, TestModule};
//! use platform::Caps;
//!
//! fn check_blur(c: &mut Checkasm, caps: Caps) { /* ... */ }
//!
//! fn main() -> std::process::ExitCode {
//!     checkasm::main(&[TestModule::new("blur", check_blur)])
//! }
//! ```
//!
//! # Logging
//!
//! Internal diagnostics go through `tracing`. [`main`] installs a stderr
//! subscriber filtered by `CHECKASM_LOG` (default `error`), e.g.
//! `CHECKASM_LOG=checkasm=debug`.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

// ─────────────────────────────────────────────────────────────────────────────
// Core modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod bench;
pub mod config;
pub mod error;
pub mod float;
pub mod guard;
mod harness;
pub mod names;
pub mod registry;
pub mod report;
pub mod rng;

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

use std::{io::Write, process::ExitCode};

pub use config::{Command, Config};
pub use error::{Error, Result};
pub use float::{near_abs_eps, near_abs_eps_slice, near_abs_eps_ulp, near_abs_eps_ulp_slice, near_ulp, near_ulp_slice};
pub use guard::Fault;
pub use harness::{Checkasm, CpuIdent, Host, MAX_NAME_LEN, Outcome, TestModule};
pub use platform::{Caps, Tier};
pub use registry::Registry;
pub use report::Reporter;
pub use rng::Rng;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CHECKASM_LOG";

/// Parse the process arguments, run `tests` on this host and map the result
/// to an exit status.
pub fn main(tests: &[TestModule]) -> ExitCode {
  init_tracing();

  let config = match config::parse(std::env::args_os()) {
    Ok(Command::Run(config)) => config,
    Ok(Command::Help(text)) => {
      let _ = std::io::stderr().write_all(text.as_bytes());
      return ExitCode::SUCCESS;
    }
    Err(err) => {
      eprint!("{err}");
      return ExitCode::FAILURE;
    }
  };

  let mut checkasm = Checkasm::new(config, Host::detect(), Reporter::stdio());
  match checkasm.run(tests) {
    Ok(outcome) => outcome.exit_code(),
    Err(err) => {
      eprintln!("checkasm: {err}");
      ExitCode::FAILURE
    }
  }
}

/// Install the stderr log subscriber. Does nothing if one is already set.
pub fn init_tracing() {
  let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}
