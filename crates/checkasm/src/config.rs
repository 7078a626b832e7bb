//! Command line options.

use std::{ffi::OsString, time::SystemTime};

use clap::{Parser, error::ErrorKind};

use crate::error::{Error, Result};

/// Command line as accepted by the `checkasm` binary.
#[derive(Debug, Parser)]
#[command(name = "checkasm", disable_version_flag = true)]
#[command(about = "Check optimized kernels against their reference implementations")]
pub struct Cli {
  /// Numeric value to seed the rng
  #[arg(value_name = "random seed")]
  seed: Option<u32>,

  /// Test only the modules matching <pattern>
  #[arg(short = 't', long = "test", value_name = "pattern")]
  test: Option<String>,

  /// Test only the functions matching <pattern>
  #[arg(short = 'f', long = "function", value_name = "pattern")]
  function: Option<String>,

  /// Benchmark the tested functions
  #[arg(short = 'b', long)]
  bench: bool,

  /// Benchmark the reference functions too
  #[arg(short = 'c', long = "bench-c")]
  bench_c: bool,

  /// List available functions
  #[arg(long)]
  list_functions: bool,

  /// List available tests
  #[arg(long)]
  list_tests: bool,

  /// Print failures verbosely
  #[arg(short = 'v', long)]
  verbose: bool,
}

/// Options for one harness run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
  /// RNG seed shared by every test module.
  pub seed: u32,
  /// Glob selecting test modules by name.
  pub test_pattern: Option<String>,
  /// Glob selecting functions by name.
  pub function_pattern: Option<String>,
  pub bench: bool,
  pub bench_c: bool,
  pub list_functions: bool,
  pub list_tests: bool,
  pub verbose: bool,
}

impl Config {
  /// Default options with the given seed.
  #[must_use]
  pub const fn with_seed(seed: u32) -> Self {
    Self {
      seed,
      test_pattern: None,
      function_pattern: None,
      bench: false,
      bench_c: false,
      list_functions: false,
      list_tests: false,
      verbose: false,
    }
  }
}

impl From<Cli> for Config {
  fn from(cli: Cli) -> Self {
    Self {
      seed: cli.seed.unwrap_or_else(clock_seed),
      test_pattern: cli.test,
      function_pattern: cli.function,
      bench: cli.bench,
      bench_c: cli.bench_c,
      list_functions: cli.list_functions,
      list_tests: cli.list_tests,
      verbose: cli.verbose,
    }
  }
}

/// Parsed command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
  /// Run the harness.
  Run(Config),
  /// `--help` was given; holds the rendered usage text.
  Help(String),
}

/// Parse `args` (including the program name).
///
/// # Errors
///
/// Returns [`Error::Usage`] with the rendered parser message for unknown
/// options, missing pattern values or a malformed seed.
pub fn parse<I, T>(args: I) -> Result<Command>
where
  I: IntoIterator<Item = T>,
  T: Into<OsString> + Clone,
{
  match Cli::try_parse_from(args) {
    Ok(cli) => Ok(Command::Run(cli.into())),
    Err(e) if e.kind() == ErrorKind::DisplayHelp => Ok(Command::Help(e.render().to_string())),
    Err(e) => Err(Error::Usage(e.render().to_string())),
  }
}

/// Seed derived from the wall clock, used when none is given.
fn clock_seed() -> u32 {
  SystemTime::now()
    .duration_since(SystemTime::UNIX_EPOCH)
    .map_or(0, |d| d.as_nanos() as u32)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(args: &[&str]) -> Config {
    match parse(std::iter::once("checkasm").chain(args.iter().copied())).unwrap() {
      Command::Run(config) => config,
      Command::Help(_) => panic!("unexpected help"),
    }
  }

  #[test]
  fn test_defaults() {
    let config = run(&["42"]);
    assert_eq!(config, Config::with_seed(42));
  }

  #[test]
  fn test_patterns() {
    let config = run(&["--test=blur", "-f", "be_blur*", "7"]);
    assert_eq!(config.test_pattern.as_deref(), Some("blur"));
    assert_eq!(config.function_pattern.as_deref(), Some("be_blur*"));
    assert_eq!(config.seed, 7);

    let config = run(&["-t", "sum", "--function=dot*", "1"]);
    assert_eq!(config.test_pattern.as_deref(), Some("sum"));
    assert_eq!(config.function_pattern.as_deref(), Some("dot*"));
  }

  #[test]
  fn test_flags() {
    let config = run(&["-b", "-c", "-v", "--list-functions", "0"]);
    assert!(config.bench && config.bench_c && config.verbose && config.list_functions);
    assert!(!config.list_tests);

    let config = run(&["--bench", "--bench-c", "--verbose", "--list-tests", "0"]);
    assert!(config.bench && config.bench_c && config.verbose && config.list_tests);
  }

  #[test]
  fn test_help() {
    let parsed = parse(["checkasm", "--help"]).unwrap();
    let Command::Help(text) = parsed else {
      panic!("expected help");
    };
    assert!(text.contains("--list-functions"));
    assert!(text.contains("--bench-c"));
  }

  #[test]
  fn test_usage_errors() {
    assert!(matches!(parse(["checkasm", "--frobnicate"]), Err(Error::Usage(_))));
    assert!(matches!(parse(["checkasm", "-t"]), Err(Error::Usage(_))));
    assert!(matches!(parse(["checkasm", "not-a-seed"]), Err(Error::Usage(_))));
  }
}
