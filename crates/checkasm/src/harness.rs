//! The harness context and dispatch loop.
//!
//! A run goes through the host's tiers weakest first. The first pass runs
//! with no optional capabilities and registers every reference
//! implementation; each later pass adds one tier's flags and, if the host
//! supports anything new, runs every test module again. Modules call
//! [`Checkasm::check_func`] with whatever implementation the current
//! capabilities select; only implementations not seen before are tested,
//! against the newest version of the same function that has not failed.
//!
//! ```ignore
//! fn check_sum(c: &mut Checkasm, caps: Caps) {
//!     let func: SumFn = select_sum(caps);
//!     if let Some(reference) = c.check_func(func, "sum") {
//!         let mut buf = [0u8; 64];
//!         c.rng().fill(&mut buf);
//!         let expected = reference(&buf);
//!         if c.call_new(|| func(&buf)) != Some(expected) {
//!             c.fail("mismatch");
//!         }
//!         if c.bench_func() {
//!             c.bench_new(|| { core::hint::black_box(func(&buf)); });
//!         }
//!     }
//!     c.report("sum");
//! }
//! ```

use core::fmt;
use std::process::ExitCode;

use platform::{Caps, Tier, tier};

use crate::{
  bench::{self, Decicycles},
  config::Config,
  error::{Error, Result},
  guard,
  names::wildcard_match,
  registry::{NodeId, Registration, Registry},
  report::Reporter,
  rng::Rng,
};

/// Longest accepted function name, exclusive.
pub const MAX_NAME_LEN: usize = 256;

/// A group of checks run once per tier.
#[derive(Clone, Copy, Debug)]
pub struct TestModule {
  /// Name matched against `--test` and printed in report lines.
  pub name: &'static str,

  /// Entry point; receives the capabilities selected for this pass.
  pub check: fn(&mut Checkasm, Caps),
}

impl TestModule {
  /// Create a new test module.
  #[must_use]
  pub const fn new(name: &'static str, check: fn(&mut Checkasm, Caps)) -> Self {
    Self { name, check }
  }
}

/// CPU identification printed in the startup banner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuIdent {
  pub brand: String,
  pub signature: u32,
}

/// Everything the harness needs to know about the machine.
#[derive(Clone, Debug)]
pub struct Host {
  /// Tiers to run after the reference pass, weakest first.
  pub tiers: &'static [Tier],

  /// Restricts requested flags to what the host can run.
  pub supported: fn(Caps) -> Caps,

  /// Cycle counter read, if the target has one.
  pub cycle_counter: Option<fn() -> u64>,

  /// Run before guarded invocations to wake up wide vector units.
  pub simd_warmup: Option<fn()>,

  pub cpu_id: Option<CpuIdent>,
}

impl Host {
  /// Describe the machine this process runs on.
  #[must_use]
  pub fn detect() -> Self {
    Self {
      tiers: platform::TIERS,
      supported: platform::supported,
      cycle_counter: platform::CYCLE_COUNTER,
      simd_warmup: platform::timer::simd_warmup(platform::caps()),
      cpu_id: detect_cpu_id(),
    }
  }

  /// Restrict `requested` to what this host supports.
  #[inline]
  #[must_use]
  pub fn supported(&self, requested: Caps) -> Caps {
    (self.supported)(requested)
  }
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
fn detect_cpu_id() -> Option<CpuIdent> {
  let id = platform::cpuid::CpuId::query();
  Some(CpuIdent {
    brand: id.brand().to_owned(),
    signature: id.signature,
  })
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
fn detect_cpu_id() -> Option<CpuIdent> {
  None
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
  /// Tests or functions were listed; nothing ran.
  Listed,
  /// No function was checked.
  NoTests,
  /// Every checked function passed.
  Passed { checked: u32 },
  /// At least one function failed.
  Failed { failed: u32, checked: u32 },
}

impl Outcome {
  /// Process exit status for this outcome.
  #[must_use]
  pub fn exit_code(self) -> ExitCode {
    match self {
      Self::Failed { .. } => ExitCode::FAILURE,
      Self::Listed | Self::NoTests | Self::Passed { .. } => ExitCode::SUCCESS,
    }
  }
}

/// Harness state shared with test modules.
#[derive(Debug)]
pub struct Checkasm {
  config: Config,
  host: Host,
  reporter: Reporter,
  registry: Registry,
  rng: Rng,

  /// Capabilities selected for the current pass.
  caps: Caps,
  current_test: &'static str,
  /// Function whose newest version is under test.
  current: Option<NodeId>,
  num_checked: u32,
  num_failed: u32,
  /// Setup-fatal error raised from inside a test module.
  fatal: Option<Error>,
}

impl Checkasm {
  /// Create a harness for `host`, reporting through `reporter`.
  #[must_use]
  pub fn new(config: Config, host: Host, reporter: Reporter) -> Self {
    let rng = Rng::new(config.seed);
    Self {
      config,
      host,
      reporter,
      registry: Registry::new(),
      rng,
      caps: Caps::NONE,
      current_test: "",
      current: None,
      num_checked: 0,
      num_failed: 0,
      fatal: None,
    }
  }

  /// Run `tests` on every tier and print the summary.
  ///
  /// # Errors
  ///
  /// - [`Error::BenchUnsupported`] if benchmarking was requested without a
  ///   cycle counter.
  /// - [`Error::CycleCounterUnavailable`] if the counter faults when probed.
  /// - [`Error::Alloc`] if the registry could not grow.
  /// - [`Error::Io`] if writing a report stream failed.
  pub fn run(&mut self, tests: &[TestModule]) -> Result<Outcome> {
    if self.config.list_tests {
      for test in tests {
        self.reporter.out_line(format_args!("{}", test.name));
      }
      self.reporter.finish()?;
      return Ok(Outcome::Listed);
    }

    if self.config.bench {
      let Some(read) = self.host.cycle_counter else {
        return Err(Error::BenchUnsupported);
      };
      guard::install();
      if guard::call(read).is_err() {
        return Err(Error::CycleCounterUnavailable);
      }
    } else {
      guard::install();
    }

    if !self.config.list_functions {
      if let Some(warmup) = self.host.simd_warmup {
        warmup();
      }
      self.banner();
    }

    self.check_tier(None, Caps::NONE, tests);

    if self.config.list_functions {
      let Self { registry, reporter, .. } = self;
      registry.in_order(|name, _| reporter.out_line(format_args!("{name}")));
      self.finish()?;
      return Ok(Outcome::Listed);
    }

    for tier in self.host.tiers {
      if self.fatal.is_some() {
        break;
      }
      self.check_tier(Some(tier.name), tier.flags, tests);
    }

    let outcome = if self.num_checked == 0 {
      Outcome::NoTests
    } else if self.num_failed > 0 {
      Outcome::Failed {
        failed: self.num_failed,
        checked: self.num_checked,
      }
    } else {
      Outcome::Passed {
        checked: self.num_checked,
      }
    };

    if self.fatal.is_none() {
      self.summary(outcome);
    }
    self.finish()?;
    Ok(outcome)
  }

  fn finish(&mut self) -> Result<()> {
    if let Some(err) = self.fatal.take() {
      self.registry.clear();
      return Err(err);
    }
    self.reporter.finish()?;
    Ok(())
  }

  fn banner(&mut self) {
    let seed = self.config.seed;
    match &self.host.cpu_id {
      Some(cpu) => self.reporter.err_line(format_args!(
        "checkasm: {} ({:08X}) using random seed {seed}",
        cpu.brand, cpu.signature
      )),
      None => self.reporter.err_line(format_args!("checkasm: using random seed {seed}")),
    }
  }

  fn summary(&mut self, outcome: Outcome) {
    match outcome {
      Outcome::Listed => {}
      Outcome::NoTests => self.reporter.err_line(format_args!("checkasm: no tests to perform")),
      Outcome::Failed { failed, checked } => self
        .reporter
        .err_line(format_args!("checkasm: {failed} of {checked} tests have failed")),
      Outcome::Passed { checked } => {
        self.reporter.err_line(format_args!("checkasm: all {checked} tests passed"));
        if self.config.bench
          && let Some(read) = self.host.cycle_counter
        {
          self.print_benchs(bench::measure_nop_time(read));
        }
      }
    }
  }

  fn print_benchs(&mut self, nop: u32) {
    let Self {
      registry,
      reporter,
      host,
      config,
      ..
    } = self;

    reporter.out_line(format_args!("nop: {}", Decicycles(i64::from(nop))));
    registry.in_order(|name, versions| {
      let has_optimized = versions.first().is_some_and(|v| !v.caps.is_empty()) || versions.len() > 1;
      if !(config.bench_c || has_optimized) {
        return;
      }
      for version in versions.iter().filter(|v| v.iterations > 0) {
        let suffix = tier::suffix(host.tiers, version.caps);
        let cost = bench::per_call(version.cycles, version.iterations, nop);
        reporter.out_line(format_args!("{name}_{suffix}: {cost}"));
      }
    });
  }

  /// Run every selected test module with `flags` added to the current set,
  /// if that changes what the host supports.
  fn check_tier(&mut self, name: Option<&'static str>, flags: Caps, tests: &[TestModule]) {
    let previous = self.caps;
    let requested = flags | previous;
    self.caps = self.host.supported(requested);

    if !requested.is_empty() && self.caps == previous {
      tracing::debug!(tier = name, "tier unsupported by host, skipping");
      return;
    }

    tracing::debug!(tier = name.unwrap_or("reference"), caps = ?self.caps, "running tier");
    self.reporter.begin_tier(name);

    for test in tests {
      if let Some(pattern) = &self.config.test_pattern
        && !wildcard_match(test.name, pattern)
      {
        continue;
      }
      if self.fatal.is_some() {
        return;
      }

      self.rng.reseed(self.config.seed);
      self.current_test = test.name;
      tracing::trace!(test = test.name, "running test module");
      (test.check)(self, self.caps);
    }
  }

  /// Register `func` as the implementation of `name` for the current
  /// capabilities and decide whether it needs testing.
  ///
  /// Returns the implementation to compare against (the newest earlier
  /// version that has not failed, or `func` itself on the reference pass),
  /// or `None` if `func` was already tested, the name is filtered out, or
  /// functions are only being listed.
  pub fn check_func<F>(&mut self, func: F, name: impl fmt::Display) -> Option<F>
  where
    F: Copy + PartialEq + 'static,
  {
    self.current = None;
    if self.fatal.is_some() {
      return None;
    }

    let name = name.to_string();
    if name.is_empty() || name.len() >= MAX_NAME_LEN {
      tracing::debug!(len = name.len(), "function name out of range, skipping");
      return None;
    }
    if let Some(pattern) = &self.config.function_pattern
      && !wildcard_match(&name, pattern)
    {
      return None;
    }

    let registered = self
      .registry
      .find_or_create(&name)
      .and_then(|node| {
        if self.config.list_functions {
          return Ok(None);
        }
        self.registry.register_version(node, func, self.caps).map(|r| Some((node, r)))
      });

    match registered {
      Ok(Some((node, Registration::Test { reference }))) => {
        self.current = Some(node);
        self.rng.reseed(self.config.seed);
        if !self.caps.is_empty() || self.config.bench_c {
          self.num_checked += 1;
        }
        Some(reference)
      }
      Ok(Some((_, Registration::AlreadyTested)) | None) => None,
      Err(err) => {
        tracing::error!(%err, function = %name, "registry allocation failed");
        self.fatal = Some(err);
        None
      }
    }
  }

  /// Call the implementation under test with fault interception.
  ///
  /// Returns `None` after recording a failure if it faulted.
  pub fn call_new<R>(&mut self, f: impl FnOnce() -> R) -> Option<R> {
    if let Some(warmup) = self.host.simd_warmup {
      warmup();
    }
    match guard::call(f) {
      Ok(value) => Some(value),
      Err(fault) => {
        self.fail(fault);
        None
      }
    }
  }

  /// Record a failure of the function under test.
  ///
  /// Only the first failure of an optimized version is printed and counted.
  /// Returns `true` if the run is verbose, so the caller can print details.
  pub fn fail(&mut self, msg: impl fmt::Display) -> bool {
    if let Some(node) = self.current
      && let Some(version) = self.registry.latest_mut(node)
      && !version.caps.is_empty()
      && version.ok
    {
      version.ok = false;
      let caps = version.caps;
      self.num_failed += 1;

      let suffix = tier::suffix(self.host.tiers, caps);
      self.reporter.failure(self.registry.name(node), suffix, &msg);
    }
    self.config.verbose
  }

  /// `true` if the function under test should be benchmarked.
  #[inline]
  #[must_use]
  pub fn bench_func(&self) -> bool {
    self.num_failed == 0 && self.config.bench
  }

  /// Benchmark the implementation under test.
  ///
  /// Without benchmarking this is a single guarded call.
  pub fn bench_new(&mut self, mut f: impl FnMut()) {
    let read = match self.host.cycle_counter {
      Some(read) if self.bench_func() => read,
      _ => {
        self.call_new(f);
        return;
      }
    };

    if let Some(warmup) = self.host.simd_warmup {
      warmup();
    }
    match guard::call(|| bench::run_batches(read, &mut f)) {
      Ok((batches, cycles)) => self.update_bench(batches, cycles),
      Err(fault) => {
        self.fail(fault);
      }
    }
  }

  /// Add `iterations` timed batches costing `cycles` to the function under
  /// test.
  pub fn update_bench(&mut self, iterations: u64, cycles: u64) {
    if let Some(node) = self.current
      && let Some(version) = self.registry.latest_mut(node)
    {
      version.iterations += iterations;
      version.cycles += cycles;
    }
  }

  /// Print the outcome of the functions checked since the previous report.
  pub fn report(&mut self, label: impl fmt::Display) {
    let label = label.to_string();
    let reference_pass = self.caps.is_empty();
    self
      .reporter
      .module(self.current_test, &label, self.num_checked, self.num_failed, reference_pass);
  }

  /// Input generator, reseeded before every module and every selected
  /// implementation.
  #[inline]
  pub fn rng(&mut self) -> &mut Rng {
    &mut self.rng
  }

  /// Capabilities selected for the current pass.
  #[inline]
  #[must_use]
  pub fn caps(&self) -> Caps {
    self.caps
  }

  /// Whether `--verbose` was given.
  #[inline]
  #[must_use]
  pub fn verbose(&self) -> bool {
    self.config.verbose
  }

  /// Number of functions checked so far.
  #[inline]
  #[must_use]
  pub fn num_checked(&self) -> u32 {
    self.num_checked
  }

  /// Number of functions failed so far.
  #[inline]
  #[must_use]
  pub fn num_failed(&self) -> u32 {
    self.num_failed
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, io, rc::Rc};

  use super::*;

  const FAKE_TIERS: &[Tier] = &[
    Tier::new("ONE", "one", Caps::bit(0)),
    Tier::new("TWO", "two", Caps::bit(1)),
  ];

  #[derive(Clone, Default)]
  struct Buf(Rc<RefCell<Vec<u8>>>);

  impl Buf {
    fn text(&self) -> String {
      String::from_utf8(self.0.borrow().clone()).unwrap()
    }
  }

  impl io::Write for Buf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
      self.0.borrow_mut().extend_from_slice(data);
      Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  fn only_one(requested: Caps) -> Caps {
    requested & Caps::bit(0)
  }

  fn one_and_two(requested: Caps) -> Caps {
    requested & (Caps::bit(0) | Caps::bit(1))
  }

  fn nothing(_: Caps) -> Caps {
    Caps::NONE
  }

  fn host(supported: fn(Caps) -> Caps) -> Host {
    Host {
      tiers: FAKE_TIERS,
      supported,
      cycle_counter: None,
      simd_warmup: None,
      cpu_id: None,
    }
  }

  fn harness(config: Config, supported: fn(Caps) -> Caps) -> (Checkasm, Buf, Buf) {
    let (out, err) = (Buf::default(), Buf::default());
    let reporter = Reporter::new(Box::new(out.clone()), Box::new(err.clone()), false);
    (Checkasm::new(config, host(supported), reporter), out, err)
  }

  type Unary = fn(u32) -> u32;

  fn inc_ref(x: u32) -> u32 {
    x.wrapping_add(1)
  }

  fn inc_fast(x: u32) -> u32 {
    x.wrapping_add(core::hint::black_box(1))
  }

  fn inc_wrong(x: u32) -> u32 {
    x.wrapping_add(2)
  }

  fn select(caps: Caps) -> Unary {
    if caps.has(Caps::bit(1)) {
      inc_wrong
    } else if caps.has(Caps::bit(0)) {
      inc_fast
    } else {
      inc_ref
    }
  }

  fn check_inc(c: &mut Checkasm, caps: Caps) {
    let func = select(caps);
    if let Some(reference) = c.check_func(func, "inc") {
      let x = c.rng().next_u32();
      if c.call_new(|| func(x)) != Some(reference(x)) {
        c.fail("mismatch");
      }
    }
    c.report("inc");
  }

  const TESTS: &[TestModule] = &[TestModule::new("inc", check_inc)];

  #[test]
  fn test_tiers_skip_unsupported() {
    let (mut c, _, err) = harness(Config::with_seed(1), only_one);
    assert_eq!(c.run(TESTS).unwrap(), Outcome::Passed { checked: 1 });
    assert_eq!(
      err.text(),
      "checkasm: using random seed 1\nONE:\n - inc.inc [OK]\ncheckasm: all 1 tests passed\n"
    );
  }

  #[test]
  fn test_failure_is_reported_once() {
    let (mut c, _, err) = harness(Config::with_seed(1), one_and_two);
    assert_eq!(c.run(TESTS).unwrap(), Outcome::Failed { failed: 1, checked: 2 });
    let text = err.text();
    assert!(text.contains("TWO:\n   inc_two (mismatch)\n - inc.inc [FAILED]\n"), "{text}");
    assert!(text.ends_with("checkasm: 1 of 2 tests have failed\n"));
  }

  #[test]
  fn test_reference_pass_not_counted_without_bench_c() {
    let (mut c, _, _) = harness(Config::with_seed(1), nothing);
    assert_eq!(c.run(TESTS).unwrap(), Outcome::NoTests);

    let mut config = Config::with_seed(1);
    config.bench_c = true;
    let (mut c, _, _) = harness(config, nothing);
    assert_eq!(c.run(TESTS).unwrap(), Outcome::Passed { checked: 1 });
  }

  #[test]
  fn test_name_limits() {
    let (mut c, _, _) = harness(Config::with_seed(1), only_one);
    assert_eq!(c.check_func::<Unary>(inc_ref, ""), None);
    assert_eq!(c.check_func::<Unary>(inc_ref, "x".repeat(MAX_NAME_LEN)), None);
    assert!(c.check_func::<Unary>(inc_ref, "x".repeat(MAX_NAME_LEN - 1)).is_some());
  }

  #[test]
  fn test_fail_without_current_is_noop() {
    let mut config = Config::with_seed(1);
    config.verbose = true;
    let (mut c, _, err) = harness(config, only_one);
    assert!(c.fail("nothing selected"));
    assert_eq!(c.num_failed(), 0);
    assert_eq!(err.text(), "");
  }

  #[test]
  fn test_list_functions_in_natural_order() {
    fn check_many(c: &mut Checkasm, _: Caps) {
      for n in [10, 2, 1] {
        let _ = c.check_func::<Unary>(inc_ref, format_args!("blur{n}"));
      }
    }

    let mut config = Config::with_seed(1);
    config.list_functions = true;
    let (mut c, out, err) = harness(config, only_one);
    assert_eq!(c.run(&[TestModule::new("blur", check_many)]).unwrap(), Outcome::Listed);
    assert_eq!(out.text(), "blur1\nblur2\nblur10\n");
    assert_eq!(err.text(), "");
  }

  #[test]
  fn test_detected_host_asks_platform() {
    let host = Host::detect();
    let every_tier = host.tiers.iter().fold(Caps::NONE, |acc, tier| acc | tier.flags);
    assert_eq!(host.supported(every_tier), platform::supported(every_tier));
    assert_eq!(host.supported(Caps::NONE), Caps::NONE);
  }

  #[test]
  fn test_supported_comes_from_host() {
    assert_eq!(host(only_one).supported(Caps::bit(0) | Caps::bit(1)), Caps::bit(0));
    assert_eq!(host(nothing).supported(Caps::bit(0)), Caps::NONE);
  }

  #[test]
  fn test_bench_unsupported() {
    let mut config = Config::with_seed(1);
    config.bench = true;
    let (mut c, _, _) = harness(config, only_one);
    assert!(matches!(c.run(TESTS), Err(Error::BenchUnsupported)));
  }

  #[test]
  fn test_banner_with_cpu_id() {
    let (out, err) = (Buf::default(), Buf::default());
    let reporter = Reporter::new(Box::new(out), Box::new(err.clone()), false);
    let mut host = host(nothing);
    host.cpu_id = Some(CpuIdent {
      brand: "Test CPU".to_owned(),
      signature: 0xa06a4,
    });
    let mut c = Checkasm::new(Config::with_seed(9), host, reporter);
    assert_eq!(c.run(&[]).unwrap(), Outcome::NoTests);
    assert_eq!(
      err.text(),
      "checkasm: Test CPU (000A06A4) using random seed 9\ncheckasm: no tests to perform\n"
    );
  }
}
