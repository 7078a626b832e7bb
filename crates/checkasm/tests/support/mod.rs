//! Shared fixtures for end-to-end harness runs.

#![allow(dead_code)]

use std::{
  cell::RefCell,
  io::{self, Write},
  rc::Rc,
};

use checkasm::{Caps, Checkasm, Config, Host, Outcome, Reporter, TestModule, Tier};

/// One fake tier so runs do not depend on the machine's SIMD support.
pub const ONE: Caps = Caps::bit(0);
pub const TIERS: &[Tier] = &[Tier::new("ONE", "one", ONE)];

/// In-memory stream that can be read back after the harness is done.
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
  pub fn text(&self) -> String {
    String::from_utf8(self.0.borrow().clone()).unwrap()
  }
}

impl Write for Capture {
  fn write(&mut self, data: &[u8]) -> io::Result<usize> {
    self.0.borrow_mut().extend_from_slice(data);
    Ok(data.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// A host that can run the fake tier and nothing else.
pub fn supported(requested: Caps) -> Caps {
  requested & ONE
}

pub fn host() -> Host {
  Host {
    tiers: TIERS,
    supported,
    cycle_counter: None,
    simd_warmup: None,
    cpu_id: None,
  }
}

pub struct Run {
  pub result: checkasm::Result<Outcome>,
  pub out: String,
  pub err: String,
}

pub fn run_with(config: Config, host: Host, color: bool, tests: &[TestModule]) -> Run {
  let (out, err) = (Capture::default(), Capture::default());
  let reporter = Reporter::new(Box::new(out.clone()), Box::new(err.clone()), color);
  let mut checkasm = Checkasm::new(config, host, reporter);
  let result = checkasm.run(tests);
  drop(checkasm);
  Run {
    result,
    out: out.text(),
    err: err.text(),
  }
}

pub fn run(args: &[&str], tests: &[TestModule]) -> Run {
  let args = std::iter::once("checkasm").chain(args.iter().copied());
  let checkasm::Command::Run(config) = checkasm::config::parse(args).unwrap() else {
    panic!("unexpected help");
  };
  run_with(config, host(), false, tests)
}
