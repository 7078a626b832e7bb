//! Console output.
//!
//! Progress, failures and the summary go to the error stream; listings and
//! benchmark results go to the output stream so they can be piped. Colors are
//! ANSI escapes, enabled only when stderr is a terminal and `TERM` is not
//! `dumb`.
//!
//! The first write error is remembered and returned by [`Reporter::finish`];
//! later writes are still attempted.

use std::{
  fmt,
  io::{self, IsTerminal, Write},
};

/// Foreground colors used by the reporter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
  Red = 1,
  Green = 2,
  Yellow = 3,
}

/// Writes harness output and tracks per-module report state.
pub struct Reporter {
  out: Box<dyn Write>,
  err: Box<dyn Write>,
  color: bool,
  error: Option<io::Error>,

  /// Tier header not yet printed.
  pending_tier: Option<&'static str>,
  prev_checked: u32,
  prev_failed: u32,
  /// Longest `test` + `label` seen during the reference pass.
  max_len: usize,
}

impl fmt::Debug for Reporter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Reporter")
      .field("color", &self.color)
      .field("pending_tier", &self.pending_tier)
      .field("prev_checked", &self.prev_checked)
      .field("prev_failed", &self.prev_failed)
      .field("max_len", &self.max_len)
      .finish_non_exhaustive()
  }
}

impl Reporter {
  /// Report to arbitrary streams.
  #[must_use]
  pub fn new(out: Box<dyn Write>, err: Box<dyn Write>, color: bool) -> Self {
    Self {
      out,
      err,
      color,
      error: None,
      pending_tier: None,
      prev_checked: 0,
      prev_failed: 0,
      max_len: 0,
    }
  }

  /// Report to the process's stdout and stderr.
  #[must_use]
  pub fn stdio() -> Self {
    Self::new(Box::new(io::stdout()), Box::new(io::stderr()), stderr_supports_color())
  }

  /// Write a line to the output stream.
  pub fn out_line(&mut self, args: fmt::Arguments<'_>) {
    let result = writeln!(self.out, "{args}");
    self.keep(result);
  }

  /// Write a line to the error stream.
  pub fn err_line(&mut self, args: fmt::Arguments<'_>) {
    let result = writeln!(self.err, "{args}");
    self.keep(result);
  }

  /// Write `text` to the error stream in `color`.
  pub fn colored(&mut self, color: Color, text: fmt::Arguments<'_>) {
    let result = if self.color {
      write!(self.err, "\x1b[0;3{}m{text}\x1b[0m", color as u8)
    } else {
      write!(self.err, "{text}")
    };
    self.keep(result);
  }

  /// Start a tier; its header is printed before the first line it reports.
  pub fn begin_tier(&mut self, name: Option<&'static str>) {
    self.pending_tier = name;
  }

  fn tier_header(&mut self) {
    if let Some(name) = self.pending_tier.take() {
      self.colored(Color::Yellow, format_args!("{name}:\n"));
    }
  }

  /// Report the first failure of function `name` built for `suffix`.
  pub fn failure(&mut self, name: &str, suffix: &str, msg: &dyn fmt::Display) {
    self.tier_header();
    self.err_line(format_args!("   {name}_{suffix} ({msg})"));
  }

  /// Per-module report line.
  ///
  /// Prints ` - <test>.<label>   [OK]` if functions were checked since the
  /// previous call. Otherwise, during the reference pass, only measures the
  /// line so later tiers align their brackets.
  pub fn module(&mut self, test: &str, label: &str, checked: u32, failed: u32, reference_pass: bool) {
    if checked > self.prev_checked {
      self.tier_header();

      let pad = self.max_len.saturating_sub(test.len() + label.len()) + 2;
      let result = write!(self.err, " - {test}.{label}{:>pad$}", '[');
      self.keep(result);

      if failed == self.prev_failed {
        self.colored(Color::Green, format_args!("OK"));
      } else {
        self.colored(Color::Red, format_args!("FAILED"));
      }
      self.err_line(format_args!("]"));

      self.prev_checked = checked;
      self.prev_failed = failed;
    } else if reference_pass {
      self.max_len = self.max_len.max(test.len() + label.len());
    }
  }

  /// Flush both streams and return the first write error, if any.
  ///
  /// # Errors
  ///
  /// Returns the first error hit by any write since the previous call.
  pub fn finish(&mut self) -> io::Result<()> {
    let out = self.out.flush();
    self.keep(out);
    let err = self.err.flush();
    self.keep(err);
    self.error.take().map_or(Ok(()), Err)
  }

  fn keep(&mut self, result: io::Result<()>) {
    if let Err(e) = result
      && self.error.is_none()
    {
      self.error = Some(e);
    }
  }
}

/// `true` if stderr is a terminal and `TERM` allows colors.
#[must_use]
pub fn stderr_supports_color() -> bool {
  let term_ok = std::env::var_os("TERM").is_some_and(|term| term != "dumb");
  term_ok && io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;

  #[derive(Clone, Default)]
  struct Buf(Rc<RefCell<Vec<u8>>>);

  impl Buf {
    fn text(&self) -> String {
      String::from_utf8(self.0.borrow().clone()).unwrap()
    }
  }

  impl Write for Buf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
      self.0.borrow_mut().extend_from_slice(data);
      Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  struct Broken;

  impl Write for Broken {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
      Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  fn reporter(color: bool) -> (Reporter, Buf, Buf) {
    let (out, err) = (Buf::default(), Buf::default());
    (Reporter::new(Box::new(out.clone()), Box::new(err.clone()), color), out, err)
  }

  #[test]
  fn test_alignment_from_reference_pass() {
    let (mut r, _, err) = reporter(false);
    r.module("blur", "horizontal", 0, 0, true);
    r.module("be_blur", "x", 0, 0, true);
    r.begin_tier(Some("SSE2"));
    r.module("blur", "horizontal", 1, 0, false);
    r.module("be_blur", "x", 2, 1, false);

    let expected = concat!(
      "SSE2:\n",
      " - blur.horizontal [OK]\n",
      " - be_blur.x       [FAILED]\n",
    );
    assert_eq!(err.text(), expected);
  }

  #[test]
  fn test_nothing_checked_prints_nothing() {
    let (mut r, _, err) = reporter(false);
    r.begin_tier(Some("AVX2"));
    r.module("blur", "h", 0, 0, false);
    assert_eq!(err.text(), "");
  }

  #[test]
  fn test_failure_line_and_header_once() {
    let (mut r, _, err) = reporter(false);
    r.begin_tier(Some("NEON"));
    r.failure("sum", "neon", &"mismatch");
    r.failure("dot", "neon", &"illegal instruction");
    assert_eq!(err.text(), "NEON:\n   sum_neon (mismatch)\n   dot_neon (illegal instruction)\n");
  }

  #[test]
  fn test_colors() {
    let (mut r, _, err) = reporter(true);
    r.module("t", "l", 1, 0, false);
    assert_eq!(err.text(), " - t.l [\x1b[0;32mOK\x1b[0m]\n");
  }

  #[test]
  fn test_out_stream() {
    let (mut r, out, err) = reporter(true);
    r.out_line(format_args!("alpha"));
    assert_eq!(out.text(), "alpha\n");
    assert_eq!(err.text(), "");
  }

  #[test]
  fn test_write_error_surfaces_once() {
    let mut r = Reporter::new(Box::new(Broken), Box::new(io::sink()), false);
    r.out_line(format_args!("a"));
    r.out_line(format_args!("b"));
    assert_eq!(r.finish().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    assert!(r.finish().is_ok());
  }
}
