//! Fault recovery for code under test.
//!
//! A broken optimized kernel tends to die with a hardware fault rather than a
//! wrong answer. [`call`] runs a closure with interception armed: a SIGFPE,
//! SIGILL, SIGSEGV or SIGBUS raised on this thread jumps straight back to the
//! guard, which returns the [`Fault`] so the harness can record a failure and
//! move on to the next function.
//!
//! Interception is only armed for the duration of [`call`]. A fault outside
//! of it restores the default disposition and re-raises, so genuine harness
//! crashes still terminate the process with the original signal.
//!
//! Recovery unwinds nothing: frames between the fault and the guard are
//! abandoned without running destructors. Code under test should keep its
//! owned state outside the guarded closure.
//!
//! Panics are caught before they reach the `sigsetjmp` frame, which is an
//! `extern "C"` boundary that would otherwise abort the process. They are
//! reported as [`Fault::Panic`].
//!
//! On targets without POSIX signals the closure runs with panics caught but
//! hardware faults unguarded. Windows in particular has no vectored exception
//! handler here yet, so a crashing kernel takes the whole run down there.

#![allow(unsafe_code)]

use core::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Hardware fault caught while running guarded code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
  /// SIGFPE.
  Arithmetic,
  /// SIGILL.
  IllegalInstruction,
  /// SIGSEGV or SIGBUS.
  Segmentation,
  /// The guarded closure panicked.
  Panic,
}

impl Fault {
  /// Classify a signal number.
  #[must_use]
  pub fn from_signal(signal: i32) -> Option<Self> {
    #[cfg(unix)]
    {
      match signal {
        libc::SIGFPE => Some(Self::Arithmetic),
        libc::SIGILL => Some(Self::IllegalInstruction),
        libc::SIGSEGV | libc::SIGBUS => Some(Self::Segmentation),
        _ => None,
      }
    }
    #[cfg(not(unix))]
    {
      let _ = signal;
      None
    }
  }

  /// Message recorded as the failure reason.
  #[must_use]
  pub const fn message(self) -> &'static str {
    match self {
      Self::Arithmetic => "fatal arithmetic error",
      Self::IllegalInstruction => "illegal instruction",
      Self::Segmentation => "segmentation fault",
      Self::Panic => "panicked",
    }
  }
}

impl fmt::Display for Fault {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.message())
  }
}

#[cfg(unix)]
mod imp {
  use core::{cell::Cell, ffi::c_void, ptr};
  use std::sync::Once;

  use libc::c_int;

  use super::Fault;

  const SIGNALS: [c_int; 4] = [libc::SIGBUS, libc::SIGFPE, libc::SIGILL, libc::SIGSEGV];

  thread_local! {
    /// Jump target of the innermost active guard; null while disarmed.
    static TARGET: Cell<*const c_void> = const { Cell::new(ptr::null()) };
  }

  static INSTALL: Once = Once::new();

  pub(super) fn install() {
    INSTALL.call_once(|| {
      for signal in SIGNALS {
        // SAFETY: `sigaction` is plain old data; all-zero is a valid empty
        // action which is then filled in below.
        let mut action: libc::sigaction = unsafe { core::mem::zeroed() };
        action.sa_sigaction = on_fault as extern "C" fn(c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_NODEFER;
        // SAFETY: `action.sa_mask` is a valid, writable signal set.
        unsafe { libc::sigemptyset(&mut action.sa_mask) };
        // SAFETY: `on_fault` is async-signal-safe: it touches a const-initialized
        // thread-local and either jumps or re-raises.
        let rc = unsafe { libc::sigaction(signal, &action, ptr::null_mut()) };
        if rc != 0 {
          tracing::warn!(signal, "failed to install fault handler");
        }
      }
      tracing::debug!("fault handlers installed");
    });
  }

  extern "C" fn on_fault(signal: c_int) {
    let target = TARGET.with(|t| t.replace(ptr::null()));
    if target.is_null() {
      // SAFETY: restoring the default disposition and re-raising from the
      // handler is the documented way to terminate with the original signal.
      unsafe {
        let mut action: libc::sigaction = core::mem::zeroed();
        action.sa_sigaction = libc::SIG_DFL;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signal, &action, ptr::null_mut());
        libc::raise(signal);
      }
      return;
    }
    // SAFETY: `target` was published by `call` from inside
    // `call_with_sigsetjmp` on this thread and is cleared before that frame
    // returns, so the jump buffer is live.
    unsafe { cee_scape::siglongjmp(target.cast(), signal) }
  }

  pub(super) fn call<R>(f: impl FnOnce() -> R) -> Result<R, Fault> {
    install();

    let previous = TARGET.with(Cell::get);
    let mut slot = None;

    let signal = cee_scape::call_with_sigsetjmp(true, |env| {
      let target: *const _ = env;
      TARGET.with(|t| t.set(target.cast()));
      slot = Some(f());
      TARGET.with(|t| t.set(ptr::null()));
      0
    });

    TARGET.with(|t| t.set(previous));

    match slot {
      Some(value) if signal == 0 => Ok(value),
      _ => {
        let fault = Fault::from_signal(signal).unwrap_or(Fault::Segmentation);
        tracing::debug!(signal, %fault, "recovered from fault");
        Err(fault)
      }
    }
  }
}

#[cfg(not(unix))]
mod imp {
  use super::Fault;

  pub(super) fn install() {}

  pub(super) fn call<R>(f: impl FnOnce() -> R) -> Result<R, Fault> {
    Ok(f())
  }
}

/// Install the process-wide fault handlers. Idempotent.
///
/// [`call`] installs them on first use; the harness calls this up front so
/// faults in its own setup are reported with the default disposition.
pub fn install() {
  imp::install();
}

/// Run `f` with fault interception armed.
///
/// # Errors
///
/// Returns the [`Fault`] if `f` raised one of the intercepted signals or
/// panicked.
pub fn call<R>(f: impl FnOnce() -> R) -> Result<R, Fault> {
  imp::call(|| panic::catch_unwind(AssertUnwindSafe(f)))?.map_err(|payload| {
    let reason = payload
      .downcast_ref::<&str>()
      .copied()
      .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
      .unwrap_or("non-string payload");
    tracing::debug!(reason, "guarded closure panicked");
    Fault::Panic
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages() {
    assert_eq!(Fault::Arithmetic.to_string(), "fatal arithmetic error");
    assert_eq!(Fault::IllegalInstruction.to_string(), "illegal instruction");
    assert_eq!(Fault::Segmentation.to_string(), "segmentation fault");
    assert_eq!(Fault::Panic.to_string(), "panicked");
  }

  #[test]
  fn test_passthrough() {
    assert_eq!(call(|| 40 + 2), Ok(42));
  }

  #[test]
  fn test_panic_becomes_fault() {
    let boom = || -> u32 { panic!("kernel overran its buffer") };
    assert_eq!(call(boom), Err(Fault::Panic));
    assert_eq!(call(|| String::from("after")), Ok(String::from("after")));
  }

  #[test]
  #[cfg(all(unix, not(miri)))]
  fn test_classify() {
    assert_eq!(Fault::from_signal(libc::SIGFPE), Some(Fault::Arithmetic));
    assert_eq!(Fault::from_signal(libc::SIGILL), Some(Fault::IllegalInstruction));
    assert_eq!(Fault::from_signal(libc::SIGSEGV), Some(Fault::Segmentation));
    assert_eq!(Fault::from_signal(libc::SIGBUS), Some(Fault::Segmentation));
    assert_eq!(Fault::from_signal(libc::SIGINT), None);
  }

  #[test]
  #[cfg(all(unix, not(miri)))]
  fn test_recovers_and_rearms() {
    let raise = |signal| {
      // SAFETY: raising a signal on the current thread.
      unsafe { libc::raise(signal) };
      0
    };
    assert_eq!(call(|| raise(libc::SIGFPE)), Err(Fault::Arithmetic));
    assert_eq!(call(|| raise(libc::SIGILL)), Err(Fault::IllegalInstruction));
    assert_eq!(call(|| 7), Ok(7));
  }
}
