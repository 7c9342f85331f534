//! Per-test deadline enforcement.
//!
//! The deadline is process-local: it is armed inside the process that runs
//! the test body, and on expiry that process prints a diagnostic and
//! terminates itself with [`EXIT_TIMEOUT`]. The supervisor never reaches into
//! a running child; it only observes the distinguished exit status.
//!
//! The mechanism is behind the [`Deadline`] trait so the dispatcher can be
//! exercised with a recording fake instead of a real interval timer.

use crate::status::ExecError;
#[cfg(unix)]
use crate::status::EXIT_TIMEOUT;

/// One-shot wall-clock deadline for the current process.
pub trait Deadline {
    /// Install an expiration `limit_secs` from now.
    fn arm(&self, limit_secs: f64) -> Result<(), ExecError>;

    /// Cancel the pending expiration. Disarming after the deadline would
    /// have fired (the body finished first) is a benign no-op.
    fn disarm(&self) -> Result<(), ExecError>;
}

/// POSIX interval-timer deadline (`setitimer` + `SIGALRM`).
///
/// On non-Unix hosts both operations are no-ops; isolation itself is
/// unavailable there, so nothing would observe the timeout status anyway.
#[derive(Debug, Default)]
pub struct ItimerDeadline;

#[cfg(unix)]
extern "C" fn alarm_handler(_sig: libc::c_int) {
    // Async-signal-safe: write(2) and _exit(2) only.
    const MSG: &[u8] = b"Test time limit exceeded\n";
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            MSG.as_ptr() as *const libc::c_void,
            MSG.len(),
        );
        libc::_exit(EXIT_TIMEOUT);
    }
}

#[cfg(unix)]
fn set_itimer(limit_secs: f64) -> Result<(), ExecError> {
    let secs = limit_secs.max(0.0);
    let tv_sec = secs as libc::time_t;
    let mut tv_usec = ((secs - tv_sec as f64) * 1e6) as libc::suseconds_t;
    if tv_sec == 0 && tv_usec == 0 {
        // A zero itimerval disarms the timer; an expired limit must still fire.
        tv_usec = 1;
    }

    let timer = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval { tv_sec, tv_usec },
    };

    let ret = unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, std::ptr::null_mut()) };
    if ret != 0 {
        return Err(ExecError::last_os("setitimer"));
    }
    Ok(())
}

#[cfg(unix)]
impl Deadline for ItimerDeadline {
    fn arm(&self, limit_secs: f64) -> Result<(), ExecError> {
        // Handler goes in first so a tiny limit cannot hit the default action.
        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = alarm_handler as *const () as usize;
            sa.sa_flags = 0;
            libc::sigemptyset(&mut sa.sa_mask);
            if libc::sigaction(libc::SIGALRM, &sa, std::ptr::null_mut()) != 0 {
                return Err(ExecError::last_os("sigaction"));
            }
        }
        set_itimer(limit_secs)
    }

    fn disarm(&self) -> Result<(), ExecError> {
        unsafe {
            libc::signal(libc::SIGALRM, libc::SIG_DFL);
        }
        let timer = libc::itimerval {
            it_interval: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            it_value: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };
        let ret = unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, std::ptr::null_mut()) };
        if ret != 0 {
            return Err(ExecError::last_os("setitimer"));
        }
        Ok(())
    }
}

#[cfg(not(unix))]
impl Deadline for ItimerDeadline {
    fn arm(&self, _limit_secs: f64) -> Result<(), ExecError> {
        Ok(())
    }

    fn disarm(&self) -> Result<(), ExecError> {
        Ok(())
    }
}
