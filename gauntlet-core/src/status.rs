//! Status codes and executor errors.
//!
//! A child process reports its outcome through its exit status; there is no
//! message channel between supervisor and child. This module owns the code
//! assignments on the child side and their interpretation on the parent side,
//! so the two cannot drift apart.

use thiserror::Error;

/// Exit code of a test process that completed successfully.
pub const EXIT_OK: i32 = 0;

/// Exit code of a test whose body reported a failure.
pub const EXIT_FAILED: i32 = 1;

/// Exit code when the child could not route the test to an execution mode.
pub const EXIT_BAD_STATE: i32 = 2;

/// Exit code for an OS-level failure inside the child (timer, trace setup).
pub const EXIT_UNKNOWN: i32 = 3;

/// Distinguished exit code produced by the deadline timer.
pub const EXIT_TIMEOUT: i32 = 99;

/// Errors of the executor machinery itself.
///
/// A test's own failure is never one of these; it travels through [`Outcome`]
/// and the statistics ledger instead.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The task slot table could not be allocated.
    #[error("out of memory: task slot table allocation failed")]
    OutOfMemory,

    /// An operation was invoked in a state it does not support.
    #[error("bad state: {0}")]
    BadState(&'static str),

    /// An OS primitive failed; `errno` carries the originating error code.
    #[error("{call} failed with errno={errno}")]
    Os {
        /// The primitive that failed (`spawn`, `waitpid`, `setitimer`, ...).
        call: &'static str,
        /// OS error code at the time of failure.
        errno: i32,
    },
}

impl ExecError {
    /// Capture the current OS error for a failed system call.
    pub fn last_os(call: &'static str) -> Self {
        ExecError::Os {
            call,
            errno: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
        }
    }

    /// Wrap an [`std::io::Error`] from a failed OS-facing operation.
    pub fn io(call: &'static str, err: &std::io::Error) -> Self {
        ExecError::Os {
            call,
            errno: err.raw_os_error().unwrap_or(0),
        }
    }
}

/// Final state of one submitted test, as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The test process exited with [`EXIT_OK`].
    Succeeded,
    /// The test process exited with the given non-zero code.
    Failed(i32),
    /// The deadline timer fired inside the test process.
    TimedOut,
    /// The test process was terminated by the given signal.
    Killed(i32),
}

impl Outcome {
    /// Interpret the exit code of a normally-exited test process.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            EXIT_OK => Outcome::Succeeded,
            EXIT_TIMEOUT => Outcome::TimedOut,
            other => Outcome::Failed(other),
        }
    }

    /// Whether this outcome counts as a success in the statistics ledger.
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}
