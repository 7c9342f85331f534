//! Process layer.
//!
//! Spawning and reaping of isolated test processes. A test child is a
//! re-execution of the current binary with a hidden `--exec-child` flag; the
//! supervisor reaps children with `waitpid(-1)` so a single blocking wait
//! covers every in-flight test at once.

use crate::config::ExecConfig;
use gauntlet_core::{ExecError, TestDef};
use std::process::{Child, Command};
use std::time::Duration;

/// How a child left (or interrupted) the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Normal exit with the given code.
    Exited(i32),
    /// Terminated by the given signal.
    Signaled(i32),
    /// Stopped by the given signal; not terminal.
    Stopped(i32),
    /// Resumed after a stop; not terminal.
    Continued,
}

impl Termination {
    /// Whether this event ends the child's execution.
    pub fn is_terminal(self) -> bool {
        matches!(self, Termination::Exited(_) | Termination::Signaled(_))
    }
}

/// Owns a spawned test process until the supervisor reaps it.
///
/// Dropping an unreaped guard terminates the child (SIGTERM first, then
/// SIGKILL after a short grace period) so an early-return error path cannot
/// leak a running test.
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
    reaped: bool,
}

impl ChildGuard {
    /// Guard a freshly spawned child.
    pub fn new(child: Child) -> Self {
        Self {
            child: Some(child),
            reaped: false,
        }
    }

    /// Guard with no process behind it, for bookkeeping tests.
    pub fn detached() -> Self {
        Self {
            child: None,
            reaped: true,
        }
    }

    /// Process id of the guarded child, if any.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Record that the supervisor has already reaped this process, so the
    /// guard must not touch the (possibly recycled) pid again.
    pub fn mark_reaped(&mut self) {
        self.reaped = true;
    }

    fn is_alive(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            _ => false,
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped || !self.is_alive() {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            // Graceful: SIGTERM first, brief wait, then SIGKILL
            let _ = send_sigterm(child.id());
            std::thread::sleep(Duration::from_millis(50));
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> Result<(), std::io::Error> {
    Ok(())
}

/// Spawn `test` as an isolated child of the current executable.
///
/// The child re-enters the CLI through the hidden `--exec-child` flag with the
/// run settings mirrored onto its command line, runs exactly one test through
/// the dispatcher, and exits with the test's status code.
pub fn spawn_test(cfg: &ExecConfig, test: &TestDef) -> Result<ChildGuard, ExecError> {
    let binary = std::env::current_exe().map_err(|e| ExecError::io("current_exe", &e))?;

    let mut command = Command::new(binary);
    command
        .arg("--exec-child")
        .arg(test.id)
        .arg("--mode")
        .arg(cfg.mode.as_str());
    if cfg.verbose {
        command.arg("--verbose");
    }
    if cfg.debug {
        command.arg("--debug");
    }
    if cfg.mtrace {
        command.arg("--mtrace").arg("--trace-dir").arg(&cfg.trace_dir);
    }
    if let Some(ref path) = cfg.report_file {
        command.arg("--outfile").arg(path);
    }
    if !cfg.args.is_empty() {
        command.arg("--").args(&cfg.args);
    }

    // stdio stays inherited: the banner was flushed before this point, so the
    // child's own output follows it without interleaving.
    match command.spawn() {
        Ok(child) => {
            tracing::debug!(pid = child.id(), test = test.id, "spawned test child");
            Ok(ChildGuard::new(child))
        }
        Err(e) => {
            eprintln!(
                "Error while spawning child process {}",
                e.raw_os_error().unwrap_or(0)
            );
            Err(ExecError::io("spawn", &e))
        }
    }
}

/// Block until any child of this process changes state.
#[cfg(unix)]
pub fn wait_any() -> Result<(u32, Termination), ExecError> {
    let mut status: libc::c_int = 0;
    let pid = unsafe { libc::waitpid(-1, &mut status, libc::WUNTRACED | libc::WCONTINUED) };
    if pid < 0 {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        eprintln!("Child process completion wait failed with errno={errno}");
        return Err(ExecError::Os {
            call: "waitpid",
            errno,
        });
    }

    let term = if libc::WIFEXITED(status) {
        Termination::Exited(libc::WEXITSTATUS(status))
    } else if libc::WIFSIGNALED(status) {
        Termination::Signaled(libc::WTERMSIG(status))
    } else if libc::WIFSTOPPED(status) {
        Termination::Stopped(libc::WSTOPSIG(status))
    } else {
        Termination::Continued
    };

    Ok((pid as u32, term))
}

/// Process isolation needs a Unix host; the caller falls back to inline
/// execution before this can be reached.
#[cfg(not(unix))]
pub fn wait_any() -> Result<(u32, Termination), ExecError> {
    Err(ExecError::BadState(
        "process isolation requires a Unix host",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(Termination::Exited(0).is_terminal());
        assert!(Termination::Signaled(9).is_terminal());
        assert!(!Termination::Stopped(19).is_terminal());
        assert!(!Termination::Continued.is_terminal());
    }

    #[test]
    fn test_detached_guard_is_inert() {
        let mut guard = ChildGuard::detached();
        assert_eq!(guard.id(), None);
        assert!(!guard.is_alive());
        // Dropping must not attempt to signal anything.
        drop(guard);
    }
}
