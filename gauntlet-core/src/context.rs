//! Per-run test context.
//!
//! A test definition is a static record; everything a body may touch during
//! one run (verbosity, the forwarded argument slice, the performance
//! statistics accumulator) lives in a `TestContext` handed to the body for
//! that run only.

use std::fmt;
use std::io;

/// Failure reported by a test body.
#[derive(Debug, Clone)]
pub struct TestFail {
    message: String,
}

impl TestFail {
    /// Create a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TestFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&str> for TestFail {
    fn from(message: &str) -> Self {
        TestFail::new(message)
    }
}

impl From<String> for TestFail {
    fn from(message: String) -> Self {
        TestFail::new(message)
    }
}

/// Result of one test body invocation.
pub type TestResult = Result<(), TestFail>;

/// Execution context handed to a test body for a single run.
pub struct TestContext<'a> {
    verbose: bool,
    args: &'a [String],
    stats: Vec<(String, String)>,
}

impl<'a> TestContext<'a> {
    /// Create a context for one run.
    pub fn new(verbose: bool, args: &'a [String]) -> Self {
        Self {
            verbose,
            args,
            stats: Vec::new(),
        }
    }

    /// Whether the run was requested with verbose output.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Arguments forwarded from the command line (after `--`).
    pub fn args(&self) -> &[String] {
        self.args
    }

    /// Record one line of performance statistics.
    pub fn record_stat(&mut self, label: impl Into<String>, value: impl fmt::Display) {
        self.stats.push((label.into(), value.to_string()));
    }

    /// Whether any statistics have been recorded.
    pub fn has_stats(&self) -> bool {
        !self.stats.is_empty()
    }

    /// Write the accumulated statistics to `out`, one aligned line per entry.
    pub fn dump_stats(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let width = self
            .stats
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0);
        for (label, value) in &self.stats {
            writeln!(out, "  {label:width$} : {value}")?;
        }
        Ok(())
    }

    /// Release the accumulated statistics.
    pub fn free_stats(&mut self) {
        self.stats.clear();
        self.stats.shrink_to_fit();
    }
}
