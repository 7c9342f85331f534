//! Success/failure ledger.
//!
//! Append-only: every completed test lands in exactly one of the two lists,
//! and nothing is ever removed. Mutated only by the supervisor thread.

use crate::RULE;
use gauntlet_core::TestDef;

/// Ledger of completed tests for one run.
#[derive(Debug, Default)]
pub struct StatsSink {
    success: Vec<&'static TestDef>,
    failed: Vec<&'static TestDef>,
}

impl StatsSink {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a test that succeeded.
    pub fn record_success(&mut self, test: &'static TestDef) {
        self.success.push(test);
    }

    /// Record a test that failed (including timeouts and signal kills).
    pub fn record_failure(&mut self, test: &'static TestDef) {
        self.failed.push(test);
    }

    /// Tests recorded as succeeded, in completion order.
    pub fn success(&self) -> &[&'static TestDef] {
        &self.success
    }

    /// Tests recorded as failed, in completion order.
    pub fn failed(&self) -> &[&'static TestDef] {
        &self.failed
    }

    /// Total number of recorded completions.
    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len()
    }

    /// Print the end-of-run tally.
    pub fn print_summary(&self) {
        println!("\n{RULE}");
        println!(
            "Overall statistics: {} tests, {} succeeded, {} failed",
            self.total(),
            self.success.len(),
            self.failed.len()
        );
        if !self.failed.is_empty() {
            println!("\nList of failed tests:");
            for test in &self.failed {
                println!("  {}", test.id);
            }
        }
        println!("{RULE}");
    }
}
