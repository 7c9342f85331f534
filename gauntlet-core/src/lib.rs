#![warn(missing_docs)]
//! Gauntlet Core - Test Model and Child Runtime
//!
//! This crate provides the pieces that live inside the test process:
//! - `TestDef` records and the inventory-backed registry
//! - `TestContext` handed to test bodies for one run
//! - Exit-status mapping shared between child and supervisor
//! - The per-test deadline timer and glibc memory-trace hooks

mod context;
mod deadline;
mod macros;
mod mtrace;
mod status;

pub use context::{TestContext, TestFail, TestResult};
pub use deadline::{Deadline, ItimerDeadline};
pub use mtrace::MemTrace;
pub use status::{
    ExecError, Outcome, EXIT_BAD_STATE, EXIT_FAILED, EXIT_OK, EXIT_TIMEOUT, EXIT_UNKNOWN,
};

/// Default wall-clock limit for unit tests, in seconds.
pub const DEFAULT_TIME_LIMIT: f64 = 5.0;

/// Execution flavor of a registered test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    /// Short functional test, run under a deadline.
    Unit,
    /// Measurement test that accumulates statistics for dumping.
    Performance,
    /// Interactively driven test; no deadline, no statistics.
    Manual,
}

impl TestKind {
    /// Capitalized class name used in completion summaries.
    pub fn class_name(self) -> &'static str {
        match self {
            TestKind::Unit => "Unit test",
            TestKind::Performance => "Performance test",
            TestKind::Manual => "Manual test",
        }
    }

    /// Lowercase class name used in launch banners.
    pub fn banner_name(self) -> &'static str {
        match self {
            TestKind::Unit => "unit test",
            TestKind::Performance => "performance test",
            TestKind::Manual => "manual test",
        }
    }
}

/// Test registered via [`unit_test!`], [`perf_test!`] or [`manual_test!`].
#[derive(Debug)]
pub struct TestDef {
    /// Unique identifier, `group.name`.
    pub id: &'static str,
    /// Test name within its group.
    pub name: &'static str,
    /// Group the test belongs to.
    pub group: &'static str,
    /// Execution flavor.
    pub kind: TestKind,
    /// Per-test deadline override in seconds; `None` uses the run default.
    pub time_limit_secs: Option<f64>,
    /// The test body.
    pub runner_fn: fn(&mut TestContext) -> TestResult,
    /// Source file path.
    pub file: &'static str,
    /// Source line number.
    pub line: u32,
    /// Module path of the registration site.
    pub module_path: &'static str,
}

impl TestDef {
    /// Fully qualified test name, unique across the suite.
    pub fn full_name(&self) -> &'static str {
        self.id
    }
}

inventory::collect!(TestDef);

/// Iterate all registered tests, in arbitrary registration order.
pub fn registered() -> impl Iterator<Item = &'static TestDef> {
    inventory::iter::<TestDef>.into_iter()
}

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<TestDef> {}
};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
}
