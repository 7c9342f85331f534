#![warn(missing_docs)]
//! # Gauntlet
//!
//! Test runner with process isolation, per-test deadlines and bounded
//! concurrency.
//!
//! - **Process Isolation**: each test runs in its own OS process, so a crash
//!   or hang cannot corrupt the supervisor or its siblings
//! - **Bounded Concurrency**: a fixed-capacity slot table caps how many
//!   isolated tests run at once; submission blocks when the table is full
//! - **Per-Test Deadlines**: unit tests self-terminate with a distinguished
//!   status when their wall-clock limit expires
//! - **Three Modes**: unit, performance (with statistics dumping and report
//!   files) and manual tests behind one registration surface
//! - **Memory Tracing**: optional glibc `mtrace` engagement with per-test
//!   trace files
//!
//! ## Quick Start
//!
//! ```ignore
//! use gauntlet::prelude::*;
//!
//! fn run_sort_smoke(ctx: &mut TestContext) -> TestResult {
//!     let mut v = vec![3, 1, 2];
//!     v.sort();
//!     if v != [1, 2, 3] {
//!         return Err("sort produced wrong order".into());
//!     }
//!     Ok(())
//! }
//!
//! gauntlet::unit_test!("algo", "sort_smoke", run_sort_smoke);
//!
//! fn main() -> anyhow::Result<()> {
//!     gauntlet::run()
//! }
//! ```

// Re-export core types
pub use gauntlet_core::{
    registered, Deadline, ExecError, ItimerDeadline, MemTrace, Outcome, TestContext, TestDef,
    TestFail, TestKind, TestResult, DEFAULT_TIME_LIMIT, EXIT_BAD_STATE, EXIT_FAILED, EXIT_OK,
    EXIT_TIMEOUT, EXIT_UNKNOWN,
};

// Re-export registration macros
pub use gauntlet_core::{manual_test, perf_test, unit_test};

// Re-export the harness
pub use gauntlet_cli::{
    ChildGuard, Cli, Dispatcher, ExecConfig, Executor, GauntletConfig, Role, RunMode, SlotTable,
    StatsSink, TaskSlot, Termination,
};

/// Run the Gauntlet CLI harness.
///
/// Call this from your test binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     gauntlet::run()
/// }
/// ```
pub use gauntlet_cli::run;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{manual_test, perf_test, unit_test, TestContext, TestFail, TestResult};
}
