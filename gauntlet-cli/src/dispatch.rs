//! Mode dispatcher.
//!
//! Routes a test to its execution strategy and applies the mode-specific
//! pre/post steps: deadline arming for unit tests, statistics dumping for
//! performance tests. The dispatcher runs in whichever process actually
//! executes the body: the child under isolation, the supervisor inline.

use crate::config::{ExecConfig, RunMode};
use crate::RULE;
use gauntlet_core::{
    Deadline, ExecError, MemTrace, TestContext, TestDef, EXIT_FAILED, EXIT_OK,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Executes one test body to completion in the current process.
pub struct Dispatcher<'a> {
    cfg: &'a ExecConfig,
    deadline: &'a dyn Deadline,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher over the run configuration and a deadline service.
    pub fn new(cfg: &'a ExecConfig, deadline: &'a dyn Deadline) -> Self {
        Self { cfg, deadline }
    }

    /// Run `test` in this process, returning the exit code its process
    /// should terminate with.
    ///
    /// A failing test body maps to [`EXIT_FAILED`]; only executor-level
    /// problems (mode mismatch, timer failures) surface as errors.
    pub fn run_test(&self, test: &TestDef) -> Result<i32, ExecError> {
        if test.kind != self.cfg.mode.kind() {
            return Err(ExecError::BadState(
                "test kind does not match the configured run mode",
            ));
        }
        match self.cfg.mode {
            RunMode::Unit => self.run_unit(test),
            RunMode::Perf => self.run_perf(test),
            RunMode::Manual => self.run_manual(test),
        }
    }

    fn run_unit(&self, test: &TestDef) -> Result<i32, ExecError> {
        let armed = if self.cfg.debug {
            false
        } else {
            let limit = test.time_limit_secs.unwrap_or(self.cfg.default_time_limit);
            if let Err(e) = self.deadline.arm(limit) {
                eprintln!("Failed to arm deadline timer: {e}");
                return Err(e);
            }
            true
        };

        let mut ctx = TestContext::new(self.cfg.verbose, &self.cfg.args);
        let code = self.execute_body(test, &mut ctx);

        if armed {
            if let Err(e) = self.deadline.disarm() {
                eprintln!("Failed to disarm deadline timer: {e}");
                return Err(e);
            }
        }

        Ok(code)
    }

    fn run_perf(&self, test: &TestDef) -> Result<i32, ExecError> {
        let mut ctx = TestContext::new(self.cfg.verbose, &self.cfg.args);
        let code = self.execute_body(test, &mut ctx);

        println!("\nStatistics of performance test '{}':", test.id);
        let _ = ctx.dump_stats(&mut std::io::stdout().lock());

        if let Some(ref path) = self.cfg.report_file {
            append_report(path, test, &ctx);
        }

        ctx.free_stats();
        Ok(code)
    }

    fn run_manual(&self, test: &TestDef) -> Result<i32, ExecError> {
        let mut ctx = TestContext::new(self.cfg.verbose, &self.cfg.args);
        Ok(self.execute_body(test, &mut ctx))
    }

    /// Run the body under the memory-trace hooks and map its result to an
    /// exit code.
    fn execute_body(&self, test: &TestDef, ctx: &mut TestContext) -> i32 {
        let trace = MemTrace::engage(self.cfg.mtrace, &self.cfg.trace_dir, test.id);
        let result = (test.runner_fn)(ctx);
        drop(trace);

        match result {
            Ok(()) => EXIT_OK,
            Err(fail) => {
                eprintln!("Test '{}' failed: {}", test.id, fail);
                EXIT_FAILED
            }
        }
    }
}

/// Append the statistics block for one performance test to the report file.
/// A file that cannot be opened is logged and tolerated, never fatal.
fn append_report(path: &Path, test: &TestDef, ctx: &TestContext) {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{RULE}");
            let _ = writeln!(file, "Statistics of performance test '{}':\n", test.id);
            let _ = ctx.dump_stats(&mut file);
            let _ = writeln!(file);
        }
        Err(e) => {
            eprintln!("Failed to open report file '{}': {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::{TestKind, TestResult, EXIT_TIMEOUT};
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deadline fake that records arm/disarm calls and can fail on demand.
    #[derive(Default)]
    struct FakeDeadline {
        calls: RefCell<Vec<String>>,
        fail_arm: bool,
        fail_disarm: bool,
    }

    impl Deadline for FakeDeadline {
        fn arm(&self, limit_secs: f64) -> Result<(), ExecError> {
            self.calls.borrow_mut().push(format!("arm {limit_secs}"));
            if self.fail_arm {
                return Err(ExecError::Os {
                    call: "setitimer",
                    errno: 22,
                });
            }
            Ok(())
        }

        fn disarm(&self) -> Result<(), ExecError> {
            self.calls.borrow_mut().push("disarm".to_string());
            if self.fail_disarm {
                return Err(ExecError::Os {
                    call: "setitimer",
                    errno: 22,
                });
            }
            Ok(())
        }
    }

    fn counting_pass(_ctx: &mut TestContext) -> TestResult {
        Ok(())
    }

    // Dedicated counters: the test harness runs these cases in parallel, so
    // each assertion about body-run counts gets its own body function.
    static ARM_BODY_RUNS: AtomicUsize = AtomicUsize::new(0);

    fn arm_counting(_ctx: &mut TestContext) -> TestResult {
        ARM_BODY_RUNS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    static DISARM_BODY_RUNS: AtomicUsize = AtomicUsize::new(0);

    fn disarm_counting(_ctx: &mut TestContext) -> TestResult {
        DISARM_BODY_RUNS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn failing(_ctx: &mut TestContext) -> TestResult {
        Err("broken".into())
    }

    fn record_two_stats(ctx: &mut TestContext) -> TestResult {
        ctx.record_stat("iterations", 1000);
        ctx.record_stat("mean", "1.25 us");
        Ok(())
    }

    fn unit_def(runner: fn(&mut TestContext) -> TestResult, limit: Option<f64>) -> TestDef {
        TestDef {
            id: "dispatch.unit",
            name: "unit",
            group: "dispatch",
            kind: TestKind::Unit,
            time_limit_secs: limit,
            runner_fn: runner,
            file: file!(),
            line: line!(),
            module_path: module_path!(),
        }
    }

    fn perf_def(runner: fn(&mut TestContext) -> TestResult) -> TestDef {
        TestDef {
            id: "dispatch.perf",
            name: "perf",
            group: "dispatch",
            kind: TestKind::Performance,
            time_limit_secs: None,
            runner_fn: runner,
            file: file!(),
            line: line!(),
            module_path: module_path!(),
        }
    }

    #[test]
    fn test_unit_mode_arms_and_disarms() {
        let cfg = ExecConfig::default();
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let test = unit_def(counting_pass, Some(2.5));
        let code = dispatcher.run_test(&test).unwrap();
        assert_eq!(code, EXIT_OK);
        assert_eq!(*deadline.calls.borrow(), ["arm 2.5", "disarm"]);
    }

    #[test]
    fn test_unit_mode_falls_back_to_default_limit() {
        let cfg = ExecConfig {
            default_time_limit: 7.0,
            ..Default::default()
        };
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        dispatcher.run_test(&unit_def(counting_pass, None)).unwrap();
        assert_eq!(deadline.calls.borrow()[0], "arm 7");
    }

    #[test]
    fn test_debug_mode_skips_the_deadline() {
        let cfg = ExecConfig {
            debug: true,
            ..Default::default()
        };
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let code = dispatcher.run_test(&unit_def(counting_pass, Some(0.001))).unwrap();
        assert_eq!(code, EXIT_OK);
        assert!(deadline.calls.borrow().is_empty());
    }

    #[test]
    fn test_arm_failure_short_circuits_before_the_body() {
        let cfg = ExecConfig::default();
        let deadline = FakeDeadline {
            fail_arm: true,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let result = dispatcher.run_test(&unit_def(arm_counting, None));
        assert!(matches!(result, Err(ExecError::Os { .. })));
        assert_eq!(ARM_BODY_RUNS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disarm_failure_surfaces_after_the_body() {
        let cfg = ExecConfig::default();
        let deadline = FakeDeadline {
            fail_disarm: true,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let result = dispatcher.run_test(&unit_def(disarm_counting, None));
        assert!(matches!(result, Err(ExecError::Os { .. })));
        // The body did run; only the cleanup failed.
        assert_eq!(DISARM_BODY_RUNS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_body_maps_to_failed_exit_code() {
        let cfg = ExecConfig::default();
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let code = dispatcher.run_test(&unit_def(failing, None)).unwrap();
        assert_eq!(code, EXIT_FAILED);
        assert_ne!(code, EXIT_TIMEOUT);
    }

    #[test]
    fn test_kind_mismatch_is_bad_state() {
        let cfg = ExecConfig::default(); // unit mode
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let result = dispatcher.run_test(&perf_def(record_two_stats));
        assert!(matches!(result, Err(ExecError::BadState(_))));
        assert!(deadline.calls.borrow().is_empty());
    }

    #[test]
    fn test_perf_mode_appends_delimited_report_block() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.txt");
        let cfg = ExecConfig {
            mode: RunMode::Perf,
            report_file: Some(report.clone()),
            ..Default::default()
        };
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        dispatcher.run_test(&perf_def(record_two_stats)).unwrap();
        dispatcher.run_test(&perf_def(record_two_stats)).unwrap();

        let text = std::fs::read_to_string(&report).unwrap();
        // One 80-dash separator per appended block.
        assert_eq!(text.matches(RULE).count(), 2);
        assert_eq!(
            text.matches("Statistics of performance test 'dispatch.perf':")
                .count(),
            2
        );
        assert!(text.contains("iterations"));
        assert!(text.contains("1.25 us"));
        // Performance mode never touches the deadline.
        assert!(deadline.calls.borrow().is_empty());
    }

    #[test]
    fn test_perf_mode_tolerates_unopenable_report_file() {
        let cfg = ExecConfig {
            mode: RunMode::Perf,
            report_file: Some("/nonexistent-dir/report.txt".into()),
            ..Default::default()
        };
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let code = dispatcher.run_test(&perf_def(record_two_stats)).unwrap();
        assert_eq!(code, EXIT_OK);
    }

    #[test]
    fn test_manual_mode_is_a_bare_wrapper() {
        let cfg = ExecConfig {
            mode: RunMode::Manual,
            ..Default::default()
        };
        let deadline = FakeDeadline::default();
        let dispatcher = Dispatcher::new(&cfg, &deadline);

        let test = TestDef {
            id: "dispatch.manual",
            name: "manual",
            group: "dispatch",
            kind: TestKind::Manual,
            time_limit_secs: None,
            runner_fn: counting_pass,
            file: file!(),
            line: line!(),
            module_path: module_path!(),
        };
        let code = dispatcher.run_test(&test).unwrap();
        assert_eq!(code, EXIT_OK);
        assert!(deadline.calls.borrow().is_empty());
    }
}
