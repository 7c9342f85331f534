//! Test supervisor.
//!
//! The executor core: accepts submissions, blocks callers when the slot table
//! is full, reaps completion events, reclaims slots, and forwards outcomes to
//! the statistics ledger. The supervisor itself is single-threaded; all
//! parallelism comes from the operating system running the spawned children.

use crate::config::ExecConfig;
use crate::dispatch::Dispatcher;
use crate::process::{self, Termination};
use crate::slots::{SlotTable, TaskSlot};
use crate::stats::StatsSink;
use crate::RULE;
use gauntlet_core::{Deadline, ExecError, Outcome, TestDef};
use std::io::Write;
use std::time::Instant;

/// Which side of the isolation boundary this process is on.
///
/// A child must not itself supervise: its `wait` is a no-op and it never
/// prints launch banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The top-level process driving the run.
    Supervisor,
    /// A spawned process running exactly one test.
    Child,
}

/// Bounded-concurrency test executor.
///
/// Construct one per run with [`Executor::init`]; constructing a second
/// executor for the same run is a caller error the API makes impossible to
/// express (there is no re-initialization).
pub struct Executor<'a> {
    cfg: &'a ExecConfig,
    role: Role,
    slots: Option<SlotTable>,
    stats: &'a mut StatsSink,
    dispatcher: Dispatcher<'a>,
}

impl<'a> Executor<'a> {
    /// Initialize an executor for one run.
    ///
    /// Allocates the task slot table when isolation is enabled; serial
    /// (inline) mode allocates nothing.
    pub fn init(
        cfg: &'a ExecConfig,
        role: Role,
        deadline: &'a dyn Deadline,
        stats: &'a mut StatsSink,
    ) -> Result<Self, ExecError> {
        let slots = if cfg.isolate {
            Some(SlotTable::allocate(cfg.capacity())?)
        } else {
            None
        };
        Ok(Self {
            cfg,
            role,
            slots,
            stats,
            dispatcher: Dispatcher::new(cfg, deadline),
        })
    }

    /// Number of currently active isolated tests.
    pub fn active_count(&self) -> usize {
        self.slots.as_ref().map_or(0, SlotTable::active_count)
    }

    /// Submit one test for execution.
    ///
    /// A test whose kind disagrees with the configured run mode is rejected
    /// before anything runs. Without isolation the test then runs
    /// synchronously in this process and the call returns after it completed.
    /// With isolation the call blocks while the slot table is full, then
    /// spawns the test and returns; a spawn failure aborts only this
    /// submission.
    pub fn submit(&mut self, test: &'static TestDef) -> Result<(), ExecError> {
        if test.kind != self.cfg.mode.kind() {
            return Err(ExecError::BadState(
                "test kind does not match the configured run mode",
            ));
        }
        if !self.cfg.isolate || self.slots.is_none() {
            return self.run_inline(test);
        }

        // Wait for an empty task slot.
        while self.slots.as_ref().is_some_and(SlotTable::is_full) {
            self.wait_for_children()?;
        }

        if self.role == Role::Supervisor {
            println!("\n{RULE}");
            println!("Launching {} '{}'", test.kind.banner_name(), test.id);
            println!("{RULE}");
        }

        // The child inherits our stdio; flush so its output cannot interleave
        // with a half-written banner.
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        let submitted = Instant::now();
        let guard = process::spawn_test(self.cfg, test)?;
        let pid = guard.id().unwrap_or(0);

        if let Some(slots) = self.slots.as_mut() {
            slots.push(TaskSlot {
                pid,
                submitted,
                test,
                outcome: None,
                guard,
            })?;
        }
        Ok(())
    }

    /// Wait for completion of all active tests.
    ///
    /// A no-op when called from inside a spawned child. Any wait error is
    /// fatal to the run and propagated immediately.
    pub fn wait(&mut self) -> Result<(), ExecError> {
        if self.role == Role::Child {
            return Ok(());
        }
        while self.active_count() > 0 {
            self.wait_for_children()?;
        }
        Ok(())
    }

    /// Drain one completion event: block until a child terminates, report it
    /// and reclaim its slot.
    ///
    /// Stop/continue notifications are logged and waited through; the loop is
    /// unbounded because the process layer guarantees eventual termination.
    fn wait_for_children(&mut self) -> Result<(), ExecError> {
        let (pid, term) = loop {
            let (pid, term) = process::wait_any()?;
            match term {
                Termination::Stopped(signal) => {
                    println!("Child process {pid} stopped by signal {signal}");
                }
                Termination::Continued => {
                    tracing::debug!(pid, "child process continued");
                }
                _ => break (pid, term),
            }
        };

        let Some(slots) = self.slots.as_mut() else {
            return Ok(());
        };
        // A terminal event for a process we do not track mutates nothing.
        let Some(index) = slots.find_by_pid(pid) else {
            return Ok(());
        };

        let outcome = match term {
            Termination::Exited(code) => Outcome::from_exit_code(code),
            Termination::Signaled(signal) => Outcome::Killed(signal),
            Termination::Stopped(_) | Termination::Continued => return Ok(()),
        };

        let slot = match slots.get_mut(index) {
            Some(slot) => slot,
            None => return Ok(()),
        };
        slot.guard.mark_reaped();
        slot.outcome = Some(outcome);

        let elapsed = slot.submitted.elapsed().as_secs_f64();
        println!(
            "{} '{}' has {}, execution time: {:.2} s",
            slot.test.kind.class_name(),
            slot.test.id,
            if outcome.is_success() {
                "succeeded"
            } else {
                "failed"
            },
            elapsed
        );

        let test = slot.test;
        if outcome.is_success() {
            self.stats.record_success(test);
        } else {
            self.stats.record_failure(test);
        }

        if let Some(slots) = self.slots.as_mut() {
            slots.remove_swap(index);
        }
        Ok(())
    }

    /// Execute a test synchronously through the dispatcher and record its
    /// outcome, so inline runs report exactly like isolated ones.
    fn run_inline(&mut self, test: &'static TestDef) -> Result<(), ExecError> {
        let submitted = Instant::now();
        let code = self.dispatcher.run_test(test)?;
        let outcome = Outcome::from_exit_code(code);

        let elapsed = submitted.elapsed().as_secs_f64();
        println!(
            "{} '{}' has {}, execution time: {:.2} s",
            test.kind.class_name(),
            test.id,
            if outcome.is_success() {
                "succeeded"
            } else {
                "failed"
            },
            elapsed
        );

        if outcome.is_success() {
            self.stats.record_success(test);
        } else {
            self.stats.record_failure(test);
        }
        Ok(())
    }
}
