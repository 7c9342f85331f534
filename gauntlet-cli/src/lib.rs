#![warn(missing_docs)]
//! Gauntlet CLI Library
//!
//! This crate provides the harness infrastructure for test binaries. Use
//! `gauntlet::run()` in your binary's main function to get the full CLI with
//! your registered tests:
//!
//! ```ignore
//! use gauntlet::prelude::*;
//!
//! fn run_sort_smoke(ctx: &mut TestContext) -> TestResult {
//!     let mut v = vec![3, 1, 2];
//!     v.sort();
//!     (v == [1, 2, 3]).then_some(()).ok_or("wrong order".into())
//! }
//!
//! gauntlet::unit_test!("algo", "sort_smoke", run_sort_smoke);
//!
//! fn main() -> anyhow::Result<()> {
//!     gauntlet::run()
//! }
//! ```
//!
//! ## Pipeline Overview
//!
//! ```text
//! TestDef (registered via unit_test!/perf_test!/manual_test!)
//!       │
//!       ▼
//! ┌────────────┐   submit        ┌────────────┐
//! │  Executor  │────────────────▶│ SlotTable  │  bounded in-flight records
//! │ (supervisor│                 └─────┬──────┘
//! │   loop)    │   spawn               │ waitpid(-1)
//! └─────┬──────┘────────────────▶ child process ──▶ Dispatcher ──▶ test body
//!       │                               │                │
//!       │  completion event             │ exit status    │ deadline, mtrace,
//!       ◀───────────────────────────────┘                │ stats dump
//!       ▼
//!  StatsSink (success/failure ledger)
//! ```

mod config;
mod dispatch;
mod process;
mod slots;
mod stats;
mod supervisor;

pub use config::{ExecConfig, GauntletConfig, OutputConfig, RunMode, RunnerConfig, TraceConfig};
pub use dispatch::Dispatcher;
pub use process::{ChildGuard, Termination};
pub use slots::{SlotTable, TaskSlot};
pub use stats::StatsSink;
pub use supervisor::{Executor, Role};

use clap::Parser;
use gauntlet_core::{
    registered, ExecError, ItimerDeadline, TestDef, EXIT_BAD_STATE, EXIT_UNKNOWN,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 80-column separator used by banners, summaries and report blocks.
pub(crate) const RULE: &str =
    "--------------------------------------------------------------------------------";

/// Gauntlet CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "gauntlet")]
#[command(author, version, about = "Gauntlet - isolated test runner")]
pub struct Cli {
    /// Which class of registered tests to run
    #[arg(long, value_enum, default_value_t = RunMode::Unit)]
    pub mode: RunMode,

    /// Filter tests by regex pattern
    #[arg(default_value = ".*")]
    pub filter: String,

    /// List matching tests without executing
    #[arg(long)]
    pub list: bool,

    /// Maximum number of concurrently running isolated tests (0 = serial)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Run tests in this process instead of isolated children
    #[arg(long)]
    pub no_isolate: bool,

    /// Disable deadline enforcement (e.g. to attach a debugger)
    #[arg(long)]
    pub debug: bool,

    /// Verbose test output
    #[arg(short, long)]
    pub verbose: bool,

    /// Engage glibc memory tracing around each test body
    #[arg(long)]
    pub mtrace: bool,

    /// Directory for per-test memory trace files
    #[arg(long)]
    pub trace_dir: Option<PathBuf>,

    /// Append performance statistics blocks to this file
    #[arg(long)]
    pub outfile: Option<PathBuf>,

    /// Internal: run a single test in this process (child side of isolation)
    #[arg(long, hide = true)]
    pub exec_child: Option<String>,

    /// Internal: absorb cargo's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,

    /// Arguments forwarded to test bodies (after `--`)
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Run the Gauntlet CLI with the given arguments.
/// This is the main entry point for test binaries.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run the Gauntlet CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Child mode first, before any other initialization.
    if let Some(id) = cli.exec_child.clone() {
        let code = run_child(&cli, &id)?;
        std::process::exit(code);
    }

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("gauntlet=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("gauntlet=info")
            .init();
    }

    // Discover gauntlet.toml configuration (CLI flags override).
    let file_cfg = GauntletConfig::discover().unwrap_or_default();
    let cfg = build_exec_config(&cli, &file_cfg)?;

    let tests = select_tests(&cli)?;

    if cli.list {
        list_tests(&cfg, &tests);
        return Ok(());
    }

    if tests.is_empty() {
        println!("No tests found.");
        return Ok(());
    }

    println!(
        "Running {} {}(s), {} concurrent...",
        tests.len(),
        cfg.mode.kind().banner_name(),
        if cfg.isolate { cfg.capacity() } else { 1 }
    );

    run_tests(&cfg, &tests)
}

/// Run as the child side of isolation: execute exactly one test through the
/// dispatcher and report its status through the process exit code.
fn run_child(cli: &Cli, id: &str) -> anyhow::Result<i32> {
    let file_cfg = GauntletConfig::discover().unwrap_or_default();
    let cfg = build_exec_config(cli, &file_cfg)?;

    let test = registered()
        .find(|t| t.id == id)
        .ok_or_else(|| anyhow::anyhow!("test not found: {id}"))?;

    let deadline = ItimerDeadline;
    let dispatcher = Dispatcher::new(&cfg, &deadline);
    match dispatcher.run_test(test) {
        Ok(code) => Ok(code),
        Err(ExecError::BadState(msg)) => {
            eprintln!("gauntlet: {msg}");
            Ok(EXIT_BAD_STATE)
        }
        Err(e) => {
            eprintln!("gauntlet: {e}");
            Ok(EXIT_UNKNOWN)
        }
    }
}

/// Build the immutable run configuration by layering CLI flags over
/// gauntlet.toml values.
fn build_exec_config(cli: &Cli, file_cfg: &GauntletConfig) -> anyhow::Result<ExecConfig> {
    let default_time_limit = GauntletConfig::parse_duration(&file_cfg.runner.time_limit)?;
    Ok(ExecConfig {
        mode: cli.mode,
        isolate: file_cfg.runner.isolate && !cli.no_isolate,
        jobs: cli.jobs.unwrap_or(file_cfg.runner.jobs),
        debug: cli.debug || file_cfg.runner.debug,
        verbose: cli.verbose || file_cfg.output.verbose,
        mtrace: cli.mtrace || file_cfg.trace.mtrace,
        trace_dir: cli
            .trace_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&file_cfg.trace.dir)),
        report_file: cli
            .outfile
            .clone()
            .or_else(|| file_cfg.output.report_file.as_ref().map(PathBuf::from)),
        default_time_limit,
        args: cli.args.clone(),
    })
}

/// Collect, validate and filter the registered tests for this invocation.
///
/// Returns tests of the selected mode whose id matches the filter, sorted by
/// id for deterministic submission order. Duplicate ids are a registration
/// error and rejected up front.
fn select_tests(cli: &Cli) -> anyhow::Result<Vec<&'static TestDef>> {
    let mut by_id: BTreeMap<&'static str, &'static TestDef> = BTreeMap::new();
    for test in registered() {
        if by_id.insert(test.id, test).is_some() {
            anyhow::bail!("duplicate test id '{}'", test.id);
        }
    }

    let filter = regex::Regex::new(&cli.filter)
        .map_err(|e| anyhow::anyhow!("invalid filter pattern '{}': {}", cli.filter, e))?;

    Ok(by_id
        .into_values()
        .filter(|test| test.kind == cli.mode.kind())
        .filter(|test| filter.is_match(test.id))
        .collect())
}

/// Print the grouped execution plan.
fn list_tests(cfg: &ExecConfig, tests: &[&'static TestDef]) {
    println!("Gauntlet plan ({} mode):", cfg.mode.as_str());

    let mut groups: BTreeMap<&str, Vec<&TestDef>> = BTreeMap::new();
    for test in tests {
        groups.entry(test.group).or_default().push(test);
    }

    for (group, members) in &groups {
        println!("├── group: {group}");
        for test in members {
            let limit = match test.time_limit_secs {
                Some(secs) => format!(" [{secs}s]"),
                None => String::new(),
            };
            println!("│   ├── {}{} ({}:{})", test.id, limit, test.file, test.line);
        }
    }

    println!("{} tests found.", tests.len());
}

/// Drive one full run: init, submit everything, wait, print the tally.
fn run_tests(cfg: &ExecConfig, tests: &[&'static TestDef]) -> anyhow::Result<()> {
    let deadline = ItimerDeadline;
    let mut stats = StatsSink::new();

    let mut executor = Executor::init(cfg, Role::Supervisor, &deadline, &mut stats)?;
    for test in tests {
        executor.submit(test)?;
    }
    executor.wait()?;
    drop(executor);

    stats.print_summary();

    if !stats.failed().is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
