//! Configuration loading from gauntlet.toml
//!
//! Runner configuration can be specified in a `gauntlet.toml` file, discovered
//! by walking up from the current directory. CLI flags override file values;
//! the resolved [`ExecConfig`] is immutable for the rest of the run.

use gauntlet_core::{TestKind, DEFAULT_TIME_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which class of registered tests a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RunMode {
    /// Unit tests, each under a deadline.
    #[default]
    Unit,
    /// Performance tests with statistics dumping.
    Perf,
    /// Manual tests.
    Manual,
}

impl RunMode {
    /// The test kind this mode dispatches.
    pub fn kind(self) -> TestKind {
        match self {
            RunMode::Unit => TestKind::Unit,
            RunMode::Perf => TestKind::Performance,
            RunMode::Manual => TestKind::Manual,
        }
    }

    /// CLI value string, as accepted by `--mode`.
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Unit => "unit",
            RunMode::Perf => "perf",
            RunMode::Manual => "manual",
        }
    }
}

/// Gauntlet configuration file contents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GauntletConfig {
    /// Runner configuration.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Memory tracing configuration.
    #[serde(default)]
    pub trace: TraceConfig,
    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Runner configuration for test execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Run each test as an isolated child process.
    #[serde(default = "default_isolate")]
    pub isolate: bool,
    /// Maximum number of concurrently running isolated tests (0 = serial).
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Disable deadline enforcement.
    #[serde(default)]
    pub debug: bool,
    /// Default unit-test time limit (e.g. "5s", "500ms").
    #[serde(default = "default_time_limit")]
    pub time_limit: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            isolate: default_isolate(),
            jobs: default_jobs(),
            debug: false,
            time_limit: default_time_limit(),
        }
    }
}

fn default_isolate() -> bool {
    true
}
fn default_jobs() -> usize {
    1
}
fn default_time_limit() -> String {
    "5s".to_string()
}

/// Memory tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Engage glibc memory tracing around each test body.
    #[serde(default)]
    pub mtrace: bool,
    /// Directory for per-test trace files.
    #[serde(default = "default_trace_dir")]
    pub dir: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            mtrace: false,
            dir: default_trace_dir(),
        }
    }
}

fn default_trace_dir() -> String {
    "target/gauntlet/mtrace".to_string()
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// File that performance statistics blocks are appended to.
    #[serde(default)]
    pub report_file: Option<String>,
    /// Verbose test output.
    #[serde(default)]
    pub verbose: bool,
}

impl GauntletConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Discover and load configuration by walking up from the current directory.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("gauntlet.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Parse a duration string (e.g. "5s", "500ms", "2m") into seconds.
    pub fn parse_duration(s: &str) -> anyhow::Result<f64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

        let multiplier: f64 = match unit_part.to_lowercase().as_str() {
            "ms" => 1e-3,
            "s" | "" => 1.0,
            "m" | "min" => 60.0,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(value * multiplier)
    }
}

/// Immutable per-run configuration, resolved from gauntlet.toml and the CLI.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Which class of tests this run executes.
    pub mode: RunMode,
    /// Run each test as an isolated child process.
    pub isolate: bool,
    /// Concurrency ceiling for isolated tests (0 = serial).
    pub jobs: usize,
    /// Disable deadline enforcement.
    pub debug: bool,
    /// Verbose test output.
    pub verbose: bool,
    /// Engage glibc memory tracing around each test body.
    pub mtrace: bool,
    /// Directory for per-test trace files.
    pub trace_dir: PathBuf,
    /// File that performance statistics blocks are appended to.
    pub report_file: Option<PathBuf>,
    /// Deadline for unit tests that declare no limit of their own, in seconds.
    pub default_time_limit: f64,
    /// Arguments forwarded to test bodies.
    pub args: Vec<String>,
}

impl ExecConfig {
    /// Slot-table capacity for this run.
    ///
    /// Non-unit modes never run tests in parallel; a jobs value of 0 means
    /// serial execution but still one slot.
    pub fn capacity(&self) -> usize {
        if self.mode != RunMode::Unit {
            1
        } else {
            self.jobs.max(1)
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Unit,
            isolate: true,
            jobs: default_jobs(),
            debug: false,
            verbose: false,
            mtrace: false,
            trace_dir: PathBuf::from(default_trace_dir()),
            report_file: None,
            default_time_limit: DEFAULT_TIME_LIMIT,
            args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GauntletConfig::default();
        assert!(config.runner.isolate);
        assert_eq!(config.runner.jobs, 1);
        assert_eq!(config.runner.time_limit, "5s");
        assert!(!config.trace.mtrace);
        assert!(config.output.report_file.is_none());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(GauntletConfig::parse_duration("5s").unwrap(), 5.0);
        assert_eq!(GauntletConfig::parse_duration("500ms").unwrap(), 0.5);
        assert_eq!(GauntletConfig::parse_duration("2m").unwrap(), 120.0);
        assert_eq!(GauntletConfig::parse_duration("1.5").unwrap(), 1.5);
        assert!(GauntletConfig::parse_duration("").is_err());
        assert!(GauntletConfig::parse_duration("5parsecs").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            jobs = 8
            debug = true

            [trace]
            mtrace = true
        "#;

        let config: GauntletConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.jobs, 8);
        assert!(config.runner.debug);
        assert!(config.trace.mtrace);
        // Defaults still apply to everything unset.
        assert!(config.runner.isolate);
        assert_eq!(config.trace.dir, "target/gauntlet/mtrace");
    }

    #[test]
    fn test_capacity_serial_floor() {
        let cfg = ExecConfig {
            jobs: 0,
            ..Default::default()
        };
        assert_eq!(cfg.capacity(), 1);
    }

    #[test]
    fn test_capacity_non_unit_modes_are_serial() {
        for mode in [RunMode::Perf, RunMode::Manual] {
            let cfg = ExecConfig {
                mode,
                jobs: 16,
                ..Default::default()
            };
            assert_eq!(cfg.capacity(), 1);
        }
        let cfg = ExecConfig {
            mode: RunMode::Unit,
            jobs: 16,
            ..Default::default()
        };
        assert_eq!(cfg.capacity(), 16);
    }
}
