//! glibc memory-trace hooks.
//!
//! When tracing is enabled, each test run gets its own trace file under the
//! configured directory, `MALLOC_TRACE` points at it, and glibc's `mtrace()`
//! is engaged for the duration of that single run. The per-test file name
//! keeps concurrent children from clobbering each other's traces.

use std::path::{Path, PathBuf};

/// Scoped memory-trace engagement; tracing stops when the guard drops.
#[derive(Debug)]
pub struct MemTrace {
    engaged: bool,
}

impl MemTrace {
    /// Engage tracing for the test named `full_name`, creating `dir` first.
    ///
    /// Returns a disengaged guard when `enabled` is false or the platform has
    /// no glibc `mtrace`.
    pub fn engage(enabled: bool, dir: &Path, full_name: &str) -> Self {
        if !enabled {
            return Self { engaged: false };
        }
        Self {
            engaged: platform::engage(dir, full_name),
        }
    }

    /// Trace file path for one test under `dir`.
    pub fn trace_path(dir: &Path, full_name: &str) -> PathBuf {
        dir.join(format!("{full_name}.mtrace"))
    }

    /// Whether tracing is actually running behind this guard.
    pub fn engaged(&self) -> bool {
        self.engaged
    }
}

impl Drop for MemTrace {
    fn drop(&mut self) {
        if self.engaged {
            platform::disengage();
        }
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod platform {
    use std::path::Path;

    extern "C" {
        fn mtrace();
        fn muntrace();
    }

    pub fn engage(dir: &Path, full_name: &str) -> bool {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "Failed to create memory trace directory '{}': {}",
                dir.display(),
                e
            );
            return false;
        }
        let path = super::MemTrace::trace_path(dir, full_name);
        eprintln!(
            "Enabling memory trace for test '{}' into file '{}'",
            full_name,
            path.display()
        );
        // glibc reads MALLOC_TRACE when mtrace() is called.
        std::env::set_var("MALLOC_TRACE", &path);
        unsafe { mtrace() };
        true
    }

    pub fn disengage() {
        unsafe { muntrace() };
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
mod platform {
    use std::path::Path;

    pub fn engage(_dir: &Path, _full_name: &str) -> bool {
        false
    }

    pub fn disengage() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_trace_is_disengaged() {
        let guard = MemTrace::engage(false, Path::new("/nonexistent"), "group.case");
        assert!(!guard.engaged());
    }

    #[test]
    fn test_trace_path_is_namespaced_per_test() {
        let a = MemTrace::trace_path(Path::new("traces"), "dsp.mul");
        let b = MemTrace::trace_path(Path::new("traces"), "dsp.add");
        assert_ne!(a, b);
        assert!(a.ends_with("dsp.mul.mtrace"));
    }
}
