//! Campaign Planner
//!
//! Decides what a campaign does (the mode) and where each run writes
//! (the output directories).
//!
//! Run directories are `<output_root>/output_<i>` for `i` in `1..=N`. The
//! names depend only on the index, never on execution order, so a later
//! collect-only pass finds exactly the directories an earlier execute pass
//! produced.

use std::path::{Path, PathBuf};

/// Prefix of every run directory name
pub const RUN_DIR_PREFIX: &str = "output_";

/// What a campaign invocation does
///
/// Parsed from a mode string whose letters independently switch on
/// execution (`e`) and collection (`c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    /// Launch fuzzer runs
    pub execute: bool,
    /// Aggregate run stats into a report
    pub collect: bool,
}

impl Mode {
    /// Execute then collect (the default)
    pub const EXECUTE_COLLECT: Mode = Mode {
        execute: true,
        collect: true,
    };

    /// Launch without waiting and without collecting
    pub const EXECUTE_ONLY: Mode = Mode {
        execute: true,
        collect: false,
    };

    /// Aggregate pre-existing run directories
    pub const COLLECT_ONLY: Mode = Mode {
        execute: false,
        collect: true,
    };

    /// Whether dispatch blocks until runs finish
    ///
    /// Collection needs final stats, so collecting modes wait; execute-only
    /// returns once every run has started.
    pub fn waits_for_runs(self) -> bool {
        self.collect
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::EXECUTE_COLLECT
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > 2 || !s.chars().all(|c| c == 'e' || c == 'c') {
            return Err(format!(
                "invalid mode '{}': expected a combination of 'e' (execute) and 'c' (collect)",
                s
            ));
        }
        let execute = s.contains('e');
        let collect = s.contains('c');
        if s.len() == 2 && !(execute && collect) {
            return Err(format!("invalid mode '{}': repeated letter", s));
        }
        Ok(Mode { execute, collect })
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.execute {
            f.write_str("e")?;
        }
        if self.collect {
            f.write_str("c")?;
        }
        Ok(())
    }
}

/// Output layout of a campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentPlan {
    /// Directory holding every run directory and the aggregate report
    pub output_root: PathBuf,
    /// Run directories in index order
    pub run_dirs: Vec<PathBuf>,
}

/// Build the run directory layout for `runs` runs under `output_root`
pub fn build_plan(output_root: impl AsRef<Path>, runs: usize) -> ExperimentPlan {
    let output_root = output_root.as_ref().to_path_buf();
    let run_dirs = (1..=runs)
        .map(|i| output_root.join(format!("{}{}", RUN_DIR_PREFIX, i)))
        .collect();

    ExperimentPlan {
        output_root,
        run_dirs,
    }
}
