use log::debug;
use std::path::{Path, PathBuf};

pub const RUNNER_EXECUTABLE: &str = "ansible-runner";
pub const LINT_EXECUTABLE: &str = "ansible-lint";
pub const DNS_LOOKUP_EXECUTABLE: &str = "nslookup";
pub const CRONTAB_EXECUTABLE: &str = "crontab";

/// Paths and executables every command works from.
///
/// Built once in `main` from the global `--ark-dir` flag and handed down
/// explicitly; nothing below the CLI layer looks at the environment.
#[derive(Debug, Clone)]
pub struct ArkConfig {
    pub root: PathBuf,
    pub project_dir: PathBuf,
    pub inventory_dir: PathBuf,
    pub runner: String,
    pub linter: String,
    pub dns_lookup: String,
    /// Absolute path of the `ark` binary, written into cron lines.
    pub launcher: PathBuf,
}

impl ArkConfig {
    pub fn new(root: &Path) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let launcher = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("ark"));
        debug!("ARK root: {}, launcher: {}", root.display(), launcher.display());

        ArkConfig {
            project_dir: root.join("project"),
            inventory_dir: root.join("inventory"),
            root,
            runner: RUNNER_EXECUTABLE.to_string(),
            linter: LINT_EXECUTABLE.to_string(),
            dns_lookup: DNS_LOOKUP_EXECUTABLE.to_string(),
            launcher,
        }
    }

    pub fn with_launcher(mut self, launcher: &Path) -> Self {
        self.launcher = launcher.to_path_buf();
        self
    }
}
