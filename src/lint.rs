use log::{debug, info};
use std::path::Path;

use crate::process::ProcessRunner;
use crate::project::find_playbooks;

/// Result of linting one playbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintOutcome {
    pub playbook: String,
    /// `None` when the playbook passed, otherwise why it did not.
    pub error: Option<String>,
    pub output: String,
}

impl LintOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// `<linter> --version` runs and exits zero.
pub fn linter_available<R: ProcessRunner>(runner: &R, linter: &str) -> bool {
    match runner.output(linter, &["--version".to_string()]) {
        Ok(output) if output.success() => {
            debug!("{} version: {}", linter, output.stdout.trim());
            true
        }
        Ok(output) => {
            debug!("{} --version exited with {:?}", linter, output.code);
            false
        }
        Err(e) => {
            debug!("{} could not be started: {}", linter, e);
            false
        }
    }
}

pub fn lint_playbook<R: ProcessRunner>(runner: &R, linter: &str, playbook: &str, path: &Path) -> LintOutcome {
    info!("Linting {}", path.display());
    let (error, output) = match runner.output(linter, &[path.display().to_string()]) {
        Ok(output) if output.success() => (None, output.stdout),
        Ok(output) => {
            let reason = match output.code {
                Some(code) => format!("{} returned non-zero exit status {}", linter, code),
                None => format!("{} was terminated by a signal", linter),
            };
            (Some(reason), format!("{}{}", output.stdout, output.stderr))
        }
        Err(e) => (Some(format!("{} could not be started: {}", linter, e)), String::new()),
    };

    LintOutcome {
        playbook: playbook.to_string(),
        error,
        output,
    }
}

/// Lint every playbook in `project_dir`; a failure never stops the batch.
pub fn lint_all<R: ProcessRunner>(runner: &R, linter: &str, project_dir: &Path) -> Vec<LintOutcome> {
    find_playbooks(project_dir)
        .into_iter()
        .map(|playbook| {
            let path = project_dir.join(&playbook);
            lint_playbook(runner, linter, &playbook, &path)
        })
        .collect()
}
