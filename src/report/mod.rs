mod parser;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use itertools::Itertools;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

pub use parser::{
    extract_host_stats, extract_play_recaps, playbook_from_command_file, HostStats, PlayRecap,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Summary of one past ansible-runner execution.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub timestamp: DateTime<Local>,
    pub playbook: Option<String>,
    pub recaps: Vec<PlayRecap>,
}

impl ArtifactRecord {
    /// Parse the `stdout` and `command` files of an artifact directory.
    pub fn load(artifact_dir: &Path) -> Result<Self> {
        let stdout_path = artifact_dir.join("stdout");
        let content = fs::read_to_string(&stdout_path)
            .with_context(|| format!("Failed to read {}", stdout_path.display()))?;

        let recaps = extract_play_recaps(&content)
            .iter()
            .map(|recap| extract_host_stats(recap))
            .collect::<Vec<_>>();
        debug!(
            "Artifact {} has {} play recaps",
            artifact_dir.display(),
            recaps.len()
        );

        Ok(ArtifactRecord {
            path: artifact_dir.to_path_buf(),
            timestamp: artifact_timestamp(&stdout_path)?,
            playbook: playbook_from_command_file(&artifact_dir.join("command")),
            recaps,
        })
    }

    pub fn timestamp_display(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Console rendering used by `ark report`.
    pub fn render(&self) -> String {
        let mut out = vec![
            format!("Report for {}:", self.path.display()),
            format!(
                "{} executed at: {}",
                self.playbook.as_deref().unwrap_or("Playbook").bold(),
                self.timestamp_display()
            ),
            "-------------------------".to_string(),
        ];

        for recap in &self.recaps {
            for (host, stats) in recap {
                let counters = stats
                    .iter()
                    .map(|(name, value)| colorize_counter(name, *value))
                    .join(" ");
                out.push(format!("{}: {}", host.bold(), counters));
            }
        }
        out.push(String::new());
        out.join("\n")
    }
}

fn colorize_counter(name: &str, value: i64) -> String {
    let text = format!("{}={}", name, value);
    match (name, value) {
        (_, 0) => text,
        ("ok", _) => text.green().to_string(),
        ("changed", _) => text.yellow().to_string(),
        ("failed" | "unreachable", _) => text.red().to_string(),
        _ => text,
    }
}

/// Modification time of an artifact's `stdout` file in local time.
pub fn artifact_timestamp(stdout_path: &Path) -> Result<DateTime<Local>> {
    let modified = fs::metadata(stdout_path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("Failed to stat {}", stdout_path.display()))?;
    Ok(DateTime::<Local>::from(modified))
}

/// Every directory under `artifacts_dir` (itself included) holding a `stdout` file.
pub fn find_artifacts(artifacts_dir: &Path) -> Vec<PathBuf> {
    let artifacts: Vec<PathBuf> = WalkDir::new(artifacts_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .filter(|path| path.join("stdout").is_file())
        .collect();
    info!(
        "Found {} artifact directories under {}",
        artifacts.len(),
        artifacts_dir.display()
    );
    artifacts
}

/// Newest first; keep only `last` entries when `0 < last < len`.
pub fn sort_and_limit_artifacts(mut artifacts: Vec<PathBuf>, last: Option<usize>) -> Vec<PathBuf> {
    artifacts.sort_by_cached_key(|path| {
        std::cmp::Reverse(
            fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH),
        )
    });

    if let Some(last) = last {
        if last > 0 && last < artifacts.len() {
            artifacts.truncate(last);
        }
    }
    artifacts
}
