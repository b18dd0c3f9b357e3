use indexmap::IndexMap;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Counters for one host, in the order they appear on the recap line.
pub type HostStats = IndexMap<String, i64>;

/// One `PLAY RECAP` block: hosts in the order they appear in the log.
pub type PlayRecap = IndexMap<String, HostStats>;

static ANSI_ESCAPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());
static PLAY_RECAP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)PLAY RECAP\s+\*+\s+(?P<recap>.*?)(?:\n\n|$)").unwrap());
static PLAYBOOK_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"project/([\w-]+\.yml)").unwrap());

/// Bodies of every `PLAY RECAP` block in `content`, in log order.
pub fn extract_play_recaps(content: &str) -> Vec<String> {
    let content = ANSI_ESCAPE_RE.replace_all(content, "");
    PLAY_RECAP_RE
        .captures_iter(&content)
        .filter_map(|caps| caps.name("recap"))
        .map(|recap| recap.as_str().to_string())
        .collect()
}

/// Parse `host : key=value ...` lines of a recap body.
///
/// Lines without a colon and tokens that are not `key=<integer>` are
/// skipped with a warning.
pub fn extract_host_stats(recap: &str) -> PlayRecap {
    let mut host_stats = PlayRecap::new();

    for line in recap.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((host, stats)) = line.split_once(':') else {
            warn!("Skipping recap line without host separator: {}", line);
            continue;
        };

        let mut stats_map = HostStats::new();
        for token in stats.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                warn!("Skipping recap token without '=': {}", token);
                continue;
            };
            match value.parse::<i64>() {
                Ok(value) => {
                    stats_map.insert(key.to_string(), value);
                }
                Err(e) => warn!("Skipping recap counter {}: {}", token, e),
            }
        }
        host_stats.insert(host.trim().to_string(), stats_map);
    }

    host_stats
}

#[derive(Deserialize)]
struct CommandRecord {
    command: Vec<String>,
}

/// Playbook file name recorded in an artifact's `command` file.
pub fn playbook_from_command_file(path: &Path) -> Option<String> {
    if !path.is_file() {
        debug!("No command file at {}", path.display());
        return None;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    let record: CommandRecord = match serde_json::from_str(&content) {
        Ok(record) => record,
        Err(e) => {
            warn!("Malformed command file {}: {}", path.display(), e);
            return None;
        }
    };

    let command = record.command.join(" ");
    let name = PLAYBOOK_NAME_RE
        .captures(&command)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    if name.is_none() {
        debug!("Playbook name not found in the command string: {}", command);
    }
    name
}
