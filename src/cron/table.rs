use log::{debug, warn};
use std::path::Path;

use crate::error::{ArkError, Result};

/// Marker appended to every crontab line ARK manages.
pub const CRONJOB_TAG: &str = "#ARK-";

/// A scheduled `ark run` of one playbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJobSpec {
    pub name: String,
    /// Playbook file name passed to `ark run`.
    pub job: String,
    pub minute: String,
    pub hour: String,
    pub day: String,
    pub month: String,
    pub weekday: String,
}

impl CronJobSpec {
    /// Job that runs every minute; adjust the schedule fields as needed.
    pub fn new(name: &str, job: &str) -> Self {
        CronJobSpec {
            name: name.to_string(),
            job: job.to_string(),
            minute: "*".to_string(),
            hour: "*".to_string(),
            day: "*".to_string(),
            month: "*".to_string(),
            weekday: "*".to_string(),
        }
    }

    /// Reject values that would break the crontab line they end up in.
    ///
    /// Schedule fields must be single tokens; no field may contain `%`,
    /// which cron turns into a newline, or control characters.
    pub fn validate(&self) -> Result<()> {
        let schedule = [
            ("minute", &self.minute),
            ("hour", &self.hour),
            ("day", &self.day),
            ("month", &self.month),
            ("weekday", &self.weekday),
        ];
        for (field, value) in schedule {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(invalid_field(field, value, "must be a single non-empty token"));
            }
        }
        for (field, value) in schedule
            .into_iter()
            .chain([("name", &self.name), ("job", &self.job)])
        {
            if value.contains('%') {
                return Err(invalid_field(field, value, "must not contain '%'"));
            }
            if value.chars().any(char::is_control) {
                return Err(invalid_field(field, value, "must not contain control characters"));
            }
        }
        if self.name.is_empty() {
            return Err(invalid_field("name", &self.name, "must not be empty"));
        }
        Ok(())
    }

    pub fn tag(&self) -> String {
        format!("{}{}", CRONJOB_TAG, self.name)
    }

    pub fn to_line(&self, launcher: &Path, ark_dir: &Path) -> String {
        format!(
            "{} {} {} {} {} {} --ark-dir {} run {} {}",
            self.minute,
            self.hour,
            self.day,
            self.month,
            self.weekday,
            cron_quote(launcher),
            cron_quote(ark_dir),
            self.job,
            self.tag()
        )
    }
}

fn invalid_field(field: &'static str, value: &str, reason: &'static str) -> ArkError {
    ArkError::InvalidCronField {
        field,
        value: value.to_string(),
        reason,
    }
}

/// Shell-quote a path for the command part of a crontab line and escape `%`.
fn cron_quote(path: &Path) -> String {
    let text = path.display().to_string();
    let plain = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@,=".contains(c));
    let quoted = if plain {
        text
    } else {
        format!("'{}'", text.replace('\'', r"'\''"))
    };
    quoted.replace('%', r"\%")
}

/// What `CronTable::upsert` did with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Appended,
    Updated,
    /// Updated in place and removed this many extra lines with the same tag.
    Deduplicated(usize),
}

/// The lines of one user's crontab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CronTable {
    lines: Vec<String>,
}

impl CronTable {
    pub fn parse(text: &str) -> Self {
        CronTable {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Newline-terminated crontab text.
    pub fn render(&self) -> String {
        self.lines.iter().map(|line| format!("{}\n", line)).collect()
    }

    /// Indices of lines tagged for `name`, matched case-insensitively.
    pub fn matching(&self, name: &str) -> Vec<usize> {
        let tag = format!("{}{}", CRONJOB_TAG, name).to_lowercase();
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.trim_end().to_lowercase().ends_with(&tag))
            .map(|(index, _)| index)
            .collect()
    }

    /// Replace the line tagged for `job.name` in place, or append `line`.
    ///
    /// A crontab edited by hand may carry the same tag more than once;
    /// the first line is replaced and the others are dropped.
    pub fn upsert(&mut self, job: &CronJobSpec, line: String) -> UpsertOutcome {
        let matches = self.matching(&job.name);
        let Some((&first, duplicates)) = matches.split_first() else {
            debug!("Appending cron job '{}'", job.name);
            self.lines.push(line);
            return UpsertOutcome::Appended;
        };

        debug!("Updating cron job '{}' at line {}", job.name, first + 1);
        self.lines[first] = line;
        if duplicates.is_empty() {
            return UpsertOutcome::Updated;
        }

        warn!(
            "Job with the name '{}' exists {} times; removing the duplicates",
            job.name,
            matches.len()
        );
        for &index in duplicates.iter().rev() {
            self.lines.remove(index);
        }
        UpsertOutcome::Deduplicated(duplicates.len())
    }

    /// Remove the first line tagged for `name`. Returns whether one was found.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.matching(name).first() {
            Some(&index) => {
                debug!("Removing cron job '{}' at line {}", name, index + 1);
                self.lines.remove(index);
                true
            }
            None => {
                debug!("No cron job named '{}' to remove", name);
                false
            }
        }
    }

    /// Lines carrying the ARK tag marker.
    pub fn tagged_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|line| line.contains(CRONJOB_TAG))
    }
}
