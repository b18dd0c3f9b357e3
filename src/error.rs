use thiserror::Error;

/// Failures raised by the ARK library layer.
///
/// The binary wraps these in `anyhow` and decides how each one maps to
/// console output and exit status.
#[derive(Debug, Error)]
pub enum ArkError {
    #[error("Invalid extra-vars pair '{0}': expected key=value")]
    InvalidExtraVars(String),

    #[error("Invalid playbook: {name}. Valid playbooks in the project directory are: {}", valid.join(", "))]
    UnknownPlaybook { name: String, valid: Vec<String> },

    #[error("Invalid cron {field} '{value}': {reason}")]
    InvalidCronField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{tool} could not be started: {source}")]
    ToolMissing {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("crontab for user '{user}' failed (exit code {code:?}): {stderr}")]
    Crontab {
        user: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("crontab for user '{0}' changed while it was being updated; nothing was written")]
    CrontabChanged(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArkError>;
