use indexmap::IndexMap;
use log::info;
use std::io::Write;

use crate::config::ArkConfig;
use crate::error::{ArkError, Result};
use crate::process::ProcessRunner;

/// Ordered `--extra-vars` mapping.
pub type ExtraVars = IndexMap<String, String>;

/// Parse `"k=v,k2=v2"` into a mapping. Each pair must contain exactly one `=`.
pub fn prepare_extra_vars(extra_vars: &str) -> Result<ExtraVars> {
    let mut vars = ExtraVars::new();
    if extra_vars.is_empty() {
        return Ok(vars);
    }

    for pair in extra_vars.split(',') {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                vars.insert(key.to_string(), value.to_string());
            }
            _ => return Err(ArkError::InvalidExtraVars(pair.to_string())),
        }
    }
    Ok(vars)
}

/// One `ark run` invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Playbook file name inside the project directory.
    pub playbook: String,
    pub rotate_artifacts: u8,
    pub limit: Option<String>,
    pub extra_vars: ExtraVars,
}

/// Hand the playbook to ansible-runner and wait for it.
///
/// Output goes straight to the terminal. Returns the runner's exit code.
pub fn run_playbook<R: ProcessRunner>(
    runner: &R,
    config: &ArkConfig,
    request: &RunRequest,
) -> Result<Option<i32>> {
    let mut args = vec![
        "run".to_string(),
        config.root.display().to_string(),
        "-p".to_string(),
        request.playbook.clone(),
        "--rotate-artifacts".to_string(),
        request.rotate_artifacts.to_string(),
    ];
    if let Some(limit) = request.limit.as_deref().filter(|l| !l.is_empty()) {
        args.push("--limit".to_string());
        args.push(limit.to_string());
    }

    // kept alive until the runner exits
    let mut vars_file = None;
    if !request.extra_vars.is_empty() {
        let mut file = tempfile::Builder::new()
            .prefix("ark-extravars-")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer(&mut file, &request.extra_vars)
            .map_err(std::io::Error::from)?;
        file.flush()?;
        args.push("--cmdline".to_string());
        args.push(format!("-e @{}", file.path().display()));
        vars_file = Some(file);
    }

    info!("Running playbook {} with {}", request.playbook, config.runner);
    let code = runner
        .status(&config.runner, &args)
        .map_err(|source| ArkError::ToolMissing {
            tool: config.runner.clone(),
            source,
        })?;
    drop(vars_file);

    info!("{} finished with exit code {:?}", config.runner, code);
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockProcessRunner;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::path::Path;

    fn config() -> ArkConfig {
        ArkConfig::new(Path::new("/srv/ark")).with_launcher(Path::new("/usr/bin/ark"))
    }

    #[test]
    fn test_prepare_extra_vars() {
        let vars = prepare_extra_vars("a=1,b=2").unwrap();
        assert_eq!(
            vars.into_iter().collect::<Vec<_>>(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
        assert!(prepare_extra_vars("").unwrap().is_empty());
    }

    #[test]
    fn test_prepare_extra_vars_rejects_malformed_pairs() {
        for bad in ["a", "a=1,b", "a=1=2", "a=1,"] {
            match prepare_extra_vars(bad) {
                Err(ArkError::InvalidExtraVars(_)) => {}
                other => panic!("{:?} should be rejected, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_run_playbook_arguments() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_status()
            .withf(|program, args| {
                program == "ansible-runner"
                    && args[..6] == ["run", "/srv/ark", "-p", "site.yml", "--rotate-artifacts", "3"]
                    && args[6..8] == ["--limit", "web"]
                    && args[8] == "--cmdline"
                    && args[9]
                        .strip_prefix("-e @")
                        .and_then(|path| std::fs::read_to_string(path).ok())
                        .map_or(false, |json| json == r#"{"env":"prod","tier":"web"}"#)
            })
            .times(1)
            .returning(|_, _| Ok(Some(0)));

        let request = RunRequest {
            playbook: "site.yml".to_string(),
            rotate_artifacts: 3,
            limit: Some("web".to_string()),
            extra_vars: prepare_extra_vars("env=prod,tier=web").unwrap(),
        };
        assert_eq!(run_playbook(&runner, &config(), &request).unwrap(), Some(0));
    }

    #[test]
    fn test_run_playbook_minimal_arguments() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_status()
            .withf(|_, args| args.len() == 6)
            .returning(|_, _| Ok(Some(2)));

        let request = RunRequest {
            playbook: "main.yml".to_string(),
            rotate_artifacts: 7,
            limit: Some(String::new()),
            extra_vars: ExtraVars::new(),
        };
        assert_eq!(run_playbook(&runner, &config(), &request).unwrap(), Some(2));
    }

    #[test]
    fn test_run_playbook_missing_runner() {
        let mut runner = MockProcessRunner::new();
        runner.expect_status().returning(|_, _| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
        });

        let request = RunRequest {
            playbook: "main.yml".to_string(),
            rotate_artifacts: 7,
            limit: None,
            extra_vars: ExtraVars::new(),
        };
        assert!(matches!(
            run_playbook(&runner, &config(), &request),
            Err(ArkError::ToolMissing { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_extra_vars_roundtrip_pairs(
            pairs in proptest::collection::vec(("[a-z_]{1,8}", "[A-Za-z0-9._-]{0,8}"), 1..6)
        ) {
            let text = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            let vars = prepare_extra_vars(&text).unwrap();
            for (key, _) in &pairs {
                // later duplicates win
                let expected = pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v);
                prop_assert_eq!(vars.get(key), expected);
            }
        }
    }
}
