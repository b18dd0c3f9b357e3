//! Crontab reconciliation for scheduled `ark run` invocations.
//!
//! Every ARK job is one crontab line ending in `#ARK-<name>`. The crontab
//! is read in full, edited in memory, and written back in full.

mod table;

use log::{debug, info, warn};
use std::io::Write;
use std::path::Path;

use crate::config::CRONTAB_EXECUTABLE;
use crate::error::{ArkError, Result};
use crate::process::ProcessRunner;

pub use table::{CronJobSpec, CronTable, UpsertOutcome, CRONJOB_TAG};

/// Exit code `crontab -l` uses for "no crontab for user".
const NO_CRONTAB_EXIT_CODE: i32 = 1;

/// Access to a user's crontab text.
#[cfg_attr(test, mockall::automock)]
pub trait CrontabStore {
    fn read(&self, user: &str) -> Result<String>;
    fn write(&self, user: &str, text: &str) -> Result<()>;
}

/// The OS crontab, driven through the `crontab` command.
pub struct SystemCrontab<'a, R: ProcessRunner> {
    runner: &'a R,
}

impl<'a, R: ProcessRunner> SystemCrontab<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        SystemCrontab { runner }
    }

    fn crontab(&self, user: &str, args: &[String]) -> Result<crate::process::ProcessOutput> {
        self.runner
            .output(CRONTAB_EXECUTABLE, args)
            .map_err(|source| ArkError::ToolMissing {
                tool: format!("{} (user {})", CRONTAB_EXECUTABLE, user),
                source,
            })
    }
}

impl<R: ProcessRunner> CrontabStore for SystemCrontab<'_, R> {
    fn read(&self, user: &str) -> Result<String> {
        let args = vec!["-u".to_string(), user.to_string(), "-l".to_string()];
        let output = self.crontab(user, &args)?;
        match output.code {
            Some(0) => Ok(output.stdout),
            Some(NO_CRONTAB_EXIT_CODE) => {
                debug!("No crontab for user {}", user);
                Ok(String::new())
            }
            code => Err(ArkError::Crontab {
                user: user.to_string(),
                code,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    fn write(&self, user: &str, text: &str) -> Result<()> {
        let mut temp = tempfile::NamedTempFile::new()?;
        temp.write_all(text.as_bytes())?;
        temp.flush()?;

        let args = vec![
            "-u".to_string(),
            user.to_string(),
            temp.path().display().to_string(),
        ];
        let output = self.crontab(user, &args)?;
        if output.success() {
            info!("Installed new crontab for user {}", user);
            Ok(())
        } else {
            Err(ArkError::Crontab {
                user: user.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Where the generated cron lines point.
#[derive(Debug, Clone, Copy)]
pub struct CronTarget<'a> {
    pub launcher: &'a Path,
    pub ark_dir: &'a Path,
}

/// What `reconcile` changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub upserted: Vec<(String, UpsertOutcome)>,
    pub removed: Vec<String>,
    pub not_found: Vec<String>,
}

/// Apply all upserts, then all removals, and write the crontab once.
///
/// Every upsert is validated before the crontab is read.
///
/// The crontab is read again right before writing; if someone else changed
/// it in the meantime nothing is written and `CrontabChanged` is returned.
pub fn reconcile<S: CrontabStore>(
    store: &S,
    user: &str,
    target: CronTarget<'_>,
    upserts: &[CronJobSpec],
    removals: &[String],
) -> Result<ReconcileSummary> {
    for job in upserts {
        job.validate()?;
    }

    let original = store.read(user)?;
    let mut table = CronTable::parse(&original);
    let mut summary = ReconcileSummary::default();

    for job in upserts {
        let line = job.to_line(target.launcher, target.ark_dir);
        let outcome = table.upsert(job, line);
        summary.upserted.push((job.name.clone(), outcome));
    }

    for name in removals {
        if table.remove(name) {
            summary.removed.push(name.clone());
        } else {
            summary.not_found.push(name.clone());
        }
    }

    if store.read(user)? != original {
        warn!("Crontab for user {} changed during update", user);
        return Err(ArkError::CrontabChanged(user.to_string()));
    }
    store.write(user, &table.render())?;
    Ok(summary)
}

/// ARK-managed lines of a user's crontab.
pub fn list_jobs<S: CrontabStore>(store: &S, user: &str) -> Result<Vec<String>> {
    let table = CronTable::parse(&store.read(user)?);
    Ok(table.tagged_lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockProcessRunner, ProcessOutput};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn target() -> (PathBuf, PathBuf) {
        (PathBuf::from("/opt/ark/bin/ark"), PathBuf::from("/opt/ark"))
    }

    fn output(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_read_missing_crontab_is_empty() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_output()
            .withf(|program, args| program == "crontab" && args == ["-u", "deploy", "-l"])
            .returning(|_, _| Ok(output(1, "", "no crontab for deploy")));

        let store = SystemCrontab::new(&runner);
        assert_eq!(store.read("deploy").unwrap(), "");
    }

    #[test]
    fn test_read_other_failure_is_error() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_output()
            .returning(|_, _| Ok(output(2, "", "must be privileged to use -u")));

        let store = SystemCrontab::new(&runner);
        match store.read("root") {
            Err(ArkError::Crontab { code, stderr, .. }) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "must be privileged to use -u");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_write_installs_temp_file() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_output()
            .withf(|program, args| {
                program == "crontab"
                    && args.len() == 3
                    && std::fs::read_to_string(&args[2]).map_or(false, |text| text == "a\nb\n")
            })
            .times(1)
            .returning(|_, _| Ok(output(0, "", "")));

        let store = SystemCrontab::new(&runner);
        store.write("deploy", "a\nb\n").unwrap();
    }

    #[test]
    fn test_reconcile_upserts_before_removals() {
        let (launcher, ark_dir) = target();
        let current = "0 1 * * * /usr/bin/backup\n0 2 * * * old #ARK-nightly\n0 3 * * * x #ARK-weekly\n";

        let mut store = MockCrontabStore::new();
        store
            .expect_read()
            .times(2)
            .returning(move |_| Ok(current.to_string()));
        store
            .expect_write()
            .withf(|user, text| {
                user == "deploy"
                    && text
                        == "0 1 * * * /usr/bin/backup\n\
                            5 4 * * * /opt/ark/bin/ark --ark-dir /opt/ark run site.yml #ARK-nightly\n"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut job = CronJobSpec::new("nightly", "site.yml");
        job.minute = "5".to_string();
        job.hour = "4".to_string();
        let summary = reconcile(
            &store,
            "deploy",
            CronTarget {
                launcher: &launcher,
                ark_dir: &ark_dir,
            },
            &[job],
            &["weekly".to_string(), "ghost".to_string()],
        )
        .unwrap();

        assert_eq!(
            summary,
            ReconcileSummary {
                upserted: vec![("nightly".to_string(), UpsertOutcome::Updated)],
                removed: vec!["weekly".to_string()],
                not_found: vec!["ghost".to_string()],
            }
        );
    }

    #[test]
    fn test_reconcile_refuses_concurrent_change() {
        let (launcher, ark_dir) = target();
        let mut seq = Sequence::new();
        let mut store = MockCrontabStore::new();
        store
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(String::new()));
        store
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("* * * * * someone-else\n".to_string()));
        store.expect_write().never();

        let result = reconcile(
            &store,
            "deploy",
            CronTarget {
                launcher: &launcher,
                ark_dir: &ark_dir,
            },
            &[CronJobSpec::new("nightly", "site.yml")],
            &[],
        );
        assert!(matches!(result, Err(ArkError::CrontabChanged(user)) if user == "deploy"));
    }

    #[test]
    fn test_reconcile_rejects_invalid_job_before_reading() {
        let (launcher, ark_dir) = target();
        let mut store = MockCrontabStore::new();
        store.expect_read().never();
        store.expect_write().never();

        let mut job = CronJobSpec::new("nightly", "site.yml");
        job.minute = "0\n* * * * * evil".to_string();
        let result = reconcile(
            &store,
            "deploy",
            CronTarget {
                launcher: &launcher,
                ark_dir: &ark_dir,
            },
            &[job],
            &[],
        );
        assert!(matches!(
            result,
            Err(ArkError::InvalidCronField { field: "minute", .. })
        ));
    }

    #[test]
    fn test_list_jobs_filters_tag() {
        let mut store = MockCrontabStore::new();
        store.expect_read().returning(|_| {
            Ok("MAILTO=root\n0 1 * * * /usr/bin/backup\n* * * * * ark run a.yml #ARK-a\n".to_string())
        });
        assert_eq!(
            list_jobs(&store, "deploy").unwrap(),
            vec!["* * * * * ark run a.yml #ARK-a".to_string()]
        );
    }
}
