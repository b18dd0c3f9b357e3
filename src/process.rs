use log::debug;
use once_cell::unsync::OnceCell;
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::{Builder, Runtime};

/// Captured result of an external program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn from_parts(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        ProcessOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(stdout).to_string(),
            stderr: String::from_utf8_lossy(stderr).to_string(),
        }
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        ProcessOutput::from_parts(output.status, &output.stdout, &output.stderr)
    }
}

/// Every external program ARK talks to goes through this trait.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessRunner {
    /// Run to completion and capture stdout/stderr.
    fn output(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput>;

    /// Run to completion with the terminal attached; returns the exit code.
    fn status(&self, program: &str, args: &[String]) -> io::Result<Option<i32>>;

    /// Like `output`, but gives up after `timeout` and kills the child.
    /// Returns `Ok(None)` on timeout.
    fn output_with_timeout(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> io::Result<Option<ProcessOutput>>;
}

/// Runs programs on the local machine.
#[derive(Default)]
pub struct SystemRunner {
    runtime: OnceCell<Runtime>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn runtime(&self) -> io::Result<&Runtime> {
        self.runtime
            .get_or_try_init(|| Builder::new_current_thread().enable_all().build())
    }
}

impl ProcessRunner for SystemRunner {
    fn output(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        debug!("Executing local command: {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(output.into())
    }

    fn status(&self, program: &str, args: &[String]) -> io::Result<Option<i32>> {
        debug!("Executing local command (attached): {} {}", program, args.join(" "));
        let status = Command::new(program).args(args).status()?;
        Ok(status.code())
    }

    fn output_with_timeout(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> io::Result<Option<ProcessOutput>> {
        debug!(
            "Executing local command with {:?} timeout: {} {}",
            timeout,
            program,
            args.join(" ")
        );
        self.runtime()?.block_on(async {
            let mut child = tokio::process::Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()?;
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let finished = tokio::time::timeout(timeout, async {
                tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
            })
            .await;

            match finished {
                Ok(result) => {
                    let (status, stdout, stderr) = result?;
                    Ok(Some(ProcessOutput::from_parts(status, &stdout, &stderr)))
                }
                Err(_) => {
                    debug!("{} timed out after {:?}", program, timeout);
                    // reap the child so it does not linger as a zombie
                    child.kill().await?;
                    child.wait().await?;
                    Ok(None)
                }
            }
        })
    }
}

async fn read_pipe<P: AsyncRead + Unpin>(pipe: Option<P>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_output_echo() {
        let out = SystemRunner::new().output("echo", &args(&["hello"])).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn test_output_non_zero_exit() {
        let out = SystemRunner::new()
            .output("sh", &args(&["-c", "echo oops >&2; exit 3"]))
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let err = SystemRunner::new()
            .output("definitely-not-a-real-program-ark", &[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_timeout_returns_none() {
        let runner = SystemRunner::new();
        let out = runner
            .output_with_timeout("sleep", &args(&["5"]), Duration::from_millis(100))
            .unwrap();
        assert!(out.is_none());

        // the runtime is reused for later calls
        let out = runner
            .output_with_timeout("echo", &args(&["again"]), Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(out.stdout.trim(), "again");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_timed_out_child_is_reaped() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 5", pid_file.display());

        let out = SystemRunner::new()
            .output_with_timeout("sh", &args(&["-c", &script]), Duration::from_millis(500))
            .unwrap();
        assert!(out.is_none());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        // a zombie would still have a /proc entry
        assert!(!Path::new("/proc").join(pid.trim()).exists());
    }
}
