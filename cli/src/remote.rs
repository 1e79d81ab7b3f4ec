//! Remote exec — a uniform channel to a named VM.
//!
//! The contract: a command that runs and exits non-zero comes back cleanly
//! as an [`ExecResult`]; only channel failures (cannot spawn, cannot reach,
//! timed out) are errors.

use std::time::Duration;

use anyhow::Result;

use crate::command_runner::{CommandRunner, RunnerError};
use crate::error::FleetError;

/// Captured result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit: i32,
}

impl ExecResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit == 0
    }

    /// Stderr trimmed for error messages, falling back to stdout.
    #[must_use]
    pub fn detail(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

/// Quote `s` for interpolation into a `bash -lc` command line.
#[must_use]
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Channel to a named VM.
#[allow(async_fn_in_trait)]
pub trait RemoteExec {
    /// Run `command` under `bash -lc` on `dest` with the default timeout.
    async fn run(&self, dest: &str, command: &str) -> Result<ExecResult>;

    /// Run with an explicit timeout (repository clones take minutes).
    async fn run_with_timeout(
        &self,
        dest: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecResult>;

    /// Write `content` to `remote_path` on `dest`. Plain write — callers
    /// needing atomicity write to a temp path and rename.
    async fn put(&self, dest: &str, content: &[u8], remote_path: &str) -> Result<()>;

    /// Read `remote_path` from `dest`; `None` when the file does not exist.
    async fn get(&self, dest: &str, remote_path: &str) -> Result<Option<Vec<u8>>>;

    /// Spawn `command` on `dest` with piped stdout for line streaming.
    /// No timeout — used by `logs --follow`.
    fn stream(&self, dest: &str, command: &str) -> Result<tokio::process::Child>;

    /// Open an interactive login shell on `dest` with inherited stdio.
    async fn interactive(&self, dest: &str) -> Result<std::process::ExitStatus>;
}

/// Production channel over `multipass exec`.
pub struct MultipassExec<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> MultipassExec<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn channel_error(dest: &str, err: RunnerError) -> FleetError {
        match err {
            RunnerError::TimedOut { timeout, .. } => FleetError::Timeout {
                vm: dest.to_string(),
                seconds: timeout.as_secs(),
            },
            RunnerError::Spawn { .. } | RunnerError::Wait { .. } => FleetError::ConnectError {
                vm: dest.to_string(),
                detail: err.to_string(),
            },
        }
    }

    fn to_result(output: std::process::Output) -> ExecResult {
        ExecResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit: output.status.code().unwrap_or(-1),
        }
    }
}

impl<R: CommandRunner> RemoteExec for MultipassExec<R> {
    async fn run(&self, dest: &str, command: &str) -> Result<ExecResult> {
        let output = self
            .runner
            .run("multipass", &["exec", dest, "--", "bash", "-lc", command])
            .await
            .map_err(|e| Self::channel_error(dest, e))?;
        Ok(Self::to_result(output))
    }

    async fn run_with_timeout(
        &self,
        dest: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecResult> {
        let output = self
            .runner
            .run_with_timeout(
                "multipass",
                &["exec", dest, "--", "bash", "-lc", command],
                timeout,
            )
            .await
            .map_err(|e| Self::channel_error(dest, e))?;
        Ok(Self::to_result(output))
    }

    async fn put(&self, dest: &str, content: &[u8], remote_path: &str) -> Result<()> {
        let output = self
            .runner
            .run_with_stdin(
                "multipass",
                &["exec", dest, "--", "tee", remote_path],
                content,
            )
            .await
            .map_err(|e| Self::channel_error(dest, e))?;
        if !output.status.success() {
            return Err(FleetError::ExecError {
                vm: dest.to_string(),
                detail: format!(
                    "writing {remote_path}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }
        Ok(())
    }

    async fn get(&self, dest: &str, remote_path: &str) -> Result<Option<Vec<u8>>> {
        let output = self
            .runner
            .run("multipass", &["exec", dest, "--", "cat", remote_path])
            .await
            .map_err(|e| Self::channel_error(dest, e))?;
        if output.status.success() {
            return Ok(Some(output.stdout));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such file") {
            return Ok(None);
        }
        Err(FleetError::ExecError {
            vm: dest.to_string(),
            detail: format!("reading {remote_path}: {}", stderr.trim()),
        }
        .into())
    }

    fn stream(&self, dest: &str, command: &str) -> Result<tokio::process::Child> {
        self.runner
            .spawn("multipass", &["exec", dest, "--", "bash", "-lc", command])
            .map_err(|e| Self::channel_error(dest, e).into())
    }

    async fn interactive(&self, dest: &str) -> Result<std::process::ExitStatus> {
        self.runner
            .run_status("multipass", &["exec", dest, "--", "bash", "-l"])
            .await
            .map_err(|e| Self::channel_error(dest, e).into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::cell::RefCell;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    use super::*;

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[derive(Default)]
    struct SpyRunner {
        calls: RefCell<Vec<Vec<String>>>,
        stdin: RefCell<Vec<Vec<u8>>>,
        outputs: RefCell<Vec<Output>>,
    }

    impl SpyRunner {
        fn with_outputs(outputs: Vec<Output>) -> Self {
            Self {
                outputs: RefCell::new(outputs),
                ..Self::default()
            }
        }

        fn next(&self, args: &[&str]) -> Output {
            self.calls
                .borrow_mut()
                .push(args.iter().map(ToString::to_string).collect());
            let mut outputs = self.outputs.borrow_mut();
            if outputs.is_empty() {
                output(0, "", "")
            } else {
                outputs.remove(0)
            }
        }
    }

    impl CommandRunner for SpyRunner {
        async fn run(&self, _program: &str, args: &[&str]) -> Result<Output, RunnerError> {
            Ok(self.next(args))
        }
        async fn run_with_timeout(
            &self,
            _program: &str,
            args: &[&str],
            _timeout: Duration,
        ) -> Result<Output, RunnerError> {
            Ok(self.next(args))
        }
        async fn run_with_stdin(
            &self,
            _program: &str,
            args: &[&str],
            input: &[u8],
        ) -> Result<Output, RunnerError> {
            self.stdin.borrow_mut().push(input.to_vec());
            Ok(self.next(args))
        }
        fn spawn(&self, program: &str, _args: &[&str]) -> Result<tokio::process::Child, RunnerError> {
            Err(RunnerError::Spawn {
                program: program.to_string(),
                source: std::io::Error::other("not spawnable in tests"),
            })
        }
        async fn run_status(
            &self,
            _program: &str,
            _args: &[&str],
        ) -> Result<std::process::ExitStatus, RunnerError> {
            Ok(ExitStatus::from_raw(0))
        }
    }

    #[tokio::test]
    async fn run_wraps_command_in_login_shell() {
        let exec = MultipassExec::new(SpyRunner::default());
        exec.run("vyg-aa-ship-0", "echo hi").await.expect("run");
        let calls = exec.runner.calls.borrow();
        assert_eq!(
            calls[0],
            vec!["exec", "vyg-aa-ship-0", "--", "bash", "-lc", "echo hi"]
        );
    }

    #[tokio::test]
    async fn nonzero_exit_returns_cleanly() {
        let exec = MultipassExec::new(SpyRunner::with_outputs(vec![output(3, "", "boom")]));
        let result = exec.run("vm", "false").await.expect("no channel error");
        assert!(!result.success());
        assert_eq!(result.exit, 3);
        assert_eq!(result.detail(), "boom");
    }

    #[tokio::test]
    async fn put_streams_content_through_tee() {
        let exec = MultipassExec::new(SpyRunner::default());
        exec.put("vm", b"payload", "/srv/armada/x.json")
            .await
            .expect("put");
        let calls = exec.runner.calls.borrow();
        assert_eq!(calls[0], vec!["exec", "vm", "--", "tee", "/srv/armada/x.json"]);
        assert_eq!(exec.runner.stdin.borrow()[0], b"payload");
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_file() {
        let exec = MultipassExec::new(SpyRunner::with_outputs(vec![output(
            1,
            "",
            "cat: /srv/armada/ghost.json: No such file or directory",
        )]));
        let got = exec.get("vm", "/srv/armada/ghost.json").await.expect("get");
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn get_returns_bytes_for_existing_file() {
        let exec = MultipassExec::new(SpyRunner::with_outputs(vec![output(0, "{\"id\":\"a\"}", "")]));
        let got = exec.get("vm", "/srv/armada/a.json").await.expect("get");
        assert_eq!(got.expect("bytes"), b"{\"id\":\"a\"}");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Quoted strings are always single-quote delimited.
            #[test]
            fn prop_shell_quote_wraps(s in ".{0,40}") {
                let quoted = shell_quote(&s);
                prop_assert!(quoted.starts_with('\''));
                prop_assert!(quoted.ends_with('\''));
            }

            /// Every input quote becomes exactly one escape sequence.
            #[test]
            fn prop_shell_quote_escapes_each_quote(s in "[a-z' ]{0,30}") {
                let quoted = shell_quote(&s);
                prop_assert_eq!(
                    quoted.matches(r"'\''").count(),
                    s.matches('\'').count()
                );
            }
        }
    }
}
