//! Local process execution with timeout and guaranteed kill.
//!
//! Every remote operation in the control plane is ultimately a local
//! invocation of the provider binary; this is the single choke point where
//! those invocations happen. Test doubles implement [`CommandRunner`] and
//! return canned output without spawning anything.

use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Default per-command timeout.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(60);

/// A local invocation that could not produce an [`Output`].
///
/// A command that ran and exited non-zero is NOT an error here; callers get
/// the `Output` and decide. These variants are channel failures.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run to completion, capturing output, with the default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output, RunnerError>;

    /// Run with an explicit timeout (provisioning can take minutes).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output, RunnerError>;

    /// Run with stdin piped from `input`.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<Output, RunnerError>;

    /// Spawn without waiting; stdout piped, `kill_on_drop` set. Used for
    /// `logs --follow` streaming. The caller owns the child's lifetime.
    fn spawn(&self, program: &str, args: &[&str]) -> Result<tokio::process::Child, RunnerError>;

    /// Run with inherited stdio and no timeout (interactive shells).
    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<std::process::ExitStatus, RunnerError>;
}

/// Production runner on tokio.
///
/// `tokio::time::timeout` around `.output().await` does not kill the child
/// when the timeout fires on every platform; this implementation races the
/// drain against a sleep and relies on `kill_on_drop` to reap the loser.
pub struct TokioCommandRunner;

/// Read a child to completion while draining stdout/stderr concurrently.
///
/// The drains must run alongside `wait()`: a child that writes more than the
/// OS pipe buffer blocks on write, and a bare `wait()` would deadlock.
async fn drain(mut child: tokio::process::Child, program: &str) -> Result<Output, RunnerError> {
    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();
    let (status, stdout, stderr) = tokio::join!(
        child.wait(),
        async {
            let mut buf = Vec::new();
            if let Some(h) = stdout_handle.as_mut() {
                let _ = h.read_to_end(&mut buf).await;
            }
            buf
        },
        async {
            let mut buf = Vec::new();
            if let Some(h) = stderr_handle.as_mut() {
                let _ = h.read_to_end(&mut buf).await;
            }
            buf
        },
    );
    Ok(Output {
        status: status.map_err(|source| RunnerError::Wait {
            program: program.to_string(),
            source,
        })?,
        stdout,
        stderr,
    })
}

impl TokioCommandRunner {
    fn command(program: &str, args: &[&str]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args).kill_on_drop(true);
        cmd
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output, RunnerError> {
        self.run_with_timeout(program, args, DEFAULT_CMD_TIMEOUT)
            .await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output, RunnerError> {
        let mut child = Self::command(program, args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        tokio::select! {
            result = drain(child, program) => result,
            () = tokio::time::sleep(timeout) => {
                Err(RunnerError::TimedOut { program: program.to_string(), timeout })
            }
        }
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<Output, RunnerError> {
        let mut child = Self::command(program, args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Feed stdin from a separate task so a full pipe cannot deadlock
        // against the output drains.
        let stdin_handle = child.stdin.take();
        let input_owned = input.to_vec();
        let feeder = tokio::spawn(async move {
            if let Some(mut stdin) = stdin_handle {
                use tokio::io::AsyncWriteExt;
                let _ = stdin.write_all(&input_owned).await;
            }
        });

        let result = tokio::select! {
            result = drain(child, program) => result,
            () = tokio::time::sleep(DEFAULT_CMD_TIMEOUT) => {
                Err(RunnerError::TimedOut { program: program.to_string(), timeout: DEFAULT_CMD_TIMEOUT })
            }
        };
        let _ = feeder.await;
        result
    }

    fn spawn(&self, program: &str, args: &[&str]) -> Result<tokio::process::Child, RunnerError> {
        Self::command(program, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.to_string(),
                source,
            })
    }

    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<std::process::ExitStatus, RunnerError> {
        let mut child =
            Self::command(program, args)
                .spawn()
                .map_err(|source| RunnerError::Spawn {
                    program: program.to_string(),
                    source,
                })?;
        child.wait().await.map_err(|source| RunnerError::Wait {
            program: program.to_string(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit() {
        let out = TokioCommandRunner
            .run("sh", &["-c", "echo hello"])
            .await
            .expect("run");
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let out = TokioCommandRunner
            .run("sh", &["-c", "echo oops >&2; exit 7"])
            .await
            .expect("run");
        assert_eq!(out.status.code(), Some(7));
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "oops");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let err = TokioCommandRunner
            .run("definitely-not-a-binary-armada", &[])
            .await
            .expect_err("spawn failure");
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let err = TokioCommandRunner
            .run_with_timeout("sleep", &["30"], Duration::from_millis(100))
            .await
            .expect_err("timeout");
        assert!(matches!(err, RunnerError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn stdin_is_piped_through() {
        let out = TokioCommandRunner
            .run_with_stdin("cat", &[], b"fleet")
            .await
            .expect("run");
        assert_eq!(out.stdout, b"fleet");
    }
}
