//! Host command execution
//!
//! Every external program warmvol touches (mkfs, mount, systemctl, lsblk,
//! the aws CLI) goes through [`CommandRunner`], so the whole restore and
//! snapshot pipeline can run against a scripted runner in tests.

use crate::error::{WarmvolError, WarmvolResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Max number of output lines kept in logs and error messages.
const OUTPUT_TAIL_LINES: usize = 20;

/// Runs a program to completion and returns its combined output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// Returns stdout followed by stderr. A non-zero exit status is an
    /// error carrying that same output.
    async fn run(&self, program: &str, args: &[&str]) -> WarmvolResult<String>;
}

/// Runner backed by real child processes
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    /// Create a runner that kills commands running longer than `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> WarmvolResult<String> {
        let command_line = command_line(program, args);
        debug!("Executing: {}", command_line);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(WarmvolError::command_failed(command_line, e)),
            Err(_) => {
                return Err(WarmvolError::CommandTimeout {
                    command: command_line,
                    timeout: self.timeout,
                })
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            debug!("Command succeeded: {}\n{}", command_line, output_tail(&combined));
            Ok(combined)
        } else {
            let tail = output_tail(&combined);
            warn!(
                "Command failed ({}): {}\n{}",
                output.status, command_line, tail
            );
            Err(WarmvolError::command_exec(command_line, tail))
        }
    }
}

/// Render a command as a single shell-like line for logs
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Keep the last few lines of command output so logs stay readable.
pub(crate) fn output_tail(output: &str) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let total = lines.len();
    if total > OUTPUT_TAIL_LINES {
        let mut tail = format!("... ({} lines omitted)\n", total - OUTPUT_TAIL_LINES);
        tail.push_str(&lines[total - OUTPUT_TAIL_LINES..].join("\n"));
        tail
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> SystemCommandRunner {
        SystemCommandRunner::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn returns_stdout_on_success() {
        let output = runner().run("echo", &["hello", "world"]).await.unwrap();
        assert_eq!(output.trim(), "hello world");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error_with_output() {
        let err = runner()
            .run("sh", &["-c", "echo boom >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            WarmvolError::CommandExecution { command, output } => {
                assert!(command.starts_with("sh -c"));
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_command_failed() {
        let err = runner()
            .run("warmvol-definitely-not-installed", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, WarmvolError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let runner = SystemCommandRunner::new(Duration::from_millis(100));
        let err = runner.run("sleep", &["5"]).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn output_tail_truncates_long_output() {
        let long: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let tail = output_tail(&long);
        assert!(tail.starts_with("... (30 lines omitted)"));
        assert!(tail.ends_with("line 49"));
        assert_eq!(output_tail("one\ntwo\n"), "one\ntwo");
    }

    #[test]
    fn command_line_joins_args() {
        assert_eq!(command_line("umount", &["/mnt"]), "umount /mnt");
        assert_eq!(command_line("lsblk", &[]), "lsblk");
    }
}
