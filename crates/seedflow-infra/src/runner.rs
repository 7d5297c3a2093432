//! Child process supervision for the declarative tool

use crate::error::{InfraError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Variables taken from the daemon's own environment. Everything else the
/// child sees is injected explicitly.
const INHERITED_ENV: [&str; 2] = ["PATH", "HOME"];

/// One shell invocation
#[derive(Debug, Clone)]
pub struct ShellCommand {
    /// Component name used in log lines
    pub label: String,
    /// Full command line, run through `sh -c`
    pub line: String,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    /// Combined stdout/stderr is appended here
    pub log_file: PathBuf,
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code; negative when killed by a signal
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes shell commands on behalf of the lifecycle executor
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion. There is no internal timeout.
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput>;
}

/// Runs commands with `sh -c`, streaming output line by line
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput> {
        tracing::debug!(component = %command.label, "Running: {}", command.line);

        if let Some(parent) = command.log_file.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&command.log_file)
            .await?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("exec 2>&1; {}", command.line))
            .current_dir(&command.working_dir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for key in INHERITED_ENV {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        cmd.envs(&command.env);

        let mut child = cmd
            .spawn()
            .map_err(|e| InfraError::CommandFailed(format!("{}: {}", command.label, e)))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            InfraError::CommandFailed(format!("{}: stdout was not captured", command.label))
        })?;

        let captured = match stream_output(stdout, &mut log, &command.label).await {
            Ok(captured) => captured,
            Err(e) => {
                // reap the child before surfacing the error
                if let Err(kill_err) = child.kill().await {
                    tracing::warn!(component = %command.label, "Failed to stop command: {}", kill_err);
                }
                return Err(e);
            }
        };

        let status = child.wait().await?;
        let exit_code = exit_code(status);
        tracing::debug!(component = %command.label, exit_code, "Command finished");

        Ok(CommandOutput {
            exit_code,
            output: captured,
        })
    }
}

/// Mirrors output lines to tracing and the log file. Bytes that are not
/// valid UTF-8 are replaced, never rejected.
async fn stream_output(
    stdout: impl AsyncRead + Unpin,
    log: &mut File,
    label: &str,
) -> Result<String> {
    let mut reader = BufReader::new(stdout);
    let mut captured = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        tracing::info!(target: "seedflow::tool", component = %label, "{}", line);
        log.write_all(line.as_bytes()).await?;
        log.write_all(b"\n").await?;
        captured.push_str(line);
        captured.push('\n');
    }
    log.flush().await?;
    Ok(captured)
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
