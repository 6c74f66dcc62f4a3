//! Running `az` (and helper programs) and normalizing what they print.
//!
//! Output classification:
//!   exit 0 + stdout parses as JSON  -> structured_data + raw_output
//!   exit 0 + free text / empty      -> raw_output (+ diagnostic stderr)
//!   non-zero exit / spawn failure   -> succeeded = false + error_message
//!
//! Only a missing executable (`LocateError`) escapes as an `Err`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, trace};

use super::locator::{LocateError, Locator};

/// Default capture bound per stream (10 MiB).
pub const DEFAULT_MAX_OUTPUT: usize = 10 * 1024 * 1024;

/// Normalized outcome of one command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub structured_data: Option<Value>,
    pub raw_output: Option<String>,
    pub error_message: Option<String>,
    pub diagnostic_text: Option<String>,
}

impl ExecutionResult {
    fn failed(message: String, stderr: Option<String>) -> Self {
        Self {
            succeeded: false,
            structured_data: None,
            raw_output: None,
            error_message: Some(message),
            diagnostic_text: stderr,
        }
    }

    /// Classify the captured output of a process that exited with status 0.
    pub fn from_output(stdout: String, stderr: Option<String>) -> Self {
        if !stdout.trim().is_empty()
            && let Ok(data) = serde_json::from_str::<Value>(&stdout)
        {
            return Self {
                succeeded: true,
                structured_data: Some(data),
                raw_output: Some(stdout),
                error_message: None,
                diagnostic_text: None,
            };
        }
        Self {
            succeeded: true,
            structured_data: None,
            raw_output: Some(stdout),
            error_message: None,
            diagnostic_text: stderr,
        }
    }

    /// Turn a failed result into an error carrying the diagnostic text.
    pub fn into_success(self) -> Result<Self, CommandFailed> {
        if self.succeeded {
            return Ok(self);
        }
        Err(CommandFailed {
            message: self
                .error_message
                .unwrap_or_else(|| "command failed".to_string()),
            diagnostic: self.diagnostic_text.map(Diagnostic),
        })
    }

    /// Successful result that carries structured data, else an error.
    pub fn into_data(self) -> Result<Value, CommandFailed> {
        let ok = self.into_success()?;
        ok.structured_data.ok_or_else(|| CommandFailed {
            message: "command output was not JSON".to_string(),
            diagnostic: ok.raw_output.filter(|s| !s.trim().is_empty()).map(Diagnostic),
        })
    }

    /// Raw stdout, empty when absent.
    pub fn output(&self) -> &str {
        self.raw_output.as_deref().unwrap_or("")
    }
}

/// A command ran but did not succeed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CommandFailed {
    pub message: String,
    #[source]
    pub diagnostic: Option<Diagnostic>,
}

/// Captured stderr, exposed as the error source so cause chains include it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .0.trim_end())]
pub struct Diagnostic(pub String);

/// How a program should be run by [`run_program`].
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, OsString)>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for a in &self.args {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

/// Spawn `inv`, wait for it, and classify the result. Never returns an error:
/// spawn failures and overflow of the `max_output` bound become failed results.
pub async fn run_program(inv: &Invocation, max_output: usize) -> ExecutionResult {
    debug!(command = %inv, "running");
    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &inv.cwd {
        cmd.current_dir(dir);
    }
    for (k, v) in &inv.env {
        cmd.env(k, v);
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return ExecutionResult::failed(format!("Failed to start `{inv}`: {e}"), None);
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return ExecutionResult::failed(format!("Failed to capture output of `{inv}`"), None);
    };

    let captured = tokio::try_join!(
        read_bounded(stdout, max_output),
        read_bounded(stderr, max_output)
    );
    let (out, err) = match captured {
        Ok(pair) => pair,
        Err(e) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return ExecutionResult::failed(format!("Command failed: `{inv}`: {e}"), None);
        }
    };

    let status = match child.wait().await {
        Ok(s) => s,
        Err(e) => {
            return ExecutionResult::failed(format!("Failed to wait for `{inv}`: {e}"), None);
        }
    };
    debug!(command = %inv, %status, "finished");

    let stdout = String::from_utf8_lossy(&out).into_owned();
    let stderr = Some(String::from_utf8_lossy(&err).into_owned()).filter(|s| !s.is_empty());
    trace!(stdout_len = stdout.len(), stderr_len = err.len(), "captured");

    if status.success() {
        ExecutionResult::from_output(stdout, stderr)
    } else {
        ExecutionResult::failed(failure_message(inv, status), stderr)
    }
}

fn failure_message(inv: &Invocation, status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("Command failed: `{inv}` exited with code {code}"),
        None => format!("Command failed: `{inv}` was terminated ({status})"),
    }
}

async fn read_bounded<R>(mut reader: R, max: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut reader).take(max as u64 + 1).read_to_end(&mut buf).await?;
    if buf.len() > max {
        return Err(std::io::Error::other(format!(
            "output exceeded the {max} byte capture limit"
        )));
    }
    Ok(buf)
}

/// The Azure CLI: a locator plus the capture bound.
#[derive(Debug)]
pub struct AzureCli {
    locator: Locator,
    max_output: usize,
}

impl AzureCli {
    pub fn new(locator: Locator, max_output: usize) -> Self {
        Self {
            locator,
            max_output,
        }
    }

    pub fn max_output(&self) -> usize {
        self.max_output
    }

    /// Resolved `az` path (memoized by the locator).
    pub async fn path(&self) -> Result<&Path, LocateError> {
        self.locator.locate().await
    }

    /// Run `az <args...>`.
    pub async fn execute<I, S>(&self, args: I) -> Result<ExecutionResult, LocateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let az = self.path().await?;
        let inv = Invocation::new(az, args);
        Ok(run_program(&inv, self.max_output).await)
    }

    /// Run `az <line>`, splitting `line` with shell quoting rules.
    pub async fn execute_line(&self, line: &str) -> anyhow::Result<ExecutionResult> {
        let args = shell_words::split(line)
            .map_err(|e| anyhow::anyhow!("Failed to parse command '{line}': {e}"))?;
        Ok(self.execute(args).await?)
    }
}

#[cfg(all(test, unix))]
pub(crate) mod testing {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `/bin/sh` script named `name` into `dir`.
    pub fn fake_program(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
