// src/exec/command.rs

//! One-shot shell commands.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// A shell command line plus where and with what environment to run it.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Used in logs and error messages (e.g. `build.api`).
    pub label: String,
    pub command: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(label: impl Into<String>, command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Build a platform shell invocation for this spec.
    pub fn to_command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };
        cmd.current_dir(&self.cwd).envs(&self.env);
        cmd
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `spec` to completion and capture its output, whatever the exit code.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    info!(label = %spec.label, cmd = %spec.command, cwd = ?spec.cwd, "running command");

    let output = spec
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("spawning process for '{}'", spec.label))?;

    let result = CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!(label = %spec.label, exit_code = result.code, "command exited");
    Ok(result)
}

/// Like [`run_command`], but a non-zero exit is an error carrying stderr.
pub async fn run_checked(spec: &CommandSpec) -> Result<CommandOutput> {
    let output = run_command(spec).await?;
    if !output.success() {
        bail!(
            "'{}' exited with code {}: {}",
            spec.label,
            output.code,
            output.stderr.trim()
        );
    }
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());
        let spec = CommandSpec::new("echo", "echo $GREETING", dir.path()).with_env(&env);

        let output = run_checked(&spec).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("fail", "echo broken >&2; exit 3", dir.path());

        let err = run_checked(&spec).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("code 3"), "{msg}");
        assert!(msg.contains("broken"), "{msg}");
    }
}
