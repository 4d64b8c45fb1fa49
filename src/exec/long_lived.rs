// src/exec/long_lived.rs

//! Background processes for long-lived services.
//!
//! A long-lived service counts as deployed once it is *ready*: its stdout
//! matched `ready_on_stdout`, or `ready_after` elapsed while it kept
//! running. The process keeps running afterwards until it is stopped.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::exec::command::CommandSpec;

/// Upper bound on how long a service may take to report readiness.
pub const READY_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default)]
pub struct ReadyCondition {
    pub stdout: Option<Regex>,
    pub after: Option<Duration>,
}

impl ReadyCondition {
    /// Build from the raw config strings.
    pub fn parse(stdout: Option<&str>, after: Option<&str>) -> Result<Self> {
        let stdout = stdout
            .map(|p| Regex::new(p).with_context(|| format!("invalid ready_on_stdout regex '{}'", p)))
            .transpose()?;
        let after = after
            .map(|d| parse_duration(d).map_err(|e| anyhow!("invalid ready_after '{}': {}", d, e)))
            .transpose()?;
        Ok(Self { stdout, after })
    }
}

/// A running service process. Dropping it kills the process.
#[derive(Debug)]
pub struct LongLivedProcess {
    label: String,
    child: Child,
}

impl LongLivedProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub async fn stop(mut self) {
        info!(label = %self.label, "stopping long-lived process");
        if let Err(e) = self.child.kill().await {
            warn!(label = %self.label, error = %e, "failed to kill long-lived process");
        }
    }
}

/// Spawn `spec` and wait until it is ready.
pub async fn spawn_long_lived(spec: &CommandSpec, ready: &ReadyCondition) -> Result<LongLivedProcess> {
    info!(label = %spec.label, cmd = %spec.command, "starting long-lived process");

    let mut child = spec
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning process for '{}'", spec.label))?;

    let ready_rx = monitor_output(spec, &mut child, ready.stdout.clone());

    let ready_signal = async {
        match (ready_rx, ready.after) {
            (Some(rx), _) => rx.await.is_ok(),
            (None, Some(after)) => {
                sleep(after).await;
                true
            }
            (None, None) => true,
        }
    };

    tokio::select! {
        matched = ready_signal => {
            if !matched {
                bail!("'{}' closed stdout before becoming ready", spec.label);
            }
        }
        status = child.wait() => {
            let status = status.with_context(|| format!("waiting for '{}'", spec.label))?;
            bail!("'{}' exited with code {} before becoming ready", spec.label, status.code().unwrap_or(-1));
        }
        _ = sleep(READY_TIMEOUT) => {
            bail!("'{}' did not become ready within {:?}", spec.label, READY_TIMEOUT);
        }
    }

    info!(label = %spec.label, pid = ?child.id(), "long-lived process is ready");
    Ok(LongLivedProcess {
        label: spec.label.clone(),
        child,
    })
}

/// Drain stdout/stderr into the logs. Returns a receiver that fires on the
/// first stdout line matching `pattern`.
fn monitor_output(spec: &CommandSpec, child: &mut Child, pattern: Option<Regex>) -> Option<oneshot::Receiver<()>> {
    if let Some(stderr) = child.stderr.take() {
        let label = spec.label.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(label = %label, "stderr: {}", line);
            }
        });
    }

    let stdout = child.stdout.take()?;
    let label = spec.label.clone();
    let (tx, rx) = oneshot::channel();
    let wants_signal = pattern.is_some();

    tokio::spawn(async move {
        let mut tx = Some(tx);
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(label = %label, "stdout: {}", line);
            if let Some(re) = &pattern {
                if re.is_match(&line) {
                    if let Some(tx) = tx.take() {
                        debug!(label = %label, "stdout matched ready_on_stdout");
                        let _ = tx.send(());
                    }
                }
            }
        }
    });

    wants_signal.then_some(rx)
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        unit => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
