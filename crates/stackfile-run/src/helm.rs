//! Chart executor driving the `helm` binary

use async_trait::async_trait;
use serde::Deserialize;
use stackfile_core::{Release, ReleaseStatus, ReleaseValues, Value};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use crate::error::ExecError;
use crate::executor::{ChartExecutor, ExecFlags};

/// Exit code of `helm diff --detailed-exitcode` when there is drift
const DIFF_CHANGED_EXIT_CODE: i32 = 2;

/// Runs `helm` (or a compatible binary) as a subprocess
#[derive(Debug, Clone)]
pub struct HelmExecutor {
    binary: String,
    context: String,
}

impl HelmExecutor {
    pub fn new(binary: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            context: context.into(),
        }
    }

    /// Arguments of `helm diff upgrade`
    pub fn diff_args(&self, release: &Release, flags: ExecFlags) -> Result<Vec<String>, ExecError> {
        let mut args = vec![
            "diff".to_string(),
            "upgrade".to_string(),
            "--detailed-exitcode".to_string(),
            "--allow-unreleased".to_string(),
            release.name().to_string(),
            release.chart.clone(),
        ];
        self.push_target(&mut args, release);
        if let Some(version) = &release.version {
            args.extend(["--version".to_string(), version.clone()]);
        }
        if flags.reset_values {
            args.push("--reset-values".to_string());
        }
        push_values(&mut args, release)?;
        Ok(args)
    }

    /// Arguments of `helm upgrade --install`
    pub fn apply_args(&self, release: &Release, flags: ExecFlags) -> Result<Vec<String>, ExecError> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            release.name().to_string(),
            release.chart.clone(),
        ];
        self.push_target(&mut args, release);
        if let Some(version) = &release.version {
            args.extend(["--version".to_string(), version.clone()]);
        }
        if release.create_namespace && !release.namespace().is_empty() {
            args.push("--create-namespace".to_string());
        }
        if release.wait {
            args.push("--wait".to_string());
        }
        if let Some(timeout) = release.timeout {
            args.extend(["--timeout".to_string(), format!("{}s", timeout.as_secs())]);
        }
        if flags.reset_values {
            args.push("--reset-values".to_string());
        }
        push_values(&mut args, release)?;
        args.extend(release.args.iter().cloned());
        Ok(args)
    }

    /// Arguments of `helm uninstall`
    pub fn delete_args(&self, release: &Release) -> Vec<String> {
        let mut args = vec!["uninstall".to_string(), release.name().to_string()];
        self.push_target(&mut args, release);
        args
    }

    /// Arguments of `helm status -o json`
    pub fn status_args(&self, release: &Release) -> Vec<String> {
        let mut args = vec!["status".to_string(), release.name().to_string()];
        self.push_target(&mut args, release);
        args.extend(["-o".to_string(), "json".to_string()]);
        args
    }

    fn push_target(&self, args: &mut Vec<String>, release: &Release) {
        if !release.namespace().is_empty() {
            args.extend(["--namespace".to_string(), release.namespace().to_string()]);
        }
        if !self.context.is_empty() {
            args.extend(["--kube-context".to_string(), self.context.clone()]);
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output, ExecError> {
        debug!(binary = %self.binary, args = ?args, "running executor");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                binary: self.binary.clone(),
                source,
            })
    }

    fn command_error(&self, args: &[String], output: &Output) -> ExecError {
        ExecError::Command {
            command: format!("{} {}", self.binary, args.join(" ")),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// `--values` for files, `--set-json` for inline values and `set` entries
fn push_values(args: &mut Vec<String>, release: &Release) -> Result<(), ExecError> {
    for values in &release.values {
        match values {
            ReleaseValues::File(path) => {
                args.extend(["--values".to_string(), path.display().to_string()]);
            }
            ReleaseValues::Inline(Value::Map(map)) => {
                for (key, value) in map {
                    args.extend(["--set-json".to_string(), set_json(key, value)?]);
                }
            }
            ReleaseValues::Inline(other) => {
                return Err(ExecError::Other(format!(
                    "inline values of release \"{}\" must be a mapping, found {}",
                    release.id,
                    other.type_name()
                )));
            }
        }
    }
    for set in &release.set {
        args.extend(["--set-json".to_string(), set_json(&set.name, &set.value)?]);
    }
    Ok(())
}

fn set_json(key: &str, value: &Value) -> Result<String, ExecError> {
    let json = serde_json::to_string(value).map_err(|e| ExecError::Other(e.to_string()))?;
    Ok(format!("{}={}", key, json))
}

#[derive(Debug, Deserialize)]
struct StatusOutput {
    info: StatusInfo,
}

#[derive(Debug, Deserialize)]
struct StatusInfo {
    status: String,
}

fn parse_status(status: &str) -> Option<ReleaseStatus> {
    match status {
        "deployed" | "superseded" => Some(ReleaseStatus::Deployed),
        "failed" => Some(ReleaseStatus::Failed),
        "uninstalled" | "uninstalling" | "unknown" => Some(ReleaseStatus::NotInstalled),
        s if s.starts_with("pending") => Some(ReleaseStatus::Pending),
        _ => None,
    }
}

#[async_trait]
impl ChartExecutor for HelmExecutor {
    async fn diff(&self, release: &Release, flags: ExecFlags) -> Result<bool, ExecError> {
        let args = self.diff_args(release, flags)?;
        let output = self.run(&args).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(DIFF_CHANGED_EXIT_CODE) => Ok(true),
            _ => Err(self.command_error(&args, &output)),
        }
    }

    async fn apply(&self, release: &Release, flags: ExecFlags) -> Result<(), ExecError> {
        let args = self.apply_args(release, flags)?;
        let output = self.run(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.command_error(&args, &output))
        }
    }

    async fn delete(&self, release: &Release) -> Result<(), ExecError> {
        let args = self.delete_args(release);
        let output = self.run(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.command_error(&args, &output))
        }
    }

    async fn status(&self, release: &Release) -> Result<ReleaseStatus, ExecError> {
        let args = self.status_args(release);
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not found") {
                return Ok(ReleaseStatus::NotInstalled);
            }
            return Err(self.command_error(&args, &output));
        }

        let command = format!("{} status", self.binary);
        let parsed: StatusOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| ExecError::Output {
                command: command.clone(),
                message: e.to_string(),
            })?;
        parse_status(&parsed.info.status).ok_or_else(|| ExecError::Output {
            command,
            message: format!("unknown release status \"{}\"", parsed.info.status),
        })
    }
}
