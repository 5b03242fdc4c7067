use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::health::HealthReport;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Health check timed out")]
    TimedOut,

    #[error("Health check failed: {0}")]
    Failed(String),
}

/// Outcome of one out-of-process health check.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    pub healthy: bool,
    pub report: Option<HealthReport>,
}

/// Starts work outside the request that triggered it.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start a workflow run for `task_id` and return without waiting for it.
    fn launch_workflow(&self, task_id: &str, adw_id: &str) -> Result<()>;

    async fn probe_health(&self) -> Result<HealthProbe, ProbeError>;
}

/// Re-invokes this executable as a detached child process.
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn current() -> Result<Self> {
        let program = std::env::current_exe().context("Cannot locate the adw executable")?;
        Ok(Self { program })
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    fn launch_workflow(&self, task_id: &str, adw_id: &str) -> Result<()> {
        let args = [
            "run",
            "--platform",
            "clickup",
            "--task-id",
            task_id,
            "--adw-id",
            adw_id,
        ];
        info!(command = %format!("{} {}", self.program.display(), args.join(" ")), "Launching background process");

        // The child is never awaited; tokio reaps it once it exits.
        let child = tokio::process::Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;
        debug!(pid = ?child.id(), "Workflow process started");
        Ok(())
    }

    async fn probe_health(&self) -> Result<HealthProbe, ProbeError> {
        let run = tokio::process::Command::new(&self.program)
            .args(["health", "--platform", "clickup", "--json"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(HEALTH_TIMEOUT, run)
            .await
            .map_err(|_| ProbeError::TimedOut)?
            .map_err(|e| ProbeError::Failed(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(output = %stdout, "Health check output");
        Ok(HealthProbe {
            healthy: output.status.success(),
            report: serde_json::from_str(&stdout).ok(),
        })
    }
}
