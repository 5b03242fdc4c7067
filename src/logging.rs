use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// `<agents_dir>/<adw_id>/adw_plan_build/execution.log`
pub fn execution_log_path(agents_dir: &Path, adw_id: &str) -> PathBuf {
    agents_dir
        .join(adw_id)
        .join("adw_plan_build")
        .join("execution.log")
}

/// Stdout only. Used by the webhook server and the health check.
pub fn init_stdout() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter())
        .init();
}

/// Stderr only, for commands whose stdout is machine-readable.
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter())
        .init();
}

/// Stdout plus a per-run execution log without ANSI colours.
pub fn init_for_run(agents_dir: &Path, adw_id: &str) -> Result<PathBuf> {
    let path = execution_log_path(agents_dir, adw_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .with(env_filter())
        .init();
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_log_lives_under_the_run_directory() {
        assert_eq!(
            execution_log_path(Path::new("agents"), "a1b2c3d4"),
            PathBuf::from("agents/a1b2c3d4/adw_plan_build/execution.log")
        );
    }
}
