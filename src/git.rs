use anyhow::{Context, Result};

pub async fn run_git(args: &[&str]) -> Result<String> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// URL of the `origin` remote.
pub async fn repo_url() -> Result<String> {
    run_git(&["remote", "get-url", "origin"])
        .await
        .context("No git remote 'origin' found. Please ensure you're in a git repository with a remote.")
}

/// Reduce a GitHub remote URL to `owner/repo`.
pub fn extract_repo_path(url: &str) -> Result<String> {
    let url = url.trim();
    let path = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("git@github.com:"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .with_context(|| format!("Not a GitHub remote: {url}"))?;
    let path = path.trim_end_matches('/').trim_end_matches(".git");

    if path.split('/').filter(|s| !s.is_empty()).count() != 2 {
        anyhow::bail!("Cannot extract owner/repo from remote: {url}");
    }
    Ok(path.to_string())
}
