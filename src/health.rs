//! System diagnostics: configuration, tooling and API reachability.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use crate::agents::claude::ClaudeCli;
use crate::config::AppConfig;
use crate::model::agent::{make_adw_id, ModelTier};
use crate::providers::clickup::ClickUpClient;

const SMOKE_PROMPT: &str = "What is 2+2? Just respond with the number, nothing else.";
const SMOKE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HealthScope {
    #[value(name = "github")]
    GitHub,
    #[value(name = "clickup")]
    ClickUp,
    #[default]
    Both,
}

impl HealthScope {
    fn github(&self) -> bool {
        matches!(self, HealthScope::GitHub | HealthScope::Both)
    }

    fn clickup(&self) -> bool {
        matches!(self, HealthScope::ClickUp | HealthScope::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthScope::GitHub => "github",
            HealthScope::ClickUp => "clickup",
            HealthScope::Both => "both",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            HealthScope::GitHub => "GITHUB",
            HealthScope::ClickUp => "CLICKUP",
            HealthScope::Both => "BOTH PLATFORMS",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl CheckResult {
    fn pass(details: serde_json::Value) -> Self {
        Self {
            success: true,
            details,
            ..Default::default()
        }
    }

    fn fail(error: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            details,
            ..Default::default()
        }
    }

    fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub success: bool,
    pub timestamp: String,
    pub checks: BTreeMap<String, CheckResult>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl HealthReport {
    fn new() -> Self {
        Self {
            success: true,
            timestamp: chrono::Local::now().to_rfc3339(),
            checks: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Fold a check into the overall verdict.
    fn record(&mut self, name: &str, check: CheckResult) {
        if !check.success {
            self.success = false;
            if let Some(error) = &check.error {
                self.errors.push(error.clone());
            }
        } else if let Some(warning) = &check.warning {
            self.warnings.push(warning.clone());
        }
        self.checks.insert(name.to_string(), check);
    }
}

pub fn check_environment(config: &AppConfig, scope: HealthScope) -> CheckResult {
    let mut required = Vec::new();
    let mut optional = Vec::new();

    if config.agent.anthropic_api_key.is_none() {
        required.push("ANTHROPIC_API_KEY");
    }
    if scope.clickup() {
        if config.clickup.api_key.is_none() {
            required.push("CLICKUP_API_KEY");
        }
        if config.clickup.webhook_secret.is_none() {
            required.push("CLICKUP_WEBHOOK_SECRET");
        }
        if config.clickup.list_id.is_none() {
            optional.push("CLICKUP_LIST_ID");
        }
        if config.clickup.test_task_id.is_none() {
            optional.push("CLICKUP_TEST_TASK_ID");
        }
    }
    if scope.github() && config.github.pat.is_none() {
        optional.push("GITHUB_PAT");
    }

    let ok = required.is_empty();
    let details = json!({
        "missing_required": required,
        "missing_optional": optional,
        "claude_code_path": config.agent.claude_code_path,
        "platform": scope.as_str(),
    });
    if ok {
        CheckResult::pass(details)
    } else {
        CheckResult::fail("Missing required environment variables", details)
    }
}

pub async fn check_git_repository() -> CheckResult {
    let url = match crate::git::repo_url().await {
        Ok(url) => url,
        Err(e) => return CheckResult::fail(format!("{e:#}"), json!({})),
    };
    match crate::git::extract_repo_path(&url) {
        Ok(path) => CheckResult::pass(json!({ "repo_url": url, "repo_path": path })),
        Err(e) => CheckResult::fail(format!("{e:#}"), json!({ "repo_url": url })),
    }
}

pub async fn check_github_cli(config: &AppConfig) -> CheckResult {
    let installed = tokio::process::Command::new("gh")
        .arg("--version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !installed {
        return CheckResult::fail(
            "GitHub CLI (gh) is not installed",
            json!({ "installed": false }),
        );
    }

    let mut auth = tokio::process::Command::new("gh");
    auth.args(["auth", "status"]);
    if let Some(pat) = &config.github.pat {
        auth.env("GH_TOKEN", pat);
    }
    let authenticated = auth
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false);

    let details = json!({ "installed": true, "authenticated": authenticated });
    if authenticated {
        CheckResult::pass(details)
    } else {
        CheckResult::fail("GitHub CLI not authenticated", details)
    }
}

pub async fn check_clickup_api(config: &AppConfig) -> CheckResult {
    let Some(api_key) = config.clickup.api_key.clone() else {
        return CheckResult::fail(
            "CLICKUP_API_KEY not set in environment",
            json!({ "api_key_configured": false }),
        );
    };
    if config.clickup.webhook_secret.is_none() {
        return CheckResult::fail(
            "CLICKUP_WEBHOOK_SECRET not set in environment",
            json!({ "api_key_configured": true, "webhook_secret_configured": false }),
        );
    }
    let Some(task_id) = &config.clickup.test_task_id else {
        return CheckResult::pass(json!({
            "api_key_configured": true,
            "webhook_secret_configured": true,
            "api_connection": "not_tested",
        }))
        .with_warning("CLICKUP_TEST_TASK_ID not set - API connectivity not tested");
    };

    let client = ClickUpClient::new(api_key, config.clickup.api_url.clone());
    match client.get_task(task_id).await {
        Ok((task, _)) => CheckResult::pass(json!({
            "api_key_configured": true,
            "webhook_secret_configured": true,
            "api_connection": "success",
            "test_task": {
                "id": task.id,
                "name": task.name,
                "status": task.status.status,
            },
        })),
        Err(e) => CheckResult::fail(
            e.to_string(),
            json!({
                "api_key_configured": true,
                "webhook_secret_configured": true,
                "api_connection": "failed",
            }),
        ),
    }
}

pub async fn check_claude_code(config: &AppConfig) -> CheckResult {
    let path = &config.agent.claude_code_path;
    match tokio::process::Command::new(path).arg("--version").output().await {
        Ok(output) if output.status.success() => {}
        Ok(_) => {
            return CheckResult::fail(
                format!("Claude Code CLI not functional at '{path}'"),
                json!({}),
            )
        }
        Err(_) => {
            return CheckResult::fail(
                format!(
                    "Claude Code CLI not found at '{path}'. Please install or set CLAUDE_CODE_PATH correctly."
                ),
                json!({}),
            )
        }
    }

    let output_file = std::env::temp_dir().join(format!("adw-health-{}.jsonl", make_adw_id()));
    let cli = ClaudeCli::new(config);
    let outcome = tokio::time::timeout(
        SMOKE_TIMEOUT,
        cli.prompt(SMOKE_PROMPT, ModelTier::Sonnet, &output_file),
    )
    .await;
    if let Err(e) = tokio::fs::remove_file(&output_file).await {
        warn!(error = %e, file = %output_file.display(), "Could not remove smoke test output");
    }

    let Ok(response) = outcome else {
        return CheckResult::fail("Claude Code test timed out after 30 seconds", json!({}));
    };
    if !response.success {
        return CheckResult::fail(
            format!("Claude Code test failed: {}", response.output),
            json!({}),
        );
    }

    let reply: String = response.output.chars().take(100).collect();
    let details = json!({ "test_passed": reply.contains('4'), "response": reply });
    if reply.contains('4') {
        CheckResult::pass(details)
    } else {
        CheckResult::fail("Claude Code gave an unexpected answer", details)
    }
}

pub async fn run_health_check(config: &AppConfig, scope: HealthScope) -> HealthReport {
    let mut report = HealthReport::new();

    let env = check_environment(config, scope);
    let missing: Vec<String> = env.details["missing_required"]
        .as_array()
        .map(|vars| {
            vars.iter()
                .filter_map(|v| v.as_str())
                .map(|v| format!("Missing required env var: {v}"))
                .collect()
        })
        .unwrap_or_default();
    report.record("environment", env);
    report.errors.extend(missing);

    if scope.github() {
        report.record("git_repository", check_git_repository().await);
        report.record("github_cli", check_github_cli(config).await);
    }
    if scope.clickup() {
        report.record("clickup_api", check_clickup_api(config).await);
    }

    if config.agent.anthropic_api_key.is_some() {
        report.record("claude_code", check_claude_code(config).await);
    } else {
        // Counted as failing, but the environment check already names the cause.
        report.success = false;
        report.checks.insert(
            "claude_code".into(),
            CheckResult {
                success: false,
                details: json!({ "skipped": true, "reason": "ANTHROPIC_API_KEY not set" }),
                ..Default::default()
            },
        );
    }

    report
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

pub fn verdict(report: &HealthReport) -> &'static str {
    if report.success {
        "HEALTHY"
    } else {
        "UNHEALTHY"
    }
}

pub fn print_report(report: &HealthReport, scope: HealthScope) {
    println!("🏥 Running ADW System Health Check ({})...\n", scope.label());
    println!("{} Overall Status: {}", mark(report.success), verdict(report));
    println!("📅 Timestamp: {}\n", report.timestamp);
    println!("📋 Check Results:");
    println!("{}", "-".repeat(50));

    for (name, check) in &report.checks {
        println!("\n{} {}:", mark(check.success), title_case(name));
        if let Some(details) = check.details.as_object() {
            for (key, value) in details {
                if value.is_null() || key.starts_with("missing_") {
                    continue;
                }
                match value.as_str() {
                    Some(s) => println!("   {key}: {s}"),
                    None => println!("   {key}: {value}"),
                }
            }
        }
        if let Some(error) = &check.error {
            println!("   ❌ Error: {error}");
        }
        if let Some(warning) = &check.warning {
            println!("   ⚠️  Warning: {warning}");
        }
    }

    if !report.warnings.is_empty() {
        println!("\n⚠️  Warnings:");
        for warning in &report.warnings {
            println!("   - {warning}");
        }
    }
    if !report.errors.is_empty() {
        println!("\n❌ Errors:");
        for error in &report.errors {
            println!("   - {error}");
        }
    }

    if !report.success {
        println!("\n📝 Next Steps:");
        for step in next_steps(report) {
            println!("   - {step}");
        }
    }
}

fn next_steps(report: &HealthReport) -> Vec<&'static str> {
    let errors = |needle: &str| report.errors.iter().any(|e| e.contains(needle));
    let mut steps = Vec::new();
    if errors("ANTHROPIC_API_KEY") {
        steps.push("Set ANTHROPIC_API_KEY in your .env file");
    }
    if errors("CLICKUP_API_KEY") {
        steps.push("Set CLICKUP_API_KEY in your .env file");
    }
    if errors("CLICKUP_WEBHOOK_SECRET") {
        steps.push("Set CLICKUP_WEBHOOK_SECRET in your .env file");
    }
    if errors("GitHub CLI") {
        steps.push("Install the GitHub CLI and run: gh auth login");
    }
    if report
        .warnings
        .iter()
        .any(|w| w.contains("CLICKUP_TEST_TASK_ID"))
    {
        steps.push("(Optional) Set CLICKUP_TEST_TASK_ID to test API connectivity");
    }
    steps
}

pub fn print_json(report: &HealthReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clickup_config(url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.clickup.api_key = Some("pk_test".into());
        config.clickup.webhook_secret = Some("s3cret".into());
        config.clickup.api_url = url.to_string();
        config
    }

    #[test]
    fn environment_lists_missing_vars_per_scope() {
        let config = AppConfig::default();

        let github = check_environment(&config, HealthScope::GitHub);
        assert!(!github.success);
        assert_eq!(github.details["missing_required"], json!(["ANTHROPIC_API_KEY"]));

        let clickup = check_environment(&config, HealthScope::ClickUp);
        assert_eq!(
            clickup.details["missing_required"],
            json!(["ANTHROPIC_API_KEY", "CLICKUP_API_KEY", "CLICKUP_WEBHOOK_SECRET"])
        );
        assert_eq!(clickup.details["platform"], "clickup");
    }

    #[test]
    fn environment_passes_with_required_vars() {
        let mut config = clickup_config("http://localhost");
        config.agent.anthropic_api_key = Some("sk".into());
        let check = check_environment(&config, HealthScope::Both);
        assert!(check.success);
        assert!(check.error.is_none());
    }

    #[test]
    fn report_collects_errors_and_warnings() {
        let mut report = HealthReport::new();
        report.record("a", CheckResult::pass(json!({})).with_warning("heads up"));
        assert!(report.success);
        report.record("b", CheckResult::fail("broken", json!({})));

        assert!(!report.success);
        assert_eq!(report.warnings, vec!["heads up"]);
        assert_eq!(report.errors, vec!["broken"]);
        assert_eq!(report.checks.len(), 2);
    }

    #[test]
    fn failing_check_warning_is_not_promoted() {
        let mut report = HealthReport::new();
        report.record(
            "x",
            CheckResult::fail("down", json!({})).with_warning("ignored"),
        );
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn clickup_without_test_task_warns() {
        let check = check_clickup_api(&clickup_config("http://localhost")).await;
        assert!(check.success);
        assert_eq!(check.details["api_connection"], "not_tested");
        assert!(check.warning.unwrap().contains("CLICKUP_TEST_TASK_ID"));
    }

    #[tokio::test]
    async fn clickup_without_secret_fails() {
        let mut config = clickup_config("http://localhost");
        config.clickup.webhook_secret = None;
        let check = check_clickup_api(&config).await;
        assert!(!check.success);
        assert_eq!(
            check.error.as_deref(),
            Some("CLICKUP_WEBHOOK_SECRET not set in environment")
        );
    }

    #[tokio::test]
    async fn clickup_fetches_test_task() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/task/t-1")
            .match_header("authorization", "pk_test")
            .with_status(200)
            .with_body(
                json!({
                    "id": "t-1",
                    "name": "Health probe",
                    "status": { "status": "to do" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = clickup_config(&server.url());
        config.clickup.test_task_id = Some("t-1".into());
        let check = check_clickup_api(&config).await;

        mock.assert_async().await;
        assert!(check.success);
        assert_eq!(check.details["test_task"]["name"], "Health probe");
    }

    #[tokio::test]
    async fn clickup_api_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/task/t-1")
            .with_status(401)
            .with_body(r#"{"err":"Token invalid"}"#)
            .create_async()
            .await;

        let mut config = clickup_config(&server.url());
        config.clickup.test_task_id = Some("t-1".into());
        let check = check_clickup_api(&config).await;

        assert!(!check.success);
        assert_eq!(check.details["api_connection"], "failed");
        assert!(check.error.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn missing_api_key_skips_claude_and_fails() {
        let mut config = clickup_config("http://localhost");
        config.clickup.webhook_secret = Some("s".into());
        let report = run_health_check(&config, HealthScope::ClickUp).await;

        assert!(!report.success);
        let claude = &report.checks["claude_code"];
        assert!(!claude.success);
        assert_eq!(claude.details["skipped"], true);
        assert!(report
            .errors
            .contains(&"Missing required env var: ANTHROPIC_API_KEY".to_string()));
        assert!(!report.checks.contains_key("github_cli"));
    }

    #[test]
    fn check_names_are_title_cased() {
        assert_eq!(title_case("git_repository"), "Git Repository");
        assert_eq!(title_case("clickup_api"), "Clickup Api");
    }

    #[test]
    fn report_serializes_for_the_webhook() {
        let mut report = HealthReport::new();
        report.record("environment", CheckResult::pass(json!({ "platform": "clickup" })));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["success"], true);
        assert!(value["checks"]["environment"].get("error").is_none());

        let back: HealthReport = serde_json::from_value(value).unwrap();
        assert!(back.success);
    }
}
