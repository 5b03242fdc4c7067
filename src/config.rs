use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::work_item::Platform;

pub const DEFAULT_CLICKUP_API_URL: &str = "https://api.clickup.com/api/v2";
const DEFAULT_PORT: u16 = 8001;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub clickup: ClickUpConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub anthropic_api_key: Option<String>,
    #[serde(default = "default_claude_path")]
    pub claude_code_path: String,
    #[serde(default = "default_agents_dir")]
    pub agents_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            claude_code_path: default_claude_path(),
            agents_dir: default_agents_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GitHubConfig {
    pub pat: Option<String>,
    /// `owner/repo`; detected from the origin remote when unset.
    pub repo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickUpConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_clickup_api_url")]
    pub api_url: String,
    pub list_id: Option<String>,
    pub webhook_secret: Option<String>,
    pub test_task_id: Option<String>,
}

impl Default for ClickUpConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_clickup_api_url(),
            list_id: None,
            webhook_secret: None,
            test_task_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
        }
    }
}

fn default_claude_path() -> String {
    "claude".into()
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from("agents")
}

fn default_clickup_api_url() -> String {
    DEFAULT_CLICKUP_API_URL.into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".adw")
        .join("config.toml")
}

/// Load configuration: defaults, then `~/.adw/config.toml`, then `.env`, then
/// the process environment.
pub fn load_config() -> Result<AppConfig> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let mut config = load_file(&config_path())?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn load_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

impl AppConfig {
    /// Overlay environment variables. Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("ANTHROPIC_API_KEY") {
            self.agent.anthropic_api_key = Some(v);
        }
        if let Some(v) = var("CLAUDE_CODE_PATH") {
            self.agent.claude_code_path = v;
        }
        if let Some(v) = var("ADW_AGENTS_DIR") {
            self.agent.agents_dir = PathBuf::from(v);
        }
        if let Some(v) = var("GITHUB_PAT") {
            self.github.pat = Some(v);
        }
        if let Some(v) = var("GITHUB_REPO") {
            self.github.repo = Some(v);
        }
        if let Some(v) = var("CLICKUP_API_KEY") {
            self.clickup.api_key = Some(v);
        }
        if let Some(v) = var("CLICKUP_API_URL") {
            self.clickup.api_url = v;
        }
        if let Some(v) = var("CLICKUP_LIST_ID") {
            self.clickup.list_id = Some(v);
        }
        if let Some(v) = var("CLICKUP_WEBHOOK_SECRET") {
            self.clickup.webhook_secret = Some(v);
        }
        if let Some(v) = var("CLICKUP_TEST_TASK_ID") {
            self.clickup.test_task_id = Some(v);
        }
        if let Some(port) = var("PORT").and_then(|v| v.parse().ok()) {
            self.webhook.port = port;
        }
    }

    /// Variables a workflow run on `platform` cannot start without.
    pub fn require_run_vars(&self, platform: Platform) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.agent.anthropic_api_key.is_none() {
            missing.push("ANTHROPIC_API_KEY".to_string());
        }
        if platform == Platform::ClickUp && self.clickup.api_key.is_none() {
            missing.push("CLICKUP_API_KEY".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingVars(missing))
        }
    }

    /// Environment handed to `gh` and `claude` child processes.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if let Some(key) = &self.agent.anthropic_api_key {
            env.push(("ANTHROPIC_API_KEY".to_string(), key.clone()));
        }
        if let Some(pat) = &self.github.pat {
            env.push(("GH_TOKEN".to_string(), pat.clone()));
        }
        env
    }
}
