use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, error};

use super::AgentRunner;
use crate::config::AppConfig;
use crate::model::agent::{AgentPromptResponse, AgentTemplateRequest, ModelTier};

/// Final line of a `--output-format stream-json` transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub num_turns: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

/// Find the last `"type": "result"` message in a JSONL transcript.
pub fn parse_result_message(jsonl: &str) -> Option<ResultMessage> {
    jsonl
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|msg| msg.get("type").and_then(|t| t.as_str()) == Some("result"))
        .and_then(|msg| serde_json::from_value(msg).ok())
}

/// Runs the `claude` CLI in print mode, one process per request.
pub struct ClaudeCli {
    claude_path: String,
    agents_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl ClaudeCli {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            claude_path: config.agent.claude_code_path.clone(),
            agents_dir: config.agent.agents_dir.clone(),
            env: config.child_env(),
        }
    }

    /// `<agents_dir>/<adw_id>/<agent_name>/raw_output.jsonl`
    pub fn output_file(&self, adw_id: &str, agent_name: &str) -> PathBuf {
        self.agents_dir
            .join(adw_id)
            .join(agent_name)
            .join("raw_output.jsonl")
    }

    async fn run(
        &self,
        prompt: &str,
        model: ModelTier,
        output_file: &Path,
    ) -> Result<AgentPromptResponse> {
        if let Some(parent) = output_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let log_file = tokio::fs::File::create(output_file)
            .await
            .with_context(|| format!("Failed to create {}", output_file.display()))?
            .into_std()
            .await;

        let child = tokio::process::Command::new(&self.claude_path)
            .args([
                "-p",
                prompt,
                "--model",
                model.as_str(),
                "--output-format",
                "stream-json",
                "--verbose",
                "--dangerously-skip-permissions",
            ])
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.claude_path))?;

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(AgentPromptResponse::failed(format!(
                "Claude Code error ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let transcript = tokio::fs::read_to_string(output_file).await?;
        let Some(result) = parse_result_message(&transcript) else {
            return Ok(AgentPromptResponse::failed(
                "No result message found in Claude Code output",
            ));
        };

        debug!(
            subtype = result.subtype.as_deref().unwrap_or_default(),
            turns = ?result.num_turns,
            cost_usd = ?result.total_cost_usd,
            "Claude Code finished"
        );
        Ok(AgentPromptResponse {
            output: result.result.unwrap_or_default(),
            success: !result.is_error,
            session_id: result.session_id,
        })
    }

    /// Run a raw prompt; used by the health check smoke test.
    pub async fn prompt(
        &self,
        prompt: &str,
        model: ModelTier,
        output_file: &Path,
    ) -> AgentPromptResponse {
        match self.run(prompt, model, output_file).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Claude Code invocation failed");
                AgentPromptResponse::failed(format!("Error executing Claude Code: {e:#}"))
            }
        }
    }
}

#[async_trait]
impl AgentRunner for ClaudeCli {
    async fn execute_template(&self, request: &AgentTemplateRequest) -> AgentPromptResponse {
        let prompt = request.prompt();
        let output_file = self.output_file(&request.adw_id, &request.agent_name);
        debug!(
            agent = %request.agent_name,
            command = %request.slash_command,
            output = %output_file.display(),
            "Invoking agent"
        );
        self.prompt(&prompt, request.model, &output_file).await
    }
}
