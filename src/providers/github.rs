use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::{PlatformAdapter, PlatformError};
use crate::model::work_item::{Platform, WorkItem};

const ISSUE_FIELDS: &str =
    "number,title,body,state,author,assignees,labels,milestone,comments,createdAt,updatedAt,closedAt,url";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Issue #{0} not found")]
    IssueNotFound(String),

    #[error("gh {command} failed: {message}")]
    Cli { command: String, message: String },

    #[error("Failed to parse gh output: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<GitHubError> for PlatformError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::IssueNotFound(id) => PlatformError::NotFound {
                platform: Platform::GitHub,
                id,
            },
            other => PlatformError::upstream(Platform::GitHub, other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhUser {
    pub login: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhLabel {
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhMilestone {
    pub number: Option<u64>,
    pub title: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhComment {
    pub author: Option<GhUser>,
    pub body: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: String,
    pub author: Option<GhUser>,
    #[serde(default)]
    pub assignees: Vec<GhUser>,
    #[serde(default)]
    pub labels: Vec<GhLabel>,
    pub milestone: Option<GhMilestone>,
    #[serde(default)]
    pub comments: Vec<GhComment>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
    pub url: Option<String>,
}

/// Accept `42` or `#42`.
pub fn normalize_issue_number(item_id: &str) -> &str {
    item_id.trim().trim_start_matches('#')
}

/// Turn a status name into the label used to represent it, e.g.
/// `in progress` -> `in_progress`.
pub fn status_label(status: &str) -> String {
    let mut label = String::new();
    for c in status.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c);
        } else if !label.ends_with('_') && !label.is_empty() {
            label.push('_');
        }
    }
    label.trim_end_matches('_').to_string()
}

/// Only GraphQL's missing-issue wording counts. A bare `HTTP 404` from the REST
/// API means the repo itself is missing or inaccessible.
fn is_not_found(stderr: &str) -> bool {
    stderr
        .to_lowercase()
        .contains("could not resolve to an issue")
}

/// Convert `gh issue view --json` output into a work item, keeping the raw payload.
pub fn issue_to_work_item(raw: serde_json::Value) -> Result<WorkItem, GitHubError> {
    let issue: GitHubIssue = serde_json::from_value(raw.clone())?;
    Ok(WorkItem {
        id: issue.number.to_string(),
        title: issue.title,
        description: issue.body,
        status: issue.state,
        platform: Platform::GitHub,
        raw_data: raw,
    })
}

/// Issues on one repository, driven through the `gh` CLI.
pub struct GitHubAdapter {
    repo_path: String,
    token: Option<String>,
}

impl GitHubAdapter {
    pub fn new(repo_path: String, token: Option<String>) -> Self {
        Self { repo_path, token }
    }

    async fn gh(&self, args: &[&str]) -> Result<Vec<u8>, GitHubError> {
        let command = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
        let mut cmd = tokio::process::Command::new("gh");
        cmd.args(args);
        if let Some(token) = &self.token {
            cmd.env("GH_TOKEN", token);
        }

        let output = cmd.output().await.map_err(|e| GitHubError::Cli {
            command: command.clone(),
            message: format!("Failed to run gh CLI: {e}"),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitHubError::Cli {
                command,
                message: stderr,
            });
        }
        Ok(output.stdout)
    }

    pub async fn fetch_issue(&self, number: &str) -> Result<WorkItem, GitHubError> {
        let stdout = self
            .gh(&[
                "issue",
                "view",
                number,
                "-R",
                &self.repo_path,
                "--json",
                ISSUE_FIELDS,
            ])
            .await
            .map_err(|e| match e {
                GitHubError::Cli { ref message, .. } if is_not_found(message) => {
                    GitHubError::IssueNotFound(number.to_string())
                }
                other => other,
            })?;

        let raw: serde_json::Value = serde_json::from_slice(&stdout)?;
        issue_to_work_item(raw)
    }

    pub async fn comment(&self, number: &str, body: &str) -> Result<(), GitHubError> {
        self.gh(&[
            "issue",
            "comment",
            number,
            "-R",
            &self.repo_path,
            "--body",
            body,
        ])
        .await?;
        info!(issue = number, "Posted comment to GitHub issue");
        Ok(())
    }

    pub async fn set_status_label(&self, number: &str, status: &str) -> Result<(), GitHubError> {
        let label = status_label(status);
        let mut args: Vec<&str> = vec![
            "issue",
            "edit",
            number,
            "-R",
            &self.repo_path,
            "--add-label",
            &label,
        ];
        if label == "in_progress" {
            args.extend(["--add-assignee", "@me"]);
        }
        self.gh(&args).await?;
        info!(issue = number, label = %label, "Updated GitHub issue status label");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for GitHubAdapter {
    fn platform_name(&self) -> &str {
        "github"
    }

    async fn get_work_item(&self, item_id: &str) -> Result<WorkItem, PlatformError> {
        Ok(self.fetch_issue(normalize_issue_number(item_id)).await?)
    }

    async fn add_comment(&self, item_id: &str, text: &str) -> Result<(), PlatformError> {
        Ok(self.comment(normalize_issue_number(item_id), text).await?)
    }

    async fn update_status(&self, item_id: &str, status: &str) -> Result<(), PlatformError> {
        Ok(self
            .set_status_label(normalize_issue_number(item_id), status)
            .await?)
    }

    async fn set_custom_field(
        &self,
        item_id: &str,
        field_name: &str,
        _value: &str,
    ) -> Result<(), PlatformError> {
        // Issues have no custom fields.
        debug!(issue = item_id, field = field_name, "Skipping custom field on GitHub");
        Ok(())
    }
}
