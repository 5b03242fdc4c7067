use serde::{Deserialize, Serialize};
use std::fmt;

/// Every slash command the workflow sends to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlashCommand {
    #[serde(rename = "/chore")]
    Chore,
    #[serde(rename = "/bug")]
    Bug,
    #[serde(rename = "/feature")]
    Feature,
    #[serde(rename = "/classify_issue")]
    ClassifyIssue,
    #[serde(rename = "/find_plan_file")]
    FindPlanFile,
    #[serde(rename = "/generate_branch_name")]
    GenerateBranchName,
    #[serde(rename = "/commit")]
    Commit,
    #[serde(rename = "/pull_request")]
    PullRequest,
    #[serde(rename = "/implement")]
    Implement,
}

impl SlashCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlashCommand::Chore => "/chore",
            SlashCommand::Bug => "/bug",
            SlashCommand::Feature => "/feature",
            SlashCommand::ClassifyIssue => "/classify_issue",
            SlashCommand::FindPlanFile => "/find_plan_file",
            SlashCommand::GenerateBranchName => "/generate_branch_name",
            SlashCommand::Commit => "/commit",
            SlashCommand::PullRequest => "/pull_request",
            SlashCommand::Implement => "/implement",
        }
    }
}

impl fmt::Display for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The categories a work item can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueClass {
    Chore,
    Bug,
    Feature,
}

impl IssueClass {
    /// Parse the classifier's answer. Only the exact command strings are accepted.
    pub fn from_command(s: &str) -> Option<Self> {
        match s {
            "/chore" => Some(IssueClass::Chore),
            "/bug" => Some(IssueClass::Bug),
            "/feature" => Some(IssueClass::Feature),
            _ => None,
        }
    }

    pub fn command(&self) -> SlashCommand {
        match self {
            IssueClass::Chore => SlashCommand::Chore,
            IssueClass::Bug => SlashCommand::Bug,
            IssueClass::Feature => SlashCommand::Feature,
        }
    }

    /// Bare name without the leading slash, used in branch and commit prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueClass::Chore => "chore",
            IssueClass::Bug => "bug",
            IssueClass::Feature => "feature",
        }
    }
}

impl fmt::Display for IssueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Sonnet,
    Opus,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Sonnet => "sonnet",
            ModelTier::Opus => "opus",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTemplateRequest {
    pub agent_name: String,
    pub slash_command: SlashCommand,
    pub args: Vec<String>,
    pub adw_id: String,
    #[serde(default)]
    pub model: ModelTier,
}

impl AgentTemplateRequest {
    pub fn new(
        agent_name: impl Into<String>,
        slash_command: SlashCommand,
        args: Vec<String>,
        adw_id: &str,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            slash_command,
            args,
            adw_id: adw_id.to_string(),
            model: ModelTier::Sonnet,
        }
    }

    /// The prompt line handed to the agent: the command followed by its arguments.
    pub fn prompt(&self) -> String {
        let mut prompt = self.slash_command.as_str().to_string();
        for arg in &self.args {
            prompt.push(' ');
            prompt.push_str(arg);
        }
        prompt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPromptResponse {
    pub output: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AgentPromptResponse {
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            session_id: None,
        }
    }
}

/// Generate a short correlation id for one workflow run.
pub fn make_adw_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
