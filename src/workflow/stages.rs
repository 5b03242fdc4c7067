use tracing::{debug, info};

use super::StageError;
use crate::agents::AgentRunner;
use crate::model::agent::{AgentPromptResponse, AgentTemplateRequest, IssueClass, SlashCommand};
use crate::model::work_item::WorkItem;

pub const AGENT_CLASSIFIER: &str = "issue_classifier";
pub const AGENT_BRANCH_GENERATOR: &str = "branch_generator";
pub const AGENT_PLANNER: &str = "sdlc_planner";
pub const AGENT_PLAN_FINDER: &str = "plan_finder";
pub const AGENT_IMPLEMENTOR: &str = "sdlc_implementor";
pub const AGENT_PR_CREATOR: &str = "pr_creator";
pub const AGENT_OPS: &str = "ops";

fn item_json(item: &WorkItem) -> String {
    serde_json::to_string(item).unwrap_or_default()
}

async fn invoke(
    agent: &dyn AgentRunner,
    request: AgentTemplateRequest,
) -> Result<AgentPromptResponse, StageError> {
    debug!(agent = %request.agent_name, command = %request.slash_command, "Agent request");
    let response = agent.execute_template(&request).await;
    debug!(agent = %request.agent_name, success = response.success, "Agent response");
    if response.success {
        Ok(response)
    } else {
        Err(StageError::AgentInvocation(response.output))
    }
}

pub async fn classify(
    agent: &dyn AgentRunner,
    item: &WorkItem,
    adw_id: &str,
) -> Result<IssueClass, StageError> {
    let payload = serde_json::to_string_pretty(item).unwrap_or_default();
    let request = AgentTemplateRequest::new(
        AGENT_CLASSIFIER,
        SlashCommand::ClassifyIssue,
        vec![payload],
        adw_id,
    );
    let response = agent.execute_template(&request).await;
    if !response.success {
        return Err(StageError::Classification(response.output));
    }

    let answer = response.output.trim();
    if answer == "0" {
        return Err(StageError::Classification(format!(
            "No command selected: {}",
            response.output
        )));
    }
    IssueClass::from_command(answer).ok_or_else(|| {
        StageError::Classification(format!("Invalid command selected: {}", response.output))
    })
}

pub async fn generate_branch(
    agent: &dyn AgentRunner,
    item: &WorkItem,
    class: IssueClass,
    adw_id: &str,
) -> Result<String, StageError> {
    let request = AgentTemplateRequest::new(
        AGENT_BRANCH_GENERATOR,
        SlashCommand::GenerateBranchName,
        vec![class.as_str().to_string(), item.id.clone(), item_json(item)],
        adw_id,
    );
    let response = invoke(agent, request).await?;

    let branch = response.output.trim();
    if branch.is_empty() || branch.chars().any(char::is_whitespace) {
        return Err(StageError::AgentInvocation(format!(
            "Invalid branch name: {}",
            response.output
        )));
    }
    info!(branch, "Created branch");
    Ok(branch.to_string())
}

pub async fn build_plan(
    agent: &dyn AgentRunner,
    item: &WorkItem,
    class: IssueClass,
    adw_id: &str,
) -> Result<AgentPromptResponse, StageError> {
    let request = AgentTemplateRequest::new(
        AGENT_PLANNER,
        class.command(),
        vec![format!("{}: {}", item.title, item.description)],
        adw_id,
    );
    invoke(agent, request).await
}

pub async fn find_plan_file(
    agent: &dyn AgentRunner,
    plan_output: &str,
    adw_id: &str,
) -> Result<String, StageError> {
    let request = AgentTemplateRequest::new(
        AGENT_PLAN_FINDER,
        SlashCommand::FindPlanFile,
        vec![plan_output.to_string()],
        adw_id,
    );
    let response = invoke(agent, request).await?;

    let path = response.output.trim();
    if path == "0" {
        return Err(StageError::ArtifactNotFound(
            "No plan file found in output".into(),
        ));
    }
    if path.is_empty() || !path.contains('/') {
        return Err(StageError::ArtifactNotFound(format!(
            "Invalid file path response: {path}"
        )));
    }
    Ok(path.to_string())
}

/// Commit whatever `agent_name` produced. Returns the commit message.
pub async fn commit(
    agent: &dyn AgentRunner,
    agent_name: &str,
    item: &WorkItem,
    class: IssueClass,
    adw_id: &str,
) -> Result<String, StageError> {
    let request = AgentTemplateRequest::new(
        format!("{agent_name}_committer"),
        SlashCommand::Commit,
        vec![
            agent_name.to_string(),
            class.as_str().to_string(),
            item_json(item),
        ],
        adw_id,
    );
    let response = invoke(agent, request).await?;
    let message = response.output.trim().to_string();
    info!(commit = %message, "Created commit");
    Ok(message)
}

pub async fn implement(
    agent: &dyn AgentRunner,
    plan_file: &str,
    adw_id: &str,
) -> Result<AgentPromptResponse, StageError> {
    let request = AgentTemplateRequest::new(
        AGENT_IMPLEMENTOR,
        SlashCommand::Implement,
        vec![plan_file.to_string()],
        adw_id,
    );
    invoke(agent, request).await
}

pub async fn pull_request(
    agent: &dyn AgentRunner,
    branch: &str,
    item: &WorkItem,
    plan_file: &str,
    platform: &str,
    adw_id: &str,
) -> Result<String, StageError> {
    let context = format!(
        "Platform: {platform}\nItem ID: {}\n\n{}",
        item.id,
        item_json(item)
    );
    let request = AgentTemplateRequest::new(
        AGENT_PR_CREATOR,
        SlashCommand::PullRequest,
        vec![
            branch.to_string(),
            context,
            plan_file.to_string(),
            adw_id.to_string(),
        ],
        adw_id,
    );
    let response = invoke(agent, request).await?;
    let url = response.output.trim().to_string();
    info!(pr = %url, "Created pull request");
    Ok(url)
}
