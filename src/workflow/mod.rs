//! The plan & build pipeline.
//!
//! Nine stages run strictly in order. The first failing stage ends the run:
//! the error is logged, one explanatory comment is attempted on the work item,
//! and nothing that already happened (branches, commits) is rolled back.

pub mod stages;

use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::agents::AgentRunner;
use crate::model::agent::IssueClass;
use crate::providers::{PlatformAdapter, PlatformError};
use stages::{AGENT_CLASSIFIER, AGENT_IMPLEMENTOR, AGENT_OPS, AGENT_PLANNER};

pub const STATUS_IN_PROGRESS: &str = "in progress";
pub const STATUS_READY_FOR_REVIEW: &str = "Ready for Review (DEV)";
pub const FIELD_BRANCH: &str = "GitHub Branch";
pub const FIELD_PULL_REQUEST: &str = "GitHub Pull Request URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classify,
    Branch,
    Plan,
    FindPlan,
    CommitPlan,
    Implement,
    CommitImplementation,
    PullRequest,
}

impl Stage {
    fn error_prefix(&self) -> &'static str {
        match self {
            Stage::Classify => "Error classifying item",
            Stage::Branch => "Error creating branch",
            Stage::Plan => "Error building plan",
            Stage::FindPlan => "Error finding plan file",
            Stage::CommitPlan => "Error committing plan",
            Stage::Implement => "Error implementing solution",
            Stage::CommitImplementation => "Error committing implementation",
            Stage::PullRequest => "Error creating pull request",
        }
    }

    /// Agent the failure comment is attributed to.
    fn agent_name(&self) -> &'static str {
        match self {
            Stage::Plan | Stage::CommitPlan => AGENT_PLANNER,
            Stage::Implement | Stage::CommitImplementation => AGENT_IMPLEMENTOR,
            _ => AGENT_OPS,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_prefix())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{0}")]
    Classification(String),

    #[error("{0}")]
    ArtifactNotFound(String),

    #[error("{0}")]
    AgentInvocation(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Error fetching work item: {0}")]
    Fetch(#[from] PlatformError),

    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub classification: IssueClass,
    pub branch_name: String,
    pub plan_file: String,
    pub pr_url: String,
}

/// Tag a comment with the run and agent that produced it.
pub fn format_item_message(
    adw_id: &str,
    agent_name: &str,
    message: &str,
    session_id: Option<&str>,
) -> String {
    match session_id {
        Some(session) => format!("{adw_id}_{agent_name}_{session}: {message}"),
        None => format!("{adw_id}_{agent_name}: {message}"),
    }
}

pub struct Workflow<'a> {
    adapter: &'a dyn PlatformAdapter,
    agent: &'a dyn AgentRunner,
    adw_id: String,
}

impl<'a> Workflow<'a> {
    pub fn new(adapter: &'a dyn PlatformAdapter, agent: &'a dyn AgentRunner, adw_id: &str) -> Self {
        Self {
            adapter,
            agent,
            adw_id: adw_id.to_string(),
        }
    }

    /// Post a progress comment. Failures are logged and otherwise ignored.
    async fn notify(&self, item_id: &str, agent_name: &str, message: &str, session: Option<&str>) {
        let text = format_item_message(&self.adw_id, agent_name, message, session);
        if let Err(e) = self.adapter.add_comment(item_id, &text).await {
            warn!(error = %e, "Failed to post comment");
        }
    }

    async fn check<T>(
        &self,
        item_id: &str,
        stage: Stage,
        result: Result<T, StageError>,
    ) -> Result<T, WorkflowError> {
        match result {
            Ok(value) => Ok(value),
            Err(source) => {
                error!(stage = %stage, error = %source, "Stage failed");
                self.notify(
                    item_id,
                    stage.agent_name(),
                    &format!("❌ {stage}: {source}"),
                    None,
                )
                .await;
                Err(WorkflowError::Stage { stage, source })
            }
        }
    }

    pub async fn run(&self, item_id: &str) -> Result<WorkflowOutcome, WorkflowError> {
        let platform = self.adapter.platform_name().to_string();
        let adw_id = self.adw_id.as_str();
        let agent = self.agent;
        info!(platform = %platform, item = item_id, "Using {platform} adapter");

        let item = self.adapter.get_work_item(item_id).await.map_err(|e| {
            error!(error = %e, "Error fetching work item");
            WorkflowError::Fetch(e)
        })?;
        info!(
            title = %item.title,
            url = item.raw_str("/url").unwrap_or_default(),
            "Fetched work item"
        );
        // Mutations use the id exactly as the platform reported it.
        let id = item.id.as_str();

        self.notify(id, AGENT_OPS, "✅ Starting ADW workflow", None).await;
        if let Err(e) = self.adapter.update_status(id, STATUS_IN_PROGRESS).await {
            warn!(error = %e, "Failed to update status");
        }

        info!("Stage 1: classifying work item");
        self.notify(id, AGENT_CLASSIFIER, "✅ Analyzing work item type", None)
            .await;
        let class = self
            .check(id, Stage::Classify, stages::classify(agent, &item, adw_id).await)
            .await?;
        info!(classification = %class, "Item classified");
        self.notify(id, AGENT_OPS, &format!("✅ Item classified as: {class}"), None)
            .await;

        info!("Stage 2: generating branch name");
        let branch = self
            .check(
                id,
                Stage::Branch,
                stages::generate_branch(agent, &item, class, adw_id).await,
            )
            .await?;
        self.notify(id, AGENT_OPS, &format!("✅ Working on branch: {branch}"), None)
            .await;

        info!("Stage 3: building implementation plan");
        self.notify(id, AGENT_PLANNER, "✅ Building implementation plan", None)
            .await;
        let plan = self
            .check(
                id,
                Stage::Plan,
                stages::build_plan(agent, &item, class, adw_id).await,
            )
            .await?;
        self.notify(
            id,
            AGENT_PLANNER,
            "✅ Implementation plan created",
            plan.session_id.as_deref(),
        )
        .await;

        info!("Stage 4: finding plan file");
        let plan_file = self
            .check(
                id,
                Stage::FindPlan,
                stages::find_plan_file(agent, &plan.output, adw_id).await,
            )
            .await?;
        info!(plan_file = %plan_file, "Plan file located");
        self.notify(id, AGENT_OPS, &format!("✅ Plan file created: {plan_file}"), None)
            .await;

        info!("Stage 5: committing plan");
        self.notify(id, AGENT_PLANNER, "✅ Committing plan", None).await;
        self.check(
            id,
            Stage::CommitPlan,
            stages::commit(agent, AGENT_PLANNER, &item, class, adw_id).await,
        )
        .await?;

        info!("Stage 6: implementing solution");
        self.notify(id, AGENT_IMPLEMENTOR, "✅ Implementing solution", None)
            .await;
        let implementation = self
            .check(
                id,
                Stage::Implement,
                stages::implement(agent, &plan_file, adw_id).await,
            )
            .await?;
        self.notify(
            id,
            AGENT_IMPLEMENTOR,
            "✅ Solution implemented",
            implementation.session_id.as_deref(),
        )
        .await;

        info!("Stage 7: committing implementation");
        self.notify(id, AGENT_IMPLEMENTOR, "✅ Committing implementation", None)
            .await;
        self.check(
            id,
            Stage::CommitImplementation,
            stages::commit(agent, AGENT_IMPLEMENTOR, &item, class, adw_id).await,
        )
        .await?;

        info!("Stage 8: creating pull request");
        self.notify(id, AGENT_OPS, "✅ Creating pull request", None).await;
        let pr_url = self
            .check(
                id,
                Stage::PullRequest,
                stages::pull_request(agent, &branch, &item, &plan_file, &platform, adw_id).await,
            )
            .await?;

        info!("Stage 9: updating work item");
        for (field, value) in [(FIELD_BRANCH, &branch), (FIELD_PULL_REQUEST, &pr_url)] {
            if let Err(e) = self.adapter.set_custom_field(id, field, value).await {
                warn!(field, error = %e, "Could not set custom field");
            }
        }
        match self.adapter.update_status(id, STATUS_READY_FOR_REVIEW).await {
            Ok(()) => info!(status = STATUS_READY_FOR_REVIEW, "Status updated"),
            Err(e) => warn!(error = %e, "Could not update status"),
        }
        self.notify(
            id,
            AGENT_OPS,
            &format!(
                "✅ Automation complete!\n\n📦 Pull Request: {pr_url}\n🌿 Branch: `{branch}`\n\nReady for review!"
            ),
            None,
        )
        .await;

        info!(platform = %platform, item = id, "ADW workflow completed successfully");
        Ok(WorkflowOutcome {
            classification: class,
            branch_name: branch,
            plan_file,
            pr_url,
        })
    }
}

#[cfg(test)]
mod tests;
