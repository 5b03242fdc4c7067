use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::*;
use crate::model::agent::{AgentPromptResponse, AgentTemplateRequest, SlashCommand};
use crate::model::work_item::{Platform, WorkItem};

/// Records every mutation so tests can assert on what the workflow wrote back.
#[derive(Default)]
struct MockAdapter {
    comments: Mutex<Vec<String>>,
    statuses: Mutex<Vec<String>>,
    fields: Mutex<Vec<(String, String)>>,
    fail_fetch: bool,
    fail_comments: bool,
    fail_write_back: bool,
}

impl MockAdapter {
    fn comments(&self) -> Vec<String> {
        self.comments.lock().unwrap().clone()
    }

    fn error_comments(&self) -> Vec<String> {
        self.comments()
            .into_iter()
            .filter(|c| c.contains('❌'))
            .collect()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform_name(&self) -> &str {
        "github"
    }

    async fn get_work_item(&self, item_id: &str) -> Result<WorkItem, PlatformError> {
        if self.fail_fetch {
            return Err(PlatformError::NotFound {
                platform: Platform::GitHub,
                id: item_id.to_string(),
            });
        }
        Ok(WorkItem {
            id: item_id.trim_start_matches('#').to_string(),
            title: "Login page crashes".into(),
            description: "Clicking submit twice throws".into(),
            status: "open".into(),
            platform: Platform::GitHub,
            raw_data: serde_json::json!({ "number": 123 }),
        })
    }

    async fn add_comment(&self, _item_id: &str, text: &str) -> Result<(), PlatformError> {
        if self.fail_comments {
            return Err(PlatformError::upstream(Platform::GitHub, "comment rejected"));
        }
        self.comments.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn update_status(&self, _item_id: &str, status: &str) -> Result<(), PlatformError> {
        if self.fail_write_back && status == STATUS_READY_FOR_REVIEW {
            return Err(PlatformError::upstream(Platform::GitHub, "label missing"));
        }
        self.statuses.lock().unwrap().push(status.to_string());
        Ok(())
    }

    async fn set_custom_field(
        &self,
        _item_id: &str,
        field_name: &str,
        value: &str,
    ) -> Result<(), PlatformError> {
        if self.fail_write_back {
            return Err(PlatformError::upstream(Platform::GitHub, "no such field"));
        }
        self.fields
            .lock()
            .unwrap()
            .push((field_name.to_string(), value.to_string()));
        Ok(())
    }
}

/// Answers each agent by name with a canned response.
struct StubAgent {
    responses: HashMap<String, AgentPromptResponse>,
    requests: Mutex<Vec<AgentTemplateRequest>>,
}

impl StubAgent {
    fn happy() -> Self {
        let mut responses = HashMap::new();
        for (agent, output) in [
            ("issue_classifier", "/bug"),
            ("branch_generator", "bug-123-a1b2c3d4-fix-login-crash"),
            ("sdlc_planner", "Plan written to specs/bug-123-login-crash.md"),
            ("plan_finder", "specs/bug-123-login-crash.md"),
            ("sdlc_planner_committer", "sdlc_planner: bug: add plan"),
            ("sdlc_implementor", "Implemented the fix"),
            ("sdlc_implementor_committer", "sdlc_implementor: bug: fix crash"),
            ("pr_creator", "https://github.com/acme/app/pull/7"),
        ] {
            responses.insert(
                agent.to_string(),
                AgentPromptResponse {
                    output: output.to_string(),
                    success: true,
                    session_id: Some("sess-1".into()),
                },
            );
        }
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn answering(mut self, agent: &str, output: &str, success: bool) -> Self {
        self.responses.insert(
            agent.to_string(),
            AgentPromptResponse {
                output: output.to_string(),
                success,
                session_id: None,
            },
        );
        self
    }

    fn agents_called(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.agent_name.clone())
            .collect()
    }
}

#[async_trait]
impl AgentRunner for StubAgent {
    async fn execute_template(&self, request: &AgentTemplateRequest) -> AgentPromptResponse {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .get(&request.agent_name)
            .cloned()
            .unwrap_or_else(|| AgentPromptResponse::failed("unexpected agent"))
    }
}

#[tokio::test]
async fn happy_path_runs_every_stage_in_order() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy();

    let outcome = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("#123")
        .await
        .unwrap();

    assert_eq!(outcome.classification, IssueClass::Bug);
    assert_eq!(outcome.branch_name, "bug-123-a1b2c3d4-fix-login-crash");
    assert_eq!(outcome.plan_file, "specs/bug-123-login-crash.md");
    assert_eq!(outcome.pr_url, "https://github.com/acme/app/pull/7");
    assert_eq!(
        agent.agents_called(),
        vec![
            "issue_classifier",
            "branch_generator",
            "sdlc_planner",
            "plan_finder",
            "sdlc_planner_committer",
            "sdlc_implementor",
            "sdlc_implementor_committer",
            "pr_creator",
        ]
    );
    assert_eq!(
        *adapter.statuses.lock().unwrap(),
        vec![STATUS_IN_PROGRESS, STATUS_READY_FOR_REVIEW]
    );
    assert_eq!(
        *adapter.fields.lock().unwrap(),
        vec![
            (FIELD_BRANCH.to_string(), outcome.branch_name.clone()),
            (FIELD_PULL_REQUEST.to_string(), outcome.pr_url.clone()),
        ]
    );

    let comments = adapter.comments();
    assert!(comments[0].starts_with("a1b2c3d4_ops: "));
    assert!(comments.iter().all(|c| c.starts_with("a1b2c3d4_")));
    let last = comments.last().unwrap();
    assert!(last.contains("https://github.com/acme/app/pull/7"));
    assert!(last.contains("bug-123-a1b2c3d4-fix-login-crash"));
    assert!(adapter.error_comments().is_empty());
}

#[tokio::test]
async fn prompts_carry_the_expected_arguments() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy();
    Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap();

    let requests = agent.requests.lock().unwrap();
    let plan = &requests[2];
    assert_eq!(plan.slash_command, SlashCommand::Bug);
    assert_eq!(
        plan.args,
        vec!["Login page crashes: Clicking submit twice throws"]
    );
    let finder = &requests[3];
    assert_eq!(
        finder.args,
        vec!["Plan written to specs/bug-123-login-crash.md"]
    );
    let implement = &requests[5];
    assert_eq!(implement.args, vec!["specs/bug-123-login-crash.md"]);
    let pr = &requests[7];
    assert_eq!(pr.args[0], "bug-123-a1b2c3d4-fix-login-crash");
    assert!(pr.args[1].starts_with("Platform: github\nItem ID: 123\n\n"));
    assert_eq!(pr.args[3], "a1b2c3d4");
    assert!(requests.iter().all(|r| r.adw_id == "a1b2c3d4"));
}

#[tokio::test]
async fn classifier_failure_stops_before_branching() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy().answering("issue_classifier", "model overloaded", false);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Stage {
            stage: Stage::Classify,
            source: StageError::Classification(_)
        }
    ));
    assert_eq!(agent.agents_called(), vec!["issue_classifier"]);
    let errors = adapter.error_comments();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0],
        "a1b2c3d4_ops: ❌ Error classifying item: model overloaded"
    );
    assert!(adapter.fields.lock().unwrap().is_empty());
}

#[tokio::test]
async fn classifier_declining_is_a_classification_error() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy().answering("issue_classifier", "0", true);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Error classifying item: No command selected: 0");
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy().answering("issue_classifier", "/refactor", true);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error classifying item: Invalid command selected: /refactor"
    );
    assert_eq!(agent.agents_called().len(), 1);
}

#[tokio::test]
async fn blank_branch_name_fails_branch_stage() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy().answering("branch_generator", "   ", true);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Stage { stage: Stage::Branch, .. }));
    assert_eq!(agent.agents_called(), vec!["issue_classifier", "branch_generator"]);
}

#[tokio::test]
async fn plan_finder_zero_means_artifact_missing() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy().answering("plan_finder", "0", true);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Stage {
            stage: Stage::FindPlan,
            source: StageError::ArtifactNotFound(_)
        }
    ));
    assert_eq!(
        err.to_string(),
        "Error finding plan file: No plan file found in output"
    );
    assert!(!agent.agents_called().contains(&"sdlc_planner_committer".to_string()));
}

#[tokio::test]
async fn plan_finder_answer_without_slash_is_invalid() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy().answering("plan_finder", "plan.md", true);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error finding plan file: Invalid file path response: plan.md"
    );
}

#[tokio::test]
async fn implementor_failure_is_attributed_to_implementor() {
    let adapter = MockAdapter::default();
    let agent = StubAgent::happy().answering("sdlc_implementor", "tests failed", false);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Stage { stage: Stage::Implement, .. }));
    assert_eq!(
        adapter.error_comments(),
        vec!["a1b2c3d4_sdlc_implementor: ❌ Error implementing solution: tests failed"]
    );
}

#[tokio::test]
async fn comment_failures_do_not_mask_the_stage_error() {
    let adapter = MockAdapter {
        fail_comments: true,
        ..Default::default()
    };
    let agent = StubAgent::happy().answering("pr_creator", "gh auth expired", false);

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Stage { stage: Stage::PullRequest, .. }));
    assert_eq!(err.to_string(), "Error creating pull request: gh auth expired");
}

#[tokio::test]
async fn fetch_failure_never_reaches_the_agent() {
    let adapter = MockAdapter {
        fail_fetch: true,
        ..Default::default()
    };
    let agent = StubAgent::happy();

    let err = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("999")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Fetch(PlatformError::NotFound { .. })));
    assert!(agent.agents_called().is_empty());
    assert!(adapter.comments().is_empty());
    assert!(adapter.statuses.lock().unwrap().is_empty());
}

#[tokio::test]
async fn write_back_failures_still_complete_the_run() {
    let adapter = MockAdapter {
        fail_write_back: true,
        ..Default::default()
    };
    let agent = StubAgent::happy();

    let outcome = Workflow::new(&adapter, &agent, "a1b2c3d4")
        .run("123")
        .await
        .unwrap();
    assert_eq!(outcome.pr_url, "https://github.com/acme/app/pull/7");
    assert!(adapter.comments().last().unwrap().contains("Automation complete"));
}

#[test]
fn item_messages_are_tagged_with_run_and_agent() {
    assert_eq!(
        format_item_message("a1b2c3d4", "ops", "hello", None),
        "a1b2c3d4_ops: hello"
    );
    assert_eq!(
        format_item_message("a1b2c3d4", "sdlc_planner", "done", Some("s-9")),
        "a1b2c3d4_sdlc_planner_s-9: done"
    );
}
