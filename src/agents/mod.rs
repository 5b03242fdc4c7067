pub mod claude;

use async_trait::async_trait;

use crate::model::agent::{AgentPromptResponse, AgentTemplateRequest};

/// Runs one templated agent request to completion.
///
/// Failures are reported through `AgentPromptResponse::success`, never as an
/// error, so a stub can stand in for the real agent by returning canned
/// responses.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn execute_template(&self, request: &AgentTemplateRequest) -> AgentPromptResponse;
}
