use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::work_item::Platform;
use crate::providers::PlatformError;

#[derive(Debug, Error)]
pub enum ClickUpError {
    #[error("Task {0} not found")]
    TaskNotFound(String),

    #[error("ClickUp API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("ClickUp API error: custom field '{field}' not found in list {list_id}")]
    FieldNotFound { field: String, list_id: String },

    #[error("ClickUp API error: could not extract list_id from task {0}")]
    MissingListId(String),

    #[error("ClickUp request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse ClickUp response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<ClickUpError> for PlatformError {
    fn from(err: ClickUpError) -> Self {
        match err {
            ClickUpError::TaskNotFound(id) => PlatformError::NotFound {
                platform: Platform::ClickUp,
                id,
            },
            ClickUpError::Api { status, ref body } => PlatformError::Upstream {
                platform: Platform::ClickUp,
                status: Some(status),
                message: format!("{status} - {body}"),
            },
            other => PlatformError::upstream(Platform::ClickUp, other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickUpStatus {
    pub status: String,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickUpTag {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickUpCustomField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickUpListRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickUpTask {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub text_content: Option<String>,
    pub status: ClickUpStatus,
    #[serde(default)]
    pub tags: Vec<ClickUpTag>,
    #[serde(default)]
    pub custom_fields: Vec<ClickUpCustomField>,
    pub list: Option<ClickUpListRef>,
    pub url: Option<String>,
}

impl ClickUpTask {
    /// `description`, falling back to `text_content`.
    pub fn body(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.text_content.as_deref())
            .unwrap_or("")
    }
}

#[derive(Deserialize)]
struct FieldCatalog {
    #[serde(default)]
    fields: Vec<ClickUpCustomField>,
}

/// Direct HTTP access to the ClickUp v2 API.
pub struct ClickUpClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ClickUpClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn task_url(&self, task_id: &str, suffix: &str) -> String {
        format!(
            "{}/task/{}{}",
            self.base_url,
            urlencoding::encode(task_id),
            suffix
        )
    }

    /// Map a non-success response onto the error taxonomy. Only task retrieval
    /// passes `task_id`, so a 404 means "not found" there and nowhere else.
    async fn check(
        resp: reqwest::Response,
        task_id: Option<&str>,
    ) -> Result<reqwest::Response, ClickUpError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(id) = task_id {
                return Err(ClickUpError::TaskNotFound(id.to_string()));
            }
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ClickUpError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch a task. Returns the typed task and the payload as received.
    pub async fn get_task(
        &self,
        task_id: &str,
    ) -> Result<(ClickUpTask, serde_json::Value), ClickUpError> {
        let resp = self
            .client
            .get(self.task_url(task_id, ""))
            .header("Authorization", &self.api_key)
            .send()
            .await?;
        let resp = Self::check(resp, Some(task_id)).await?;

        let raw: serde_json::Value = resp.json().await?;
        let task: ClickUpTask = serde_json::from_value(raw.clone())?;
        Ok((task, raw))
    }

    pub async fn add_comment(&self, task_id: &str, comment: &str) -> Result<(), ClickUpError> {
        let resp = self
            .client
            .post(self.task_url(task_id, "/comment"))
            .header("Authorization", &self.api_key)
            .json(&serde_json::json!({ "comment_text": comment }))
            .send()
            .await?;
        Self::check(resp, None).await?;
        info!(task = task_id, "Posted comment to ClickUp task");
        Ok(())
    }

    pub async fn update_status(&self, task_id: &str, status: &str) -> Result<(), ClickUpError> {
        let resp = self
            .client
            .put(self.task_url(task_id, ""))
            .header("Authorization", &self.api_key)
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        Self::check(resp, None).await?;
        info!(task = task_id, status, "Updated ClickUp task status");
        Ok(())
    }

    /// The custom-field catalog of a list.
    pub async fn list_fields(&self, list_id: &str) -> Result<Vec<ClickUpCustomField>, ClickUpError> {
        let resp = self
            .client
            .get(format!(
                "{}/list/{}/field",
                self.base_url,
                urlencoding::encode(list_id)
            ))
            .header("Authorization", &self.api_key)
            .send()
            .await?;
        let resp = Self::check(resp, None).await?;
        let catalog: FieldCatalog = resp.json().await?;
        Ok(catalog.fields)
    }

    /// Set a custom field by its display name, resolving the id through the list's catalog.
    pub async fn set_custom_field(
        &self,
        task_id: &str,
        list_id: &str,
        field_name: &str,
        value: &str,
    ) -> Result<(), ClickUpError> {
        let fields = self.list_fields(list_id).await?;
        let field = fields
            .iter()
            .find(|f| f.name == field_name)
            .ok_or_else(|| ClickUpError::FieldNotFound {
                field: field_name.to_string(),
                list_id: list_id.to_string(),
            })?;

        let resp = self
            .client
            .post(self.task_url(task_id, &format!("/field/{}", field.id)))
            .header("Authorization", &self.api_key)
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;
        Self::check(resp, None).await?;
        info!(task = task_id, field = field_name, "Set ClickUp custom field");
        Ok(())
    }

    /// The list a task lives in.
    pub async fn list_id_of_task(&self, task_id: &str) -> Result<String, ClickUpError> {
        let (task, _) = self.get_task(task_id).await?;
        task.list
            .map(|l| l.id)
            .ok_or_else(|| ClickUpError::MissingListId(task_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_json() -> serde_json::Value {
        serde_json::json!({
            "id": "86abc",
            "name": "Add export button",
            "description": "",
            "text_content": "Users want CSV export",
            "status": { "status": "to do", "color": "#d3d3d3", "type": "open", "orderindex": 0 },
            "orderindex": "1.0",
            "date_created": "1700000000000",
            "date_updated": "1700000000000",
            "creator": { "id": 1, "username": "pm" },
            "tags": [{ "name": "feature", "tag_fg": "#fff", "tag_bg": "#000" }],
            "custom_fields": [],
            "list": { "id": "901", "name": "Sprint" },
            "url": "https://app.clickup.com/t/86abc"
        })
    }

    fn client_for(server: &mockito::ServerGuard) -> ClickUpClient {
        ClickUpClient::new("pk_test".into(), server.url())
    }

    #[tokio::test]
    async fn get_task_sends_api_key_and_parses_task() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/task/86abc")
            .match_header("authorization", "pk_test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(task_json().to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let (task, raw) = client.get_task("86abc").await.unwrap();

        mock.assert_async().await;
        assert_eq!(task.name, "Add export button");
        assert_eq!(task.status.status, "to do");
        assert_eq!(task.body(), "Users want CSV export");
        assert_eq!(raw["orderindex"], "1.0");
    }

    #[tokio::test]
    async fn get_task_404_is_task_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/task/missing")
            .with_status(404)
            .with_body(r#"{"err":"Task not found","ECODE":"ITEM_013"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_task("missing").await.unwrap_err();
        assert!(matches!(err, ClickUpError::TaskNotFound(ref id) if id == "missing"));

        let err: PlatformError = err.into();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn get_task_other_failure_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/task/86abc")
            .with_status(401)
            .with_body(r#"{"err":"Token invalid"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_task("86abc").await.unwrap_err();
        match &err {
            ClickUpError::Api { status, body } => {
                assert_eq!(*status, 401);
                assert!(body.contains("Token invalid"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }

        match PlatformError::from(err) {
            PlatformError::Upstream { status, .. } => assert_eq!(status, Some(401)),
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_comment_posts_comment_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/task/86abc/comment")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "comment_text": "hello" }),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        client.add_comment("86abc", "hello").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn add_comment_failure_is_not_swallowed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/task/86abc/comment")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.add_comment("86abc", "hello").await.unwrap_err();
        assert!(matches!(err, ClickUpError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn invalid_status_surfaces_as_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/task/86abc")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "status": "no such status" }),
            ))
            .with_status(400)
            .with_body(r#"{"err":"Status does not exist"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .update_status("86abc", "no such status")
            .await
            .unwrap_err();
        assert!(matches!(err, ClickUpError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn mutation_404_is_upstream_not_missing_task() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/task/86abc/comment")
            .with_status(404)
            .with_body(r#"{"err":"Route not found"}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/task/86abc")
            .with_status(404)
            .with_body(r#"{"err":"Route not found"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.add_comment("86abc", "hello").await.unwrap_err();
        assert!(matches!(err, ClickUpError::Api { status: 404, .. }));
        match PlatformError::from(err) {
            PlatformError::Upstream { status, .. } => assert_eq!(status, Some(404)),
            other => panic!("expected Upstream, got {other:?}"),
        }

        let err = client
            .update_status("86abc", "in progress")
            .await
            .unwrap_err();
        assert!(matches!(
            PlatformError::from(err),
            PlatformError::Upstream {
                status: Some(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn set_custom_field_resolves_field_id_by_name() {
        let mut server = mockito::Server::new_async().await;
        let catalog = server
            .mock("GET", "/list/901/field")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "fields": [
                        { "id": "f-1", "name": "GitHub Branch", "type": "short_text" },
                        { "id": "f-2", "name": "GitHub Pull Request URL", "type": "url" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let set = server
            .mock("POST", "/task/86abc/field/f-2")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "value": "https://github.com/acme/widgets/pull/7" }),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .set_custom_field(
                "86abc",
                "901",
                "GitHub Pull Request URL",
                "https://github.com/acme/widgets/pull/7",
            )
            .await
            .unwrap();

        catalog.assert_async().await;
        set.assert_async().await;
    }

    #[tokio::test]
    async fn set_custom_field_unknown_name_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/list/901/field")
            .with_status(200)
            .with_body(r#"{"fields":[{"id":"f-1","name":"GitHub Branch"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .set_custom_field("86abc", "901", "Reviewer", "me")
            .await
            .unwrap_err();
        assert!(matches!(err, ClickUpError::FieldNotFound { .. }));
        assert!(err.to_string().contains("ClickUp API error"));
    }

    #[tokio::test]
    async fn list_id_comes_from_task_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/task/86abc")
            .with_status(200)
            .with_body(task_json().to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.list_id_of_task("86abc").await.unwrap(), "901");
    }
}
